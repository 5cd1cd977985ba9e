use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cumulative transfer progress for a single upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes handed to the transport so far. Never decreases.
    pub sent: u64,
    /// Declared total length of the body.
    pub total: u64,
}

impl ProgressEvent {
    /// Fraction complete in `[0.0, 1.0]`. An empty body counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.sent as f64 / self.total as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.sent >= self.total
    }
}

/// Callback invoked synchronously each time a chunk is read from the source.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// ThroughputMeter
// ---------------------------------------------------------------------------

/// Estimates transfer rate from cumulative progress samples over a sliding window.
pub struct ThroughputMeter {
    inner: Mutex<MeterInner>,
}

struct MeterInner {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    max_samples: usize,
}

impl ThroughputMeter {
    /// Creates a meter.
    ///
    /// - `window`: time window used for the estimate (default 5 s).
    /// - `max_samples`: cap on retained samples (default 100).
    pub fn new(window: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(MeterInner {
                samples: VecDeque::new(),
                window: window.unwrap_or(Duration::from_secs(5)),
                max_samples: max_samples.unwrap_or(100).max(2),
            }),
        }
    }

    /// Records the cumulative byte count observed now.
    pub fn record(&self, sent: u64) {
        self.record_at(Instant::now(), sent);
    }

    fn record_at(&self, at: Instant, sent: u64) {
        let mut m = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        m.samples.push_back((at, sent));

        let window = m.window;
        while let Some(&(oldest, _)) = m.samples.front() {
            if at.duration_since(oldest) > window && m.samples.len() > 2 {
                m.samples.pop_front();
            } else {
                break;
            }
        }
        while m.samples.len() > m.max_samples {
            m.samples.pop_front();
        }
    }

    /// Average rate in bytes/second across the window, or 0.0 with fewer than two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let m = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (Some(&(first_at, first)), Some(&(last_at, last))) =
            (m.samples.front(), m.samples.back())
        else {
            return 0.0;
        };
        let elapsed = last_at.duration_since(first_at);
        if elapsed.is_zero() {
            return 0.0;
        }
        last.saturating_sub(first) as f64 / elapsed.as_secs_f64()
    }

    /// Time left to send `remaining` bytes at the current rate.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }

    pub fn reset(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .samples
            .clear();
    }
}
