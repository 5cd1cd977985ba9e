//! Streaming request body that reports progress as the transport reads it.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, ready};

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::Stream;
use tokio_util::io::poll_read_buf;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::STREAM_CHUNK_SIZE;
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::source::SourceReader;

type ReaderSlot = Arc<Mutex<Option<SourceReader>>>;

/// A source reader exposed as a stream of byte chunks.
///
/// Every chunk pulled by the consumer is counted and reported through the
/// optional callback. Once `cancel` fires the body yields a single
/// [`io::ErrorKind::Interrupted`] error and then ends; no progress is
/// reported after that point.
///
/// The reader lives in a slot shared with [`SourceCloser`], so the owner
/// of the upload can close the source while the transport still holds the
/// body. A closed body simply ends.
pub struct ProgressBody {
    reader: ReaderSlot,
    buf: BytesMut,
    sent: u64,
    total: u64,
    callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

/// Closes the reader behind a [`ProgressBody`] from outside the transport.
#[derive(Clone)]
pub struct SourceCloser {
    reader: ReaderSlot,
}

impl SourceCloser {
    /// Drops the reader. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        reader.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl ProgressBody {
    pub fn new(
        reader: SourceReader,
        total: u64,
        callback: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Some(reader))),
            buf: BytesMut::new(),
            sent: 0,
            total,
            callback,
            cancel,
        }
    }

    /// Declared total length of the body.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Handle that closes the source independently of the body.
    pub fn closer(&self) -> SourceCloser {
        SourceCloser {
            reader: Arc::clone(&self.reader),
        }
    }
}

fn interrupted() -> Poll<Option<io::Result<Bytes>>> {
    Poll::Ready(Some(Err(io::Error::new(
        io::ErrorKind::Interrupted,
        "upload aborted",
    ))))
}

impl Stream for ProgressBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let mut slot = this.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if this.cancel.is_cancelled() && slot.take().is_some() {
            return interrupted();
        }
        let Some(reader) = slot.as_mut() else {
            return Poll::Ready(None);
        };

        if this.buf.capacity() == 0 {
            this.buf.reserve(STREAM_CHUNK_SIZE);
        }
        let mut window = (&mut this.buf).limit(STREAM_CHUNK_SIZE);
        match ready!(poll_read_buf(Pin::new(reader), cx, &mut window)) {
            Ok(0) => {
                trace!(sent = this.sent, total = this.total, "body exhausted");
                slot.take();
                Poll::Ready(None)
            }
            Ok(_) => {
                let chunk = this.buf.split().freeze();
                if this.cancel.is_cancelled() {
                    slot.take();
                    return interrupted();
                }
                this.sent += chunk.len() as u64;
                if this.sent >= this.total {
                    // The transport stops polling once the declared length is
                    // reached, so release the source now.
                    trace!(sent = this.sent, "declared length reached");
                    slot.take();
                }
                drop(slot);

                if let Some(cb) = &this.callback {
                    cb(ProgressEvent {
                        sent: this.sent,
                        total: this.total,
                    });
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Err(e) => {
                slot.take();
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}
