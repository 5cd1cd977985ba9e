//! Runs a single upload with progress logging and Ctrl-C abort.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use boxdrop_transfer::ThroughputMeter;
use boxdrop_upload::{FileSource, ProgressCallback, ProgressEvent, UploadClient, UploadError};

use crate::args::Args;
use crate::config::Config;

/// Uploads the file named in `args` and prints the server response.
pub async fn run(config: Config, args: Args) -> anyhow::Result<()> {
    let mut client = UploadClient::new(config.transport()?);
    if let Some(dir) = &config.temp_dir {
        client = client.with_temp_dir(dir);
    }
    let client = Arc::new(client);

    let interrupt = tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                client.abort();
            }
        }
    });

    let source = FileSource::new(&args.file);
    tracing::info!(file = %source.path().display(), "uploading");
    let outcome = client
        .upload(&source, args.mime.as_deref(), None, Some(progress_logger()))
        .await;
    interrupt.abort();

    match outcome {
        Ok(payload) => {
            println!("{payload}");
            Ok(())
        }
        Err(UploadError::Aborted) => {
            tracing::info!("upload cancelled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Logs progress each time another tenth of the body has been sent.
fn progress_logger() -> ProgressCallback {
    let meter = ThroughputMeter::new(None, None);
    let logged = AtomicU64::new(0);
    Box::new(move |event: ProgressEvent| {
        meter.record(event.sent);
        if event.is_complete() {
            tracing::debug!(bytes = event.total, "body sent, waiting for server");
        }
        let Some(decile) = next_decile(logged.load(Ordering::Relaxed), event) else {
            return;
        };
        logged.store(decile, Ordering::Relaxed);

        let remaining = event.total.saturating_sub(event.sent);
        tracing::info!(
            percent = decile * 10,
            sent = event.sent,
            total = event.total,
            kib_per_sec = (meter.bytes_per_second() / 1024.0) as u64,
            eta_secs = meter.eta(remaining).map(|d| d.as_secs()),
            "upload progress"
        );
    })
}

/// Returns the decile reached by `event` if it is past `logged`.
fn next_decile(logged: u64, event: ProgressEvent) -> Option<u64> {
    let decile = (event.fraction() * 10.0).floor() as u64;
    (decile > logged).then_some(decile)
}
