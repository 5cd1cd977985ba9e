//! Upload orchestrator.
//!
//! Drives one upload from source to server response:
//! `Preparing → Encrypting (optional) → Sending → Validating`, ending in
//! success, failure or abort. Whatever the exit path, the current-request
//! slot is cleared and the source/ciphertext reader is closed before the
//! call returns, even while the transport still holds the request body.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use boxdrop_crypto::{EncryptionContext, maybe_encrypt};
use boxdrop_transfer::{ContentSource, ProgressBody, ProgressCallback, SourceCloser};
use hyper::ext::ReasonPhrase;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::TransportConfig;
use crate::error::UploadError;
use crate::request::{self, UploadRequest};
use crate::transport::{Connection, Transport};

/// Uploads content to a single endpoint over a reused mutual-TLS connection.
///
/// One request may be in flight at a time. Calls must be serialized per
/// instance; [`abort`](Self::abort) is the only method meant to be used
/// concurrently with an upload.
pub struct UploadClient {
    transport: Transport,
    current: Mutex<Option<CancellationToken>>,
    temp_dir: PathBuf,
}

/// Holds the current-request slot for the duration of a dispatch.
///
/// On drop the body's source is closed, then the slot is cleared.
struct CurrentRequest<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
    source: Option<SourceCloser>,
}

impl Drop for CurrentRequest<'_> {
    fn drop(&mut self) {
        if self.source.take().is_some_and(|source| source.close()) {
            trace!("source closed before body was drained");
        }
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl UploadClient {
    /// Creates a client. No connection is made until the first request.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            transport: Transport::new(config),
            current: Mutex::new(None),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Directory used to stage encrypted payloads.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Whether a request is currently in flight.
    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Cancels the request in flight, if any.
    ///
    /// The pending upload returns [`UploadError::Aborted`]. Calling this
    /// while no request is active does nothing.
    pub fn abort(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.as_ref() {
            info!("aborting upload in flight");
            token.cancel();
        }
    }

    /// Uploads `source` and returns the server's response text.
    ///
    /// When `encryption` is given the payload is encrypted first, unless no
    /// coder can be resolved for the recipients, in which case it is sent
    /// as plaintext. `progress` is called with cumulative byte counts as the
    /// body is streamed.
    pub async fn upload(
        &self,
        source: &dyn ContentSource,
        mime: Option<&str>,
        encryption: Option<&EncryptionContext>,
        progress: Option<ProgressCallback>,
    ) -> Result<String, UploadError> {
        let length = source.length().await.map_err(UploadError::Source)?;
        let reader = source.open().await.map_err(UploadError::Source)?;

        let prepared = maybe_encrypt(reader, length, encryption, &self.temp_dir).await?;

        let mut current = self.begin();
        let conn = self.transport.acquire()?;

        let body = ProgressBody::new(
            prepared.reader,
            prepared.length,
            progress,
            current.token.clone(),
        );
        current.source = Some(body.closer());
        let req = request::prepare_upload(conn.base_url(), mime, body, prepared.encrypted);

        debug!(
            url = %req.url,
            bytes = prepared.length,
            encrypted = prepared.encrypted,
            "dispatching upload"
        );
        let outcome = execute(&conn, req, &current.token).await;
        match &outcome {
            Ok(_) => info!(
                bytes = prepared.length,
                encrypted = prepared.encrypted,
                "upload complete"
            ),
            Err(e) if e.is_aborted() => info!("upload aborted"),
            Err(e) => warn!(error = %e, "upload failed"),
        }
        outcome
    }

    /// Sends a generic request to the endpoint and returns the response text.
    ///
    /// Uses `GET` unless `content` is given or `force_post` is set. Shares
    /// the connection, validation and abort handling of [`upload`](Self::upload).
    pub async fn request(
        &self,
        params: Option<&[(String, String)]>,
        mime: Option<&str>,
        content: Option<Vec<u8>>,
        force_post: bool,
    ) -> Result<String, UploadError> {
        let current = self.begin();
        let conn = self.transport.acquire()?;
        let req = request::prepare(conn.base_url(), params, mime, content, force_post);

        debug!(method = %req.method, url = %req.url, "dispatching request");
        execute(&conn, req, &current.token).await
    }

    fn begin(&self) -> CurrentRequest<'_> {
        let token = CancellationToken::new();
        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!("overlapping request on one client; the previous one can no longer be aborted");
        }
        *slot = Some(token.clone());
        CurrentRequest {
            slot: &self.current,
            token,
            source: None,
        }
    }
}

/// Sends the request, racing it against cancellation.
///
/// Losing the race drops the in-flight future, which closes the connection
/// and the request body.
async fn execute(
    conn: &Connection,
    req: UploadRequest,
    cancel: &CancellationToken,
) -> Result<String, UploadError> {
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(UploadError::Aborted),
        result = dispatch(conn.http(), req) => result,
    };
    match outcome {
        Err(_) if cancel.is_cancelled() => Err(UploadError::Aborted),
        other => other,
    }
}

async fn dispatch(http: &reqwest::Client, req: UploadRequest) -> Result<String, UploadError> {
    let response = req.into_builder(http).send().await?;

    let status = response.status();
    if status != StatusCode::OK {
        // hyper keeps the received phrase only when it is not the canonical one.
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown Status".to_string());
        // Dropping the unread response releases its connection.
        return Err(UploadError::Protocol {
            status: status.as_u16(),
            reason,
        });
    }

    Ok(response.text().await?)
}
