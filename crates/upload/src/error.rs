//! Upload error types.

use boxdrop_crypto::CryptoError;

/// The single failure type of an upload call.
///
/// Each variant carries the originating cause. Cleanup failures are never
/// reported in place of these.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// TLS material, trust roots or endpoint URL are unusable. Raised
    /// before any network I/O.
    #[error("transport setup failed: {0}")]
    Setup(String),

    #[error("content source error: {0}")]
    Source(#[source] std::io::Error),

    #[error("encryption failed: {0}")]
    Encryption(#[from] CryptoError),

    /// The server answered with a status other than 200.
    #[error("server rejected upload: {status} {reason}")]
    Protocol { status: u16, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upload aborted")]
    Aborted,
}

impl UploadError {
    /// True when the call was cancelled via `abort()`. Callers usually
    /// suppress user-facing messages for this case.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
