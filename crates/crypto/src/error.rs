//! Encryption stage error types.

/// Errors produced while encrypting a payload.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("coder error: {0}")]
    Coder(String),
}
