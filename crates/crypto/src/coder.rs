//! Capability traits for the external cryptographic collaborator.
//!
//! Applications plug in a real implementation (e.g. OpenPGP). Keeping
//! the cipher behind a trait lets the upload path be tested with stub
//! coders and no real key material.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::CryptoError;

/// Encrypts a plaintext stream for a fixed set of recipients.
pub trait Coder: Send + Sync {
    /// Reads all of `plaintext` and writes the ciphertext to `ciphertext`.
    ///
    /// Called on a blocking thread; implementations may do synchronous I/O.
    fn encrypt_stream(
        &self,
        plaintext: &mut dyn Read,
        ciphertext: &mut dyn Write,
    ) -> Result<(), CryptoError>;
}

/// Looks up a [`Coder`] for a given sender and recipient set.
pub trait CoderResolver: Send + Sync {
    /// Returns `None` when no coder can be built, for instance because a
    /// recipient's public key is unknown. Callers fall back to plaintext.
    fn encrypt_coder(
        &self,
        server: &str,
        sender: &SenderKey,
        recipients: &[String],
    ) -> Option<Arc<dyn Coder>>;
}

/// Private identity key material of the sending user.
///
/// Opaque to this crate; only passed through to the resolver.
#[derive(Clone)]
pub struct SenderKey {
    fingerprint: String,
    material: Arc<[u8]>,
}

impl SenderKey {
    pub fn new(fingerprint: impl Into<String>, material: impl Into<Arc<[u8]>>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            material: material.into(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl fmt::Debug for SenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderKey")
            .field("fingerprint", &self.fingerprint)
            .field("material", &"<redacted>")
            .finish()
    }
}
