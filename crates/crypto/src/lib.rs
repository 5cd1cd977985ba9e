//! End-to-end encryption of upload payloads.
//!
//! The cipher itself lives behind the [`Coder`] trait. This crate only
//! decides when a coder is used and stages its ciphertext in anonymous
//! temporary storage so the upload can stream it with a known length.

pub mod coder;
pub mod error;
pub mod stage;

pub use coder::{Coder, CoderResolver, SenderKey};
pub use error::CryptoError;
pub use stage::{EncryptionContext, Prepared, maybe_encrypt};
