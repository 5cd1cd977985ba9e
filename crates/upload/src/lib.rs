//! Upload client for a mutually authenticated HTTPS drop box.
//!
//! [`UploadClient`] is the entry point. A call to
//! [`upload`](UploadClient::upload):
//!
//! 1. probes and opens the [`ContentSource`](boxdrop_transfer::ContentSource),
//! 2. optionally encrypts it ([`boxdrop_crypto::maybe_encrypt`]),
//! 3. streams it as a `POST` body through a lazily built, reused
//!    [`Transport`] connection,
//! 4. returns the server's response text, or a single [`UploadError`].
//!
//! [`UploadClient::abort`] may be called from any task to cancel the
//! request in flight.

pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod transport;

pub use client::UploadClient;
pub use config::{ClientIdentity, TransportConfig, TrustPolicy};
pub use error::UploadError;
pub use request::{RequestBody, UploadRequest};
pub use transport::{Connection, Transport};

pub use boxdrop_crypto::{Coder, CoderResolver, CryptoError, EncryptionContext, SenderKey};
pub use boxdrop_transfer::{
    ContentSource, FileSource, MemorySource, ProgressCallback, ProgressEvent, SourceFuture,
    SourceReader,
};
