//! Pre-transmission encryption stage.

use std::fmt;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use boxdrop_transfer::SourceReader;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, warn};

use crate::coder::{CoderResolver, SenderKey};
use crate::error::CryptoError;

/// Everything needed to encrypt one upload. Supplied per call.
#[derive(Clone)]
pub struct EncryptionContext {
    /// Identity of the destination server, used to resolve recipient keys.
    pub server: String,
    pub sender: SenderKey,
    pub recipients: Vec<String>,
    pub resolver: Arc<dyn CoderResolver>,
}

impl EncryptionContext {
    pub fn new(
        server: impl Into<String>,
        sender: SenderKey,
        recipients: Vec<String>,
        resolver: Arc<dyn CoderResolver>,
    ) -> Self {
        Self {
            server: server.into(),
            sender,
            recipients,
            resolver,
        }
    }
}

impl fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("server", &self.server)
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .finish_non_exhaustive()
    }
}

/// Payload ready to be sent: either the original stream or staged ciphertext.
pub struct Prepared {
    pub reader: SourceReader,
    pub length: u64,
    pub encrypted: bool,
}

impl Prepared {
    fn plain(reader: SourceReader, length: u64) -> Self {
        Self {
            reader,
            length,
            encrypted: false,
        }
    }
}

impl fmt::Debug for Prepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prepared")
            .field("length", &self.length)
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

/// Encrypts `reader` when a context is given and a coder can be resolved.
///
/// Without a context, or when the resolver has no coder for the recipients,
/// the plaintext is passed through untouched. Once a coder is found any
/// failure is returned as an error; plaintext is never substituted.
///
/// Ciphertext is staged in an anonymous file inside `temp_dir`. The file
/// has no directory entry (unlinked at creation on Unix, delete-on-close on
/// Windows), so its storage is reclaimed as soon as the returned reader is
/// dropped, whatever the outcome of the upload.
pub async fn maybe_encrypt(
    reader: SourceReader,
    length: u64,
    ctx: Option<&EncryptionContext>,
    temp_dir: &Path,
) -> Result<Prepared, CryptoError> {
    let Some(ctx) = ctx else {
        return Ok(Prepared::plain(reader, length));
    };

    let Some(coder) = ctx
        .resolver
        .encrypt_coder(&ctx.server, &ctx.sender, &ctx.recipients)
    else {
        warn!(
            server = %ctx.server,
            recipients = ?ctx.recipients,
            "no coder available, sending unencrypted"
        );
        return Ok(Prepared::plain(reader, length));
    };

    let plaintext = SyncIoBridge::new(reader);
    let temp_dir = temp_dir.to_path_buf();

    let (file, ciphertext_len) = tokio::task::spawn_blocking(move || {
        let mut plaintext = plaintext;
        let mut staged = tempfile::tempfile_in(&temp_dir)?;
        {
            let mut out = BufWriter::new(&mut staged);
            coder.encrypt_stream(&mut plaintext, &mut out)?;
            out.flush()?;
        }
        // Close the plaintext before the upload starts.
        drop(plaintext);

        let len = staged.seek(SeekFrom::End(0))?;
        staged.seek(SeekFrom::Start(0))?;
        Ok::<_, CryptoError>((staged, len))
    })
    .await
    .map_err(|e| CryptoError::Coder(format!("encryption task failed: {e}")))??;

    debug!(
        plaintext_bytes = length,
        ciphertext_bytes = ciphertext_len,
        "payload encrypted"
    );

    Ok(Prepared {
        reader: Box::new(tokio::fs::File::from_std(file)),
        length: ciphertext_len,
        encrypted: true,
    })
}
