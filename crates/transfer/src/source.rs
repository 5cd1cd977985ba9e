//! Content sources: anything that can report a length and be opened for reading.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::AsyncRead;

/// Readable byte stream handed out by a [`ContentSource`].
///
/// Dropping the reader closes the underlying handle.
pub type SourceReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Boxed future returned by [`ContentSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// A local content item that can be uploaded.
///
/// The length probe must not consume the content: callers ask for the
/// length first and open an independent reader afterwards.
pub trait ContentSource: Send + Sync {
    /// Returns the size of the content in bytes.
    fn length(&self) -> SourceFuture<'_, u64>;

    /// Opens a fresh reader positioned at the start of the content.
    fn open(&self) -> SourceFuture<'_, SourceReader>;
}

/// Content backed by a file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileSource {
    fn length(&self) -> SourceFuture<'_, u64> {
        Box::pin(async move {
            let meta = tokio::fs::metadata(&self.path).await?;
            if !meta.is_file() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a regular file: {}", self.path.display()),
                ));
            }
            Ok(meta.len())
        })
    }

    fn open(&self) -> SourceFuture<'_, SourceReader> {
        Box::pin(async move {
            let file = tokio::fs::File::open(&self.path).await?;
            Ok(Box::new(file) as SourceReader)
        })
    }
}

/// Content held in memory. Mostly useful for small payloads and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: bytes::Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<bytes::Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ContentSource for MemorySource {
    fn length(&self) -> SourceFuture<'_, u64> {
        let len = self.data.len() as u64;
        Box::pin(async move { Ok(len) })
    }

    fn open(&self) -> SourceFuture<'_, SourceReader> {
        let cursor = io::Cursor::new(self.data.clone());
        Box::pin(async move { Ok(Box::new(cursor) as SourceReader) })
    }
}
