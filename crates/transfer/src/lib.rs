//! Content sources and streaming request bodies with progress tracking.
//!
//! A [`ContentSource`] is probed for its length and then opened as an
//! async reader. [`ProgressBody`] turns that reader into a chunked byte
//! stream suitable for an HTTP request body, reporting cumulative
//! progress as the transport pulls data.

mod body;
mod progress;
mod source;

pub use body::{ProgressBody, SourceCloser};
pub use progress::{ProgressCallback, ProgressEvent, ThroughputMeter};
pub use source::{ContentSource, FileSource, MemorySource, SourceFuture, SourceReader};

/// Read buffer capacity used when streaming a source: 64 KiB.
///
/// The payload is never buffered whole; at most one chunk of this size
/// is held in memory per in-flight body.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;
