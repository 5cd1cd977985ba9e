//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Upload a file to a boxdrop endpoint over mutual TLS.
#[derive(Parser, Debug)]
#[command(name = "boxdrop", author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (overrides platform default)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Content type sent with the upload (defaults to application/octet-stream)
    #[arg(short, long)]
    pub mime: Option<String>,

    /// File to upload
    pub file: PathBuf,
}
