use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open input {path}: {source}")]
    InputOpen { path: PathBuf, source: io::Error },

    #[error("Input truncated at offset {offset:#x}: {what}")]
    InputTruncated { offset: usize, what: &'static str },

    #[error("Bad magic: expected {expected:?}")]
    BadMagic { expected: &'static str },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Bad HMP varlen at offset {0:#x}")]
    BadVarlen(usize),

    #[error("Upstream player refused input: {0}")]
    PlayerRefused(String),

    #[error("Image too large: {0}")]
    ImageTooLarge(String),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("Compression failed: {0}")]
    Compress(String),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Failed to write output {path}: {source}")]
    OutputWrite { path: PathBuf, source: io::Error },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
