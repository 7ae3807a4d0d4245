//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the optimizer
//! needs: recompress and convert.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's pure-Rust codecs.

use super::params::{ConvertParams, RecompressParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// What a recompress call ended up writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recompressed {
    /// The re-encoded bytes were smaller and were written.
    Smaller { before: u64, after: u64 },
    /// Re-encoding did not help; the source bytes were written unchanged.
    Unchanged { size: u64 },
}

impl Recompressed {
    pub fn bytes_written(self) -> u64 {
        match self {
            Recompressed::Smaller { after, .. } => after,
            Recompressed::Unchanged { size } => size,
        }
    }
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Re-encode in the source format. Never writes more bytes than the source.
    fn recompress(&self, params: &RecompressParams) -> Result<Recompressed, BackendError>;

    /// Write a copy in a next-gen format.
    fn convert(&self, params: &ConvertParams) -> Result<(), BackendError>;
}
