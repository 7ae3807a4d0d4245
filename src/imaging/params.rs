//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which files to write) and the [`backend`](super::backend)
//! (which does the actual pixel work), so a mock backend can stand in for
//! tests.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`RasterFormat`]: the source formats the optimizer recompresses.
//! - [`RecompressParams`]: re-encode a raster in its own format.
//! - [`ConvertParams`]: re-encode a raster into a next-gen format.

use crate::config::NextGenFormat;
use std::path::{Path, PathBuf};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Raster formats the optimizer knows how to recompress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    Png,
}

impl RasterFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(RasterFormat::Jpeg),
            "png" => Some(RasterFormat::Png),
            _ => None,
        }
    }
}

/// Parameters for re-encoding a raster in its own format.
#[derive(Debug, Clone, PartialEq)]
pub struct RecompressParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: RasterFormat,
    pub quality: Quality,
}

/// Parameters for writing a next-gen copy of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: NextGenFormat,
    pub quality: Quality,
}
