//! High-level image operations.
//!
//! These functions decide where every output goes and call the backend, in
//! parallel across files. Output paths mirror the source path relative to the
//! image root, so `src/img/photos/a.jpg` lands at `build/img/photos/a.jpg`
//! and its next-gen copy at `build/img/photos/a.webp`.

use super::backend::{BackendError, ImageBackend, Recompressed};
use super::params::{ConvertParams, Quality, RasterFormat, RecompressParams};
use crate::config::NextGenFormat;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// One raster found in the source image directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub path: PathBuf,
    /// Path relative to the image root; reused for the output.
    pub relative: PathBuf,
    pub format: RasterFormat,
}

/// Outcome of optimizing one raster.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedImage {
    pub relative: PathBuf,
    pub result: Recompressed,
}

/// Output path for the next-gen copy of `relative`.
pub fn next_gen_path(relative: &Path, format: NextGenFormat) -> PathBuf {
    relative.with_extension(format.extension())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Recompress every image into `output_dir`, in parallel.
///
/// Fails with the first error encountered; images that already finished stay
/// written.
pub fn optimize_images(
    backend: &impl ImageBackend,
    images: &[SourceImage],
    output_dir: &Path,
    quality: Quality,
) -> Result<Vec<OptimizedImage>> {
    images
        .par_iter()
        .map(|image| {
            let output = output_dir.join(&image.relative);
            ensure_parent(&output)?;
            let result = backend.recompress(&RecompressParams {
                source: image.path.clone(),
                output,
                format: image.format,
                quality,
            })?;
            Ok(OptimizedImage {
                relative: image.relative.clone(),
                result,
            })
        })
        .collect()
}

/// Write a next-gen copy of every image into `output_dir`, in parallel.
///
/// Returns the relative paths written.
pub fn create_next_gen(
    backend: &impl ImageBackend,
    images: &[SourceImage],
    output_dir: &Path,
    format: NextGenFormat,
    quality: Quality,
) -> Result<Vec<PathBuf>> {
    images
        .par_iter()
        .map(|image| {
            let relative = next_gen_path(&image.relative, format);
            let output = output_dir.join(&relative);
            ensure_parent(&output)?;
            backend.convert(&ConvertParams {
                source: image.path.clone(),
                output,
                format,
                quality,
            })?;
            Ok(relative)
        })
        .collect()
}
