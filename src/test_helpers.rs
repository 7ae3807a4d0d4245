//! Shared test utilities for the simple-assets test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let project = Project::load(tmp.path()).unwrap();
//! // tmp/src/ holds the fixture site, including synthesized rasters
//! ```

use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Rasters are not checked in; `img/hero.jpg` and `img/photos/team.png` are
/// generated into the copy.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();

    let img = tmp.path().join("src/img");
    std::fs::create_dir_all(img.join("photos")).unwrap();
    create_test_jpeg(&img.join("hero.jpg"), 96, 64);
    create_test_png(&img.join("photos/team.png"), 48, 32);
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write a gradient JPEG at the encoder's default quality.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a gradient PNG with fast compression, so recompression has room.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::png::PngEncoder::new_with_quality(
        writer,
        image::codecs::png::CompressionType::Fast,
        image::codecs::png::FilterType::NoFilter,
    )
    .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
    .unwrap();
}

/// Write a photo-like JPEG (soft shading plus sensor-style grain) at quality 85.
pub fn create_photo_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let (fx, fy) = (x as f32 / width as f32, y as f32 / height as f32);
        let grain = ((x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 17) as f32 - 8.0;
        let shade = |base: f32| (base + grain).clamp(0.0, 255.0) as u8;
        image::Rgb([
            shade(90.0 + 120.0 * fx + 30.0 * (fy * 6.0).sin()),
            shade(70.0 + 100.0 * fy + 25.0 * (fx * 9.0).cos()),
            shade(160.0 - 80.0 * fx * fy),
        ])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new_with_quality(writer, 85)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
}
