//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | Recompress → JPEG | `image::codecs::jpeg::JpegEncoder` at the configured quality |
//! | Recompress → PNG | `image::codecs::png::PngEncoder`, best compression, adaptive filter |
//! | Convert → WebP | `webp::Encoder` (libwebp, lossy at the configured quality) |
//! | Convert → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |

use super::backend::{BackendError, ImageBackend, Recompressed};
use super::params::{ConvertParams, Quality, RasterFormat, RecompressParams};
use crate::config::NextGenFormat;
use image::codecs::png::{CompressionType, FilterType as PngFilter};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            RasterFormat::Jpeg => ImageFormat::Jpeg,
            RasterFormat::Png => ImageFormat::Png,
        }
    }
}

fn decode_failed(path: &Path, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
}

fn encode_failed(what: &str, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("{what} encode failed: {e}"))
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| decode_failed(path, e))
}

/// Encode in the source's own format.
fn encode_raster(
    img: &DynamicImage,
    format: RasterFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    match format {
        RasterFormat::Jpeg => {
            // JPEG has no alpha channel and no 16-bit mode.
            let img = match img {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img.clone(),
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            };
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            img.write_with_encoder(encoder)
                .map_err(|e| encode_failed("JPEG", e))?;
        }
        RasterFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new_with_quality(
                &mut buf,
                CompressionType::Best,
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder)
                .map_err(|e| encode_failed("PNG", e))?;
        }
    }
    Ok(buf)
}

/// Encode as lossy WebP. libwebp takes 8-bit RGB or RGBA only.
fn encode_webp(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let q = quality.value() as f32;
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode_simple(false, q)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height()).encode_simple(false, q)
    };
    encoded
        .map(|memory| memory.to_vec())
        .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {e:?}")))
}

/// Encode as AVIF using rav1e (speed=6 for reasonable throughput).
fn encode_avif(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        &mut buf,
        6,
        quality.value() as u8,
    );
    img.write_with_encoder(encoder)
        .map_err(|e| encode_failed("AVIF", e))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn recompress(&self, params: &RecompressParams) -> Result<Recompressed, BackendError> {
        let original = std::fs::read(&params.source)?;
        let img = image::load_from_memory_with_format(&original, params.format.image_format())
            .map_err(|e| decode_failed(&params.source, e))?;
        let encoded = encode_raster(&img, params.format, params.quality)?;

        let before = original.len() as u64;
        if encoded.len() < original.len() {
            std::fs::write(&params.output, &encoded)?;
            Ok(Recompressed::Smaller {
                before,
                after: encoded.len() as u64,
            })
        } else {
            std::fs::write(&params.output, &original)?;
            Ok(Recompressed::Unchanged { size: before })
        }
    }

    fn convert(&self, params: &ConvertParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let encoded = match params.format {
            NextGenFormat::Webp => encode_webp(&img, params.quality)?,
            NextGenFormat::Avif => encode_avif(&img, params.quality)?,
        };
        std::fs::write(&params.output, encoded)?;
        Ok(())
    }
}
