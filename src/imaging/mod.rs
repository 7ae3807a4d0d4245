//! Raster image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Recompress** | `image` JPEG / PNG encoders, never larger than the source |
//! | **Next-gen copy** | lossy WebP (`webp`, libwebp) or AVIF (`image`, rav1e) |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Parallel batch functions combining paths + backend

pub mod backend;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, Recompressed};
pub use operations::{
    OptimizedImage, SourceImage, create_next_gen, next_gen_path, optimize_images,
};
pub use params::{ConvertParams, Quality, RasterFormat, RecompressParams};
pub use rust_backend::RustBackend;
