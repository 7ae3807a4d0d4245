//! Raster image tasks: `optimize-images` and `next-gen-images`.
//!
//! Both walk the source image directory recursively, pick up files whose
//! extension is in `images.extensions`, and mirror their relative paths into
//! the build image directory. The pixel work is delegated to an
//! [`ImageBackend`]; the production tasks use [`RustBackend`].

use super::sources::expand;
use super::{TaskContext, TaskError, TaskReport};
use crate::imaging::{
    ImageBackend, Quality, RasterFormat, Recompressed, RustBackend, SourceImage,
    create_next_gen, optimize_images,
};
use crate::output::format_bytes;
use std::path::Path;

fn extension_enabled(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    extensions.iter().any(|wanted| {
        let wanted = wanted.to_ascii_lowercase();
        wanted == ext || (wanted == "jpg" && ext == "jpeg")
    })
}

/// Find every enabled raster under the source image directory.
pub fn discover(ctx: TaskContext) -> Result<Vec<SourceImage>, TaskError> {
    let images = &ctx.project.config.images;
    let files = expand(&ctx.project.image_source(), &["**/*"], &[] as &[&str])?;
    Ok(files
        .into_iter()
        .filter(|f| extension_enabled(&f.relative, &images.extensions))
        .filter_map(|f| {
            RasterFormat::from_path(&f.relative).map(|format| SourceImage {
                path: f.path,
                relative: f.relative,
                format,
            })
        })
        .collect())
}

/// Recompress every raster into the build tree, never growing a file.
pub fn optimize(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    optimize_with_backend(ctx, &RustBackend::new())
}

pub fn optimize_with_backend(
    ctx: TaskContext,
    backend: &impl ImageBackend,
) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let images = discover(ctx)?;
    let quality = Quality::new(project.config.images.quality);
    let results = optimize_images(backend, &images, &project.image_build(), quality)?;

    let mut report = TaskReport::default();
    let mut saved = 0u64;
    for image in results {
        if let Recompressed::Smaller { before, after } = image.result {
            saved += before - after;
        }
        report
            .written
            .push(project.config.images.dir.join(&image.relative));
    }
    if report.written.is_empty() {
        return Ok(report.note("no rasters found"));
    }
    let count = report.written.len();
    Ok(report.note(format!("{count} images, saved {}", format_bytes(saved))))
}

/// Write a next-gen copy of every raster next to its optimized output.
pub fn next_gen(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    next_gen_with_backend(ctx, &RustBackend::new())
}

pub fn next_gen_with_backend(
    ctx: TaskContext,
    backend: &impl ImageBackend,
) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let images = discover(ctx)?;
    let config = &project.config.images;
    let written = create_next_gen(
        backend,
        &images,
        &project.image_build(),
        config.next_gen,
        Quality::new(config.quality),
    )?;

    Ok(TaskReport {
        written: written.into_iter().map(|r| config.dir.join(r)).collect(),
        notes: Vec::new(),
    })
}
