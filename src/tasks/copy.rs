//! Passthrough copies.
//!
//! `copy` moves static files (fonts, favicon, web manifest) into the build
//! tree unchanged. `copy-images` is the dev-mode stand-in for the optimizer:
//! rasters are copied as-is so a dev build starts quickly.

use super::sources::{SourceFile, expand};
use super::{TaskContext, TaskError, TaskReport};
use std::path::Path;

fn copy_files(
    files: &[SourceFile],
    dest_root: &Path,
    prefix: &Path,
) -> Result<TaskReport, TaskError> {
    let mut report = TaskReport::default();
    for file in files {
        let dest = dest_root.join(&file.relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
        }
        std::fs::copy(&file.path, &dest).map_err(TaskError::io(&file.path))?;
        report.written.push(prefix.join(&file.relative));
    }
    Ok(report)
}

/// Copy every file matching the configured patterns, keeping its path
/// relative to the source root. Zero matches is a success.
pub fn copy_static(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let files = expand(
        &project.source_root(),
        &project.config.copy.patterns[..],
        &[] as &[&str],
    )?;
    let report = copy_files(&files, &project.build_root(), Path::new(""))?;
    if report.written.is_empty() {
        return Ok(report.note("no static files matched"));
    }
    Ok(report)
}

/// Copy rasters from the source image directory without re-encoding.
///
/// Only raster extensions are copied; vector files belong to the svg and
/// sprite tasks.
pub fn copy_images(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let images = super::images::discover(ctx)?;
    let files: Vec<SourceFile> = images
        .into_iter()
        .map(|image| SourceFile {
            path: image.path,
            relative: image.relative,
        })
        .collect();
    copy_files(&files, &project.image_build(), &project.config.images.dir)
}
