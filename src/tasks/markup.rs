//! The `markup` task: whitespace-collapsed HTML.
//!
//! Every file matching `markup.pattern` under the source root is minified and
//! written under the same relative name at the build root. Comments and
//! optional closing tags are kept; only insignificant whitespace goes.

use super::sources::expand;
use super::{TaskContext, TaskError, TaskReport, write_output};
use crate::server::ReloadSignal;
use minify_html::Cfg;

fn minify_config() -> Cfg {
    let mut cfg = Cfg::new();
    cfg.keep_comments = true;
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg
}

/// Collapse whitespace in an HTML document.
pub fn minify_markup(html: &[u8]) -> Vec<u8> {
    minify_html::minify(html, &minify_config())
}

pub fn minify(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let source_root = project.source_root();
    let build_root = project.build_root();
    let files = expand(
        &source_root,
        &[project.config.markup.pattern.as_str()],
        &[] as &[&str],
    )?;

    let mut report = TaskReport::default();
    for file in &files {
        let html = std::fs::read(&file.path).map_err(TaskError::io(&file.path))?;
        write_output(&build_root.join(&file.relative), minify_markup(&html))?;
        report.written.push(file.relative.clone());
    }

    if report.written.is_empty() {
        return Ok(report.note("no markup matched"));
    }
    ctx.notify(ReloadSignal::Reload);
    Ok(report)
}
