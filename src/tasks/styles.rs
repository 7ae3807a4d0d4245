//! The `styles` task: Sass entry → prefixed, minified CSS.
//!
//! Compilation resolves `@use`/`@import` relative to the entry file, so
//! partials never need to be listed. The compiled CSS then goes through
//! `lightningcss`, which adds the vendor prefixes the configured browserslist
//! queries call for and minifies the result.
//!
//! With `styles.source_map` on, a `<output>.map` file is written next to the
//! stylesheet and linked from its last line. grass emits no maps of its own,
//! so the map points into the compiled CSS, embedded under the entry's name.

use super::{TaskContext, TaskError, TaskReport, url_path, write_output};
use crate::output::format_bytes;
use crate::server::ReloadSignal;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::{Path, PathBuf};

/// Compile a Sass entry file to plain CSS.
pub fn compile_sass(entry: &Path) -> Result<String, TaskError> {
    if !entry.is_file() {
        return Err(TaskError::compile(entry, "stylesheet entry not found"));
    }
    grass::from_path(entry, &grass::Options::default())
        .map_err(|e| TaskError::compile(entry, e))
}

/// Resolve browserslist queries into prefixing targets.
pub fn targets_for(queries: &[String]) -> Result<Targets, String> {
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| format!("invalid browsers query: {e}"))?;
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Minified stylesheet plus its source map JSON, if one was requested.
#[derive(Debug)]
pub struct MinifiedCss {
    pub code: String,
    pub map: Option<String>,
}

/// Prefix and minify compiled CSS. `filename` only shows up in errors.
///
/// When `map_source` is set, a source map is produced with the compiled CSS
/// embedded under that name.
pub fn prefix_and_minify(
    css: &str,
    filename: &Path,
    browsers: &[String],
    map_source: Option<&str>,
) -> Result<MinifiedCss, TaskError> {
    let targets = targets_for(browsers).map_err(|e| TaskError::compile(filename, e))?;

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.display().to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| TaskError::compile(filename, e))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| TaskError::compile(filename, e))?;

    let mut source_map = map_source.map(|name| {
        let mut map = SourceMap::new("/");
        let index = map.add_source(name);
        // Index was just added, so this cannot go out of range.
        let _ = map.set_source_content(index as usize, css);
        map
    });

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            source_map: source_map.as_mut(),
            ..PrinterOptions::default()
        })
        .map_err(|e| TaskError::compile(filename, e))?;

    let map = match source_map.as_mut() {
        Some(map) => Some(
            map.to_json(None)
                .map_err(|e| TaskError::compile(filename, format!("source map: {e}")))?,
        ),
        None => None,
    };
    Ok(MinifiedCss {
        code: printed.code,
        map,
    })
}

/// `css/style.min.css` -> `css/style.min.css.map`
pub fn map_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}

/// Run the styles task and push the new stylesheet to connected browsers.
pub fn compile(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let config = &project.config.styles;
    let entry = project.source_root().join(&config.entry);

    let css = compile_sass(&entry)?;
    let map_source = config.source_map.then(|| url_path(&config.entry));
    let MinifiedCss { mut code, map } =
        prefix_and_minify(&css, &entry, &config.browsers, map_source.as_deref())?;

    let mut written = vec![config.output.clone()];
    if let Some(map) = map {
        let map_relative = map_path(&config.output);
        let map_name = map_relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        write_output(&project.build_root().join(&map_relative), &map)?;
        code.push_str(&format!("\n/*# sourceMappingURL={map_name} */\n"));
        written.push(map_relative);
    }
    write_output(&project.build_root().join(&config.output), &code)?;

    ctx.notify(ReloadSignal::Css {
        path: url_path(&config.output),
    });

    Ok(TaskReport {
        written,
        notes: vec![format!(
            "{} -> {}",
            format_bytes(css.len() as u64),
            format_bytes(code.len() as u64)
        )],
    })
}
