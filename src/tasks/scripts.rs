//! The `scripts` task: one entry script → one minified script.

use super::{TaskContext, TaskError, TaskReport, url_path, write_output};
use crate::output::format_bytes;
use crate::server::ReloadSignal;
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use std::path::Path;

/// Minify a classic (non-module) script.
///
/// Top-level names are globals other scripts and inline handlers may
/// reference, so only nested scopes are mangled.
pub fn minify_source(source: &[u8], path: &Path) -> Result<Vec<u8>, TaskError> {
    let text = std::str::from_utf8(source)
        .map_err(|e| TaskError::compile(path, format!("not UTF-8: {e}")))?;

    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, text, SourceType::cjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
        return Err(TaskError::compile(path, messages.join("; ")));
    }
    let mut program = parsed.program;

    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: false,
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions::default()),
    };
    let minified = Minifier::new(options).build(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code;
    Ok(code.into_bytes())
}

pub fn minify(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let project = ctx.project;
    let config = &project.config.scripts;
    let entry = project.source_root().join(&config.entry);

    let source = std::fs::read(&entry).map_err(TaskError::io(&entry))?;
    let minified = minify_source(&source, &entry)?;
    write_output(&project.build_root().join(&config.output), &minified)?;

    ctx.notify(ReloadSignal::Asset {
        path: url_path(&config.output),
    });

    Ok(TaskReport {
        written: vec![config.output.clone()],
        notes: vec![format!(
            "{} -> {}",
            format_bytes(source.len() as u64),
            format_bytes(minified.len() as u64)
        )],
    })
}
