//! Glob expansion for task inputs.
//!
//! Patterns are written relative to a base directory (usually the source
//! root), e.g. `fonts/*.woff2` or `img/**/*.svg`. A pattern that matches
//! nothing is not an error. Exclusions are matched against the same relative
//! path, with `*` never crossing a `/`.

use super::TaskError;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Match options shared by expansion, exclusion and the watcher.
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A file matched under a base directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub path: PathBuf,
    /// `path` relative to the base directory.
    pub relative: PathBuf,
}

pub fn compile_pattern(pattern: &str) -> Result<Pattern, TaskError> {
    Pattern::new(pattern).map_err(|source| TaskError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// True if `relative` matches any of `patterns`.
pub fn matches_any(patterns: &[Pattern], relative: &Path) -> bool {
    patterns
        .iter()
        .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
}

/// Expand `include` globs under `base`, minus anything matching `exclude`.
///
/// Returns regular files only, sorted by relative path and de-duplicated.
/// A missing `base` yields an empty list.
pub fn expand(
    base: &Path,
    include: &[impl AsRef<str>],
    exclude: &[impl AsRef<str>],
) -> Result<Vec<SourceFile>, TaskError> {
    let exclude = exclude
        .iter()
        .map(|p| compile_pattern(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let escaped_base = Pattern::escape(&base.to_string_lossy());
    let mut found = BTreeSet::new();

    for pattern in include {
        let pattern = pattern.as_ref();
        // Validate the pattern on its own so errors name what the user wrote.
        compile_pattern(pattern)?;
        let full = format!("{}/{}", escaped_base.trim_end_matches('/'), pattern);
        let entries = glob::glob_with(&full, MATCH_OPTIONS).map_err(|source| {
            TaskError::Pattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        for entry in entries {
            let path = entry.map_err(|e| TaskError::Io {
                path: e.path().to_path_buf(),
                source: e.into(),
            })?;
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(base) else {
                continue;
            };
            let relative = relative.to_path_buf();
            if matches_any(&exclude, &relative) {
                continue;
            }
            found.insert(SourceFile { path, relative });
        }
    }

    Ok(found.into_iter().collect())
}
