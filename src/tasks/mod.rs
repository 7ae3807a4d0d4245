//! The individual build tasks.
//!
//! Each task is a plain function from a [`TaskContext`] to a [`TaskReport`].
//! Tasks own disjoint inputs and disjoint outputs, write whole files (never
//! append), and are safe to re-run against a partially populated build tree.
//!
//! | Task | Module | Output |
//! |---|---|---|
//! | clean | [`clean`] | removes the build tree |
//! | copy, copy-images | [`copy`] | fonts, favicon, manifest; raw rasters |
//! | styles | [`styles`] | `css/style.min.css` |
//! | markup | [`markup`] | `*.html` |
//! | scripts | [`scripts`] | `js/script.min.js` |
//! | optimize-images, next-gen-images | [`images`] | `img/**/*.{png,jpg,webp}` |
//! | svg, sprite | [`svg`] | `img/**/*.svg`, `img/sprite.svg` |

pub mod clean;
pub mod copy;
pub mod images;
pub mod markup;
pub mod scripts;
pub mod sources;
pub mod styles;
pub mod svg;

use crate::config::Project;
use crate::graph::TaskPanic;
use crate::imaging::BackendError;
use crate::server::{ReloadHub, ReloadSignal};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("{}: {message}", .path.display())]
    Compile { path: PathBuf, message: String },
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Task {0}")]
    Panicked(#[from] TaskPanic),
}

impl TaskError {
    /// Attach a path to an IO error, for use with `map_err`.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> TaskError {
        let path = path.into();
        move |source| TaskError::Io { path, source }
    }

    pub fn compile(path: &Path, message: impl std::fmt::Display) -> TaskError {
        TaskError::Compile {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Everything a task may touch: the project layout and, in a dev session, the
/// reload hub of the running server.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    pub project: &'a Project,
    pub reload: Option<&'a ReloadHub>,
}

impl<'a> TaskContext<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self {
            project,
            reload: None,
        }
    }

    pub fn with_reload(self, hub: &'a ReloadHub) -> Self {
        Self {
            reload: Some(hub),
            ..self
        }
    }

    /// Push a signal to connected browsers, if a dev server is running.
    pub fn notify(&self, signal: ReloadSignal) {
        if let Some(hub) = self.reload {
            hub.broadcast(signal);
        }
    }
}

/// What a task produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskReport {
    /// Files written, relative to the build root.
    pub written: Vec<PathBuf>,
    /// Human-readable remarks (sizes, skipped inputs).
    pub notes: Vec<String>,
}

impl TaskReport {
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    std::fs::write(path, contents).map_err(TaskError::io(path))
}

/// Build-root-relative display path using forward slashes, as browsers see it.
pub(crate) fn url_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn notify_without_hub_is_a_no_op() {
        let project = Project::new("/site", PipelineConfig::default());
        TaskContext::new(&project).notify(ReloadSignal::Reload);
    }

    #[test]
    fn notify_reaches_hub_subscribers() {
        let project = Project::new("/site", PipelineConfig::default());
        let hub = ReloadHub::new();
        let rx = hub.subscribe();
        TaskContext::new(&project)
            .with_reload(&hub)
            .notify(ReloadSignal::Reload);
        assert_eq!(rx.try_recv().unwrap(), ReloadSignal::Reload);
    }

    #[test]
    fn write_output_creates_parents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a/b/c.txt");
        write_output(&path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn url_path_uses_forward_slashes() {
        assert_eq!(url_path(Path::new("css/style.min.css")), "css/style.min.css");
        assert_eq!(url_path(Path::new("index.html")), "index.html");
    }

    #[test]
    fn io_error_message_includes_path() {
        let err = TaskError::io("/nowhere/file")(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        assert_eq!(err.to_string(), "IO error on /nowhere/file: gone");
    }
}
