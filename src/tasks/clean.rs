//! Remove the build tree.

use super::{TaskContext, TaskError, TaskReport};
use std::io::ErrorKind;

/// Delete the build root and everything under it.
///
/// A build root that does not exist yet counts as already clean.
pub fn clean(ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let build_root = ctx.project.build_root();
    match std::fs::remove_dir_all(&build_root) {
        Ok(()) => Ok(TaskReport::default().note(format!("removed {}", build_root.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Ok(TaskReport::default().note("nothing to remove"))
        }
        Err(e) => Err(TaskError::io(&build_root)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, Project};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn clean_removes_build_tree() {
        let tmp = TempDir::new().unwrap();
        let project = Project::new(tmp.path(), PipelineConfig::default());
        let nested = project.build_root().join("css/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("stale.css"), "a{}").unwrap();

        clean(TaskContext::new(&project)).unwrap();

        assert!(!project.build_root().exists());
    }

    #[test]
    fn clean_missing_build_tree_succeeds() {
        let tmp = TempDir::new().unwrap();
        let project = Project::new(tmp.path(), PipelineConfig::default());

        let report = clean(TaskContext::new(&project)).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.notes, vec!["nothing to remove"]);
    }

    #[test]
    fn clean_leaves_sources_alone() {
        let tmp = TempDir::new().unwrap();
        let project = Project::new(tmp.path(), PipelineConfig::default());
        fs::create_dir_all(project.source_root()).unwrap();
        fs::write(project.source_root().join("index.html"), "<p>hi</p>").unwrap();
        fs::create_dir_all(project.build_root()).unwrap();

        clean(TaskContext::new(&project)).unwrap();

        assert!(project.source_root().join("index.html").exists());
    }
}
