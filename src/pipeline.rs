//! The two pipelines, as task graphs.
//!
//! ```text
//! build: clean ─► copy ─► optimize-images ─┬─► styles
//!                                          ├─► markup
//!                                          ├─► scripts
//!                                          ├─► svg
//!                                          ├─► sprite
//!                                          └─► next-gen-images
//!
//! dev:   clean ─► copy ─► copy-images ─► (same six)
//! ```
//!
//! `dev` swaps the raster optimizer for a plain copy so the first page load
//! is not held up by encoders; the server and watcher start after it.

use crate::graph::{GraphError, GraphRun, TaskGraph, TaskState};
use crate::tasks::{self, TaskContext, TaskError, TaskReport};
use thiserror::Error;

/// Every task either pipeline can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Clean,
    Copy,
    OptimizeImages,
    CopyImages,
    Styles,
    Markup,
    Scripts,
    Svg,
    Sprite,
    NextGenImages,
}

/// Tasks that only need the build tree to exist, in display order.
const GROUP: [Task; 6] = [
    Task::Styles,
    Task::Markup,
    Task::Scripts,
    Task::Svg,
    Task::Sprite,
    Task::NextGenImages,
];

impl Task {
    pub fn name(self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::Copy => "copy",
            Task::OptimizeImages => "optimize-images",
            Task::CopyImages => "copy-images",
            Task::Styles => "styles",
            Task::Markup => "markup",
            Task::Scripts => "scripts",
            Task::Svg => "svg",
            Task::Sprite => "sprite",
            Task::NextGenImages => "next-gen-images",
        }
    }

    pub fn run(self, ctx: TaskContext) -> Result<TaskReport, TaskError> {
        match self {
            Task::Clean => tasks::clean::clean(ctx),
            Task::Copy => tasks::copy::copy_static(ctx),
            Task::OptimizeImages => tasks::images::optimize(ctx),
            Task::CopyImages => tasks::copy::copy_images(ctx),
            Task::Styles => tasks::styles::compile(ctx),
            Task::Markup => tasks::markup::minify(ctx),
            Task::Scripts => tasks::scripts::minify(ctx),
            Task::Svg => tasks::svg::optimize_standalone(ctx),
            Task::Sprite => tasks::svg::build_sprite(ctx),
            Task::NextGenImages => tasks::images::next_gen(ctx),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PipelineKind {
    /// Optimized one-shot build.
    Build,
    /// Fast build for the dev server.
    Dev,
}

impl PipelineKind {
    pub fn name(self) -> &'static str {
        match self {
            PipelineKind::Build => "build",
            PipelineKind::Dev => "dev",
        }
    }
}

pub type PipelineRun = GraphRun<TaskReport, TaskError>;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{} failed ({} skipped)", .failed.join(", "), .skipped)]
pub struct PipelineFailed {
    pub failed: Vec<String>,
    pub skipped: usize,
}

/// The task graph for `kind`.
pub fn graph(kind: PipelineKind) -> Result<TaskGraph<Task>, GraphError> {
    let images = match kind {
        PipelineKind::Build => Task::OptimizeImages,
        PipelineKind::Dev => Task::CopyImages,
    };

    let mut graph = TaskGraph::new();
    graph.add(Task::Clean.name(), Task::Clean, &[])?;
    graph.add(Task::Copy.name(), Task::Copy, &[Task::Clean.name()])?;
    graph.add(images.name(), images, &[Task::Copy.name()])?;
    for task in GROUP {
        graph.add(task.name(), task, &[images.name()])?;
    }
    Ok(graph)
}

/// Run the pipeline to completion.
pub fn run(kind: PipelineKind, ctx: TaskContext) -> Result<PipelineRun, GraphError> {
    let graph = graph(kind)?;
    tracing::info!(pipeline = kind.name(), tasks = graph.len(), "pipeline started");
    let run = graph.execute(|_, task| task.run(ctx));
    tracing::info!(
        pipeline = kind.name(),
        success = run.is_success(),
        "pipeline finished"
    );
    Ok(run)
}

/// `Err` if any task failed or was skipped.
pub fn check(run: &PipelineRun) -> Result<(), PipelineFailed> {
    if run.is_success() {
        return Ok(());
    }
    let failed = run.errors().map(|(name, _)| name.to_string()).collect();
    let skipped = run
        .outcomes
        .iter()
        .filter(|o| o.state == TaskState::Skipped)
        .count();
    Err(PipelineFailed { failed, skipped })
}
