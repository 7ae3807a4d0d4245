//! Watch mode: rebuild on source changes.
//!
//! The source root is watched recursively through a debounced `notify`
//! watcher. Every changed path is matched, relative to the source root,
//! against a fixed set of [`Binding`]s:
//!
//! | Globs | Reaction |
//! |---|---|
//! | `styles.watch` | `styles`, then a stylesheet swap signal |
//! | `scripts.watch` | `scripts`, then an asset signal |
//! | `markup.pattern` | `markup`, then a full reload signal |
//!
//! Each binding has its own worker thread. Triggers that arrive while the
//! worker is busy collapse into one follow-up run, so a burst of saves never
//! queues a burst of rebuilds and one artifact is never written by two
//! threads at once. A failing or panicking reaction is reported and watching
//! continues.

use crate::config::{PipelineConfig, Project};
use crate::graph::catch_panic;
use crate::output;
use crate::pipeline::Task;
use crate::server::ReloadHub;
use crate::tasks::sources::{compile_pattern, matches_any};
use crate::tasks::{TaskContext, TaskError, TaskReport};
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often blocked loops wake up to check for cancellation.
const POLL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize file watcher: {0}")]
    Init(notify::Error),
    #[error("Failed to watch {}: {source}", .path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error(transparent)]
    Pattern(#[from] TaskError),
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// What to rebuild when a binding fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Styles,
    Scripts,
    Markup,
}

impl Reaction {
    pub fn task(self) -> Task {
        match self {
            Reaction::Styles => Task::Styles,
            Reaction::Scripts => Task::Scripts,
            Reaction::Markup => Task::Markup,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub patterns: Vec<Pattern>,
    pub reaction: Reaction,
}

impl Binding {
    /// True if a source-relative path should trigger this binding.
    pub fn matches(&self, relative: &Path) -> bool {
        matches_any(&self.patterns, relative)
    }
}

/// Build the watch bindings from config.
pub fn bindings(config: &PipelineConfig) -> Result<Vec<Binding>, WatchError> {
    let compile = |globs: &[String]| -> Result<Vec<Pattern>, WatchError> {
        Ok(globs
            .iter()
            .map(|g| compile_pattern(g))
            .collect::<Result<_, _>>()?)
    };
    Ok(vec![
        Binding {
            patterns: compile(&config.styles.watch)?,
            reaction: Reaction::Styles,
        },
        Binding {
            patterns: compile(&config.scripts.watch)?,
            reaction: Reaction::Scripts,
        },
        Binding {
            patterns: compile(std::slice::from_ref(&config.markup.pattern))?,
            reaction: Reaction::Markup,
        },
    ])
}

/// Shared stop flag for [`watch`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run one reaction and report the outcome. Errors are reported, not raised.
pub fn react(reaction: Reaction, ctx: TaskContext) -> Result<TaskReport, TaskError> {
    let task = reaction.task();
    let started = Instant::now();
    let result = catch_panic(|| task.run(ctx));
    if let Err(e) = &result {
        tracing::error!(task = task.name(), error = %e, "watch rebuild failed");
    }
    output::print_reaction(task.name(), &result, started.elapsed());
    result
}

/// Worker loop for one binding: wait for a trigger, drain the backlog, run.
///
/// The worker outlives a panicking `rebuild`; the next trigger runs it again.
fn work<F: Fn()>(triggers: mpsc::Receiver<()>, cancel: &CancelToken, rebuild: F) {
    loop {
        match triggers.recv_timeout(POLL) {
            Ok(()) => {
                while triggers.try_recv().is_ok() {}
                if cancel.is_cancelled() {
                    return;
                }
                if panic::catch_unwind(AssertUnwindSafe(&rebuild)).is_err() {
                    tracing::error!("watch rebuild panicked, worker continues");
                }
            }
            Err(RecvTimeoutError::Timeout) if cancel.is_cancelled() => return,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Watch the source tree and rebuild until `cancel` is set.
///
/// Blocks the calling thread. Returns only on cancellation or if the
/// watcher cannot be set up.
pub fn watch(project: &Project, hub: &ReloadHub, cancel: &CancelToken) -> Result<(), WatchError> {
    let source = project.source_root();
    let source = source
        .canonicalize()
        .map_err(|_| WatchError::SourceNotFound(source.clone()))?;
    let bindings = bindings(&project.config)?;

    let (tx, events) = mpsc::channel();
    let debounce = Duration::from_millis(project.config.watch.debounce_ms);
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::Init)?;
    debouncer
        .watcher()
        .watch(&source, RecursiveMode::Recursive)
        .map_err(|e| WatchError::Path {
            path: source.clone(),
            source: e,
        })?;
    tracing::info!(source = %source.display(), "watching for changes");

    let ctx = TaskContext::new(project).with_reload(hub);

    thread::scope(|scope| {
        let mut workers: Vec<(&Binding, Sender<()>)> = Vec::new();
        for binding in &bindings {
            let (trigger, triggers) = mpsc::channel();
            let reaction = binding.reaction;
            scope.spawn(move || {
                work(triggers, cancel, || {
                    let _ = react(reaction, ctx);
                })
            });
            workers.push((binding, trigger));
        }

        while !cancel.is_cancelled() {
            let batch = match events.recv_timeout(POLL) {
                Ok(Ok(batch)) => batch,
                Ok(Err(error)) => {
                    tracing::warn!(?error, "watch error, continuing");
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            for (binding, trigger) in &workers {
                let hit = batch.iter().find_map(|event| {
                    let relative = event.path.strip_prefix(&source).ok()?;
                    binding.matches(relative).then_some(relative)
                });
                if let Some(relative) = hit {
                    tracing::debug!(
                        path = %relative.display(),
                        reaction = ?binding.reaction,
                        "watch trigger"
                    );
                    let _ = trigger.send(());
                }
            }
        }
        // Dropping the senders lets idle workers exit.
        drop(workers);
    });

    tracing::info!("watch stopped");
    Ok(())
}
