//! # Simple Assets
//!
//! A small asset build pipeline for static sites, with a live-reload dev
//! server. Sources live in one tree, every generated file in another, and the
//! generated tree is disposable: every build starts by deleting it.
//!
//! # Architecture: Task Graphs
//!
//! Each pipeline is a [`graph::TaskGraph`] of named tasks. A task starts as
//! soon as all of its predecessors completed, so independent tasks run
//! concurrently:
//!
//! ```text
//! clean → copy → optimize-images → { styles, markup, scripts, svg, sprite, next-gen-images }
//! ```
//!
//! The `dev` pipeline replaces `optimize-images` with a plain copy, then
//! starts the [`server`] and the [`watch`] loop. Watch reactions rebuild a
//! single artifact and push a [`server::ReloadSignal`] to open pages.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `simple-assets.toml` loading, merging over stock defaults, validation |
//! | [`graph`] | Generic DAG with a concurrent, failure-propagating executor |
//! | [`pipeline`] | The `build` and `dev` graphs and the [`pipeline::Task`] enum |
//! | [`tasks`] | One module per task: styles, markup, scripts, images, svg, copy, clean |
//! | [`imaging`] | Pure-Rust raster recompression and next-gen conversion |
//! | [`server`] | Static file server, reload client injection, server-sent events |
//! | [`watch`] | Debounced file watcher with per-artifact rebuild workers |
//! | [`output`] | CLI output formatting for plans, runs and watch reactions |
//!
//! # Design Decisions
//!
//! ## Failures Stay Local
//!
//! A failing task marks its descendants as skipped and leaves its siblings
//! alone. A one-shot build exits non-zero; a watch session reports the error
//! and keeps watching, so fixing the file is enough to recover.
//!
//! ## Pure-Rust Toolchain
//!
//! Sass, CSS prefixing, HTML and JS minification, raster codecs and SVG
//! optimization are all Rust crates linked into the binary. There is no Node
//! runtime and no system library to install.

pub mod config;
pub mod graph;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod tasks;
#[cfg(test)]
pub(crate) mod test_helpers;
pub mod watch;
