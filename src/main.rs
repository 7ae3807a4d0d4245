use clap::{Parser, Subcommand};
use simple_assets::config::{self, Project};
use simple_assets::output;
use simple_assets::pipeline::{self, PipelineKind};
use simple_assets::server::ServerSession;
use simple_assets::tasks::TaskContext;
use simple_assets::watch::{self, CancelToken};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-assets")]
#[command(about = "Asset build pipeline and live-reload dev server for static sites")]
#[command(long_about = "\
Asset build pipeline and live-reload dev server for static sites

Sources live under src/, everything generated lands in build/:

  project/
  ├── simple-assets.toml       # Optional overrides (see gen-config)
  └── src/
      ├── index.html           # *.html → build/*.html, whitespace collapsed
      ├── sass/style.scss      # → build/css/style.min.css, prefixed + minified
      ├── js/script.js         # → build/js/script.min.js
      ├── img/                 # rasters optimized + next-gen copy, SVGs optimized
      │   └── icons/*.svg      # → build/img/sprite.svg (one <symbol> per icon)
      ├── fonts/*.woff2        # copied as-is
      ├── favicon.ico          # copied as-is
      └── manifest.webmanifest # copied as-is

Without a command, runs the dev pipeline, serves build/ with live reload
and rebuilds on changes.

Run 'simple-assets gen-config' to print a documented simple-assets.toml.")]
#[command(version)]
struct Cli {
    /// Project root (holds simple-assets.toml and the source tree)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fast build, then serve the build tree and rebuild on changes
    #[command(alias = "default")]
    Dev,
    /// Optimized one-shot build
    Build,
    /// Print the task stages of a pipeline
    Plan {
        #[arg(value_enum, default_value_t = PipelineKind::Build)]
        pipeline: PipelineKind,
    },
    /// Print a stock simple-assets.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command.unwrap_or(Command::Dev) {
        Command::Build => {
            let project = Project::load(&cli.root)?;
            init_thread_pool(&project.config.processing);

            println!(
                "==> Building {} → {}",
                project.source_root().display(),
                project.build_root().display()
            );
            let run = pipeline::run(PipelineKind::Build, TaskContext::new(&project))?;
            output::print_run(&run);
            pipeline::check(&run)?;
            println!("==> Build complete: {}", project.build_root().display());
        }
        Command::Dev => {
            let project = Project::load(&cli.root)?;
            init_thread_pool(&project.config.processing);

            println!(
                "==> Building {} → {} (dev)",
                project.source_root().display(),
                project.build_root().display()
            );
            let run = pipeline::run(PipelineKind::Dev, TaskContext::new(&project))?;
            output::print_run(&run);
            if let Err(e) = pipeline::check(&run) {
                tracing::warn!(error = %e, "initial dev build incomplete");
                println!("==> Initial build incomplete ({e}); serving anyway");
            }

            let mut session = ServerSession::start(&project.build_root(), &project.config.server)?;
            println!("==> Serving {} at {}", project.build_root().display(), session.url());
            println!(
                "==> Watching {} for changes (Ctrl-C to stop)",
                project.source_root().display()
            );
            watch::watch(&project, session.hub(), &CancelToken::new())?;
            session.stop();
        }
        Command::Plan { pipeline: kind } => {
            output::print_plan(kind.name(), &pipeline::graph(kind)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
