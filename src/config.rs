//! Pipeline configuration module.
//!
//! Handles loading and validating `simple-assets.toml`. The file is optional:
//! without it every task uses the stock layout below. Every table and key
//! falls back to its stock default, so a config file only needs the keys it
//! wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── simple-assets.toml     # Optional, overrides stock defaults
//! ├── src/                   # Source tree (source_dir)
//! └── build/                 # Build tree (build_dir), disposable
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! source_dir = "src"
//! build_dir = "build"
//!
//! [styles]
//! entry = "sass/style.scss"
//! output = "css/style.min.css"
//! watch = ["sass/**/*.scss"]
//! browsers = ["defaults"]     # browserslist queries for prefixing
//! source_map = true           # writes style.min.css.map next to the CSS
//!
//! [scripts]
//! entry = "js/script.js"
//! output = "js/script.min.js"
//! watch = ["js/script.js"]
//!
//! [markup]
//! pattern = "*.html"
//!
//! [images]
//! dir = "img"
//! extensions = ["png", "jpg"]
//! quality = 75
//! next_gen = "webp"           # or "avif"
//! icons_dir = "icons"
//! sprite = "sprite.svg"
//!
//! [copy]
//! patterns = ["fonts/*.woff2", "fonts/*.woff", "*.ico", "manifest.webmanifest"]
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! cors = true
//!
//! [watch]
//! debounce_ms = 100
//!
//! [processing]
//! max_processes = 4           # Max parallel image workers (omit for auto)
//! ```
//!
//! Unknown keys are rejected to catch typos early. `source_dir` and
//! `build_dir` must be relative, free of `..`, and not nested in each other.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the optional config file in the project root.
pub const CONFIG_FILENAME: &str = "simple-assets.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `simple-assets.toml`.
///
/// All paths inside the sections are relative: inputs to `source_dir`,
/// outputs to `build_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Source tree, relative to the project root.
    pub source_dir: PathBuf,
    /// Build tree, relative to the project root. Removed by `clean`.
    pub build_dir: PathBuf,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub markup: MarkupConfig,
    pub images: ImagesConfig,
    pub copy: CopyConfig,
    pub server: ServerConfig,
    pub watch: WatchConfig,
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            build_dir: PathBuf::from("build"),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            markup: MarkupConfig::default(),
            images: ImagesConfig::default(),
            copy: CopyConfig::default(),
            server: ServerConfig::default(),
            watch: WatchConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // clean removes build_dir wholesale, so it must stay strictly inside
        // the project root and away from the sources.
        let source = project_relative("source_dir", &self.source_dir)?;
        let build = project_relative("build_dir", &self.build_dir)?;
        if build.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "build_dir must be a subdirectory of the project root".into(),
            ));
        }
        if source == build {
            return Err(ConfigError::Validation(
                "source_dir and build_dir must differ".into(),
            ));
        }
        if source.starts_with(&build) {
            return Err(ConfigError::Validation(
                "source_dir must not be inside build_dir".into(),
            ));
        }
        if build.starts_with(&source) {
            return Err(ConfigError::Validation(
                "build_dir must not be inside source_dir".into(),
            ));
        }
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "images.extensions must not be empty".into(),
            ));
        }
        if self.images.icons_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "images.icons_dir must not be empty".into(),
            ));
        }
        for (key, value) in [
            ("styles.output", &self.styles.output),
            ("scripts.output", &self.scripts.output),
            ("images.sprite", &self.images.sprite),
        ] {
            if value.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.styles.browsers.is_empty() {
            return Err(ConfigError::Validation(
                "styles.browsers must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Check that `path` stays under the project root and drop `.` components.
fn project_relative(key: &str, path: &Path) -> Result<PathBuf, ConfigError> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ConfigError::Validation(format!(
                    "{key} must not contain '..'"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::Validation(format!(
                    "{key} must be relative to the project root"
                )));
            }
        }
    }
    Ok(normalized)
}

/// Style compiler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Entry stylesheet; partials are pulled in through its imports.
    pub entry: PathBuf,
    /// Output file, relative to the build tree.
    pub output: PathBuf,
    /// Globs that trigger a recompile in watch mode.
    pub watch: Vec<String>,
    /// Browserslist queries used for vendor prefixing.
    pub browsers: Vec<String>,
    /// Write `<output>.map` and link it from the stylesheet.
    pub source_map: bool,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("sass/style.scss"),
            output: PathBuf::from("css/style.min.css"),
            watch: vec!["sass/**/*.scss".to_string()],
            browsers: vec!["defaults".to_string()],
            source_map: true,
        }
    }
}

/// Script minifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    pub entry: PathBuf,
    pub output: PathBuf,
    pub watch: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("js/script.js"),
            output: PathBuf::from("js/script.min.js"),
            watch: vec!["js/script.js".to_string()],
        }
    }
}

/// Markup minifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    /// Glob for markup files. Also the watch glob.
    pub pattern: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            pattern: "*.html".to_string(),
        }
    }
}

/// Next-generation format written alongside each optimized raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextGenFormat {
    Webp,
    Avif,
}

impl NextGenFormat {
    pub fn extension(self) -> &'static str {
        match self {
            NextGenFormat::Webp => "webp",
            NextGenFormat::Avif => "avif",
        }
    }
}

/// Raster and vector image settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Image directory, relative to both the source and the build tree.
    pub dir: PathBuf,
    /// Raster extensions to optimize (case-insensitive).
    pub extensions: Vec<String>,
    /// Lossy encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    pub next_gen: NextGenFormat,
    /// Icon subdirectory of `dir`; its SVGs only ever end up in the sprite.
    pub icons_dir: PathBuf,
    /// Sprite file name, written into the build image directory.
    pub sprite: PathBuf,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("img"),
            extensions: vec!["png".to_string(), "jpg".to_string()],
            quality: 75,
            next_gen: NextGenFormat::Webp,
            icons_dir: PathBuf::from("icons"),
            sprite: PathBuf::from("sprite.svg"),
        }
    }
}

/// Static passthrough settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopyConfig {
    /// Globs relative to the source root; matches keep their relative path.
    pub patterns: Vec<String>,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                "fonts/*.woff2".to_string(),
                "fonts/*.woff".to_string(),
                "*.ico".to_string(),
                "manifest.webmanifest".to_string(),
            ],
        }
    }
}

/// Dev server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    /// Port to listen on; `0` picks a free one.
    pub port: u16,
    /// Send `Access-Control-Allow-Origin: *` and answer preflight requests.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors: true,
        }
    }
}

/// File watcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period before a burst of file events is delivered.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// A project root together with its resolved configuration.
///
/// Every task receives one of these; all filesystem locations are derived
/// from it.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: PipelineConfig,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Load the project at `root`, reading `simple-assets.toml` if present.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config = load_config(&root)?;
        Ok(Self { root, config })
    }

    pub fn source_root(&self) -> PathBuf {
        self.root.join(&self.config.source_dir)
    }

    pub fn build_root(&self) -> PathBuf {
        self.root.join(&self.config.build_dir)
    }

    /// Source image directory.
    pub fn image_source(&self) -> PathBuf {
        self.source_root().join(&self.config.images.dir)
    }

    /// Build image directory.
    pub fn image_build(&self) -> PathBuf {
        self.build_root().join(&self.config.images.dir)
    }
}

// =============================================================================
// Config loading and validation
// =============================================================================

/// Load config from the project root, falling back to stock defaults.
///
/// Every section is `#[serde(default)]`, so missing tables and keys take
/// their stock values straight from deserialization.
pub fn load_config(root: &Path) -> Result<PipelineConfig, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)?;
        toml::from_str(&content)?
    } else {
        PipelineConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `simple-assets.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# simple-assets configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Source tree and build tree, relative to this file.
source_dir = "src"
build_dir = "build"    # deleted and regenerated on every full build

# ---------------------------------------------------------------------------
# Styles: Sass entry → prefixed, minified CSS
# ---------------------------------------------------------------------------
[styles]
entry = "sass/style.scss"
output = "css/style.min.css"
# Changes matching these globs recompile the stylesheet in watch mode.
watch = ["sass/**/*.scss"]
# Browserslist queries that decide which vendor prefixes are emitted.
browsers = ["defaults"]
# Write style.min.css.map next to the stylesheet and link it.
source_map = true

# ---------------------------------------------------------------------------
# Scripts: entry script → minified script
# ---------------------------------------------------------------------------
[scripts]
entry = "js/script.js"
output = "js/script.min.js"
watch = ["js/script.js"]

# ---------------------------------------------------------------------------
# Markup: whitespace-collapsed HTML, same file names at the build root
# ---------------------------------------------------------------------------
[markup]
pattern = "*.html"

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
dir = "img"
# Raster formats to recompress (jpeg is accepted as an alias of jpg).
extensions = ["png", "jpg"]
# Lossy encoding quality (1 = worst, 100 = best).
quality = 75
# Next-gen copy written next to every raster: "webp" or "avif".
next_gen = "webp"
# SVGs in this subdirectory go into the sprite and nowhere else.
icons_dir = "icons"
sprite = "sprite.svg"

# ---------------------------------------------------------------------------
# Static passthrough (relative paths are preserved)
# ---------------------------------------------------------------------------
[copy]
patterns = ["fonts/*.woff2", "fonts/*.woff", "*.ico", "manifest.webmanifest"]

# ---------------------------------------------------------------------------
# Dev server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 3000
cors = true

[watch]
debounce_ms = 100

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_dir, PathBuf::from("src"));
        assert_eq!(config.build_dir, PathBuf::from("build"));
        assert_eq!(config.styles.output, PathBuf::from("css/style.min.css"));
        assert_eq!(config.scripts.output, PathBuf::from("js/script.min.js"));
        assert_eq!(config.images.sprite, PathBuf::from("sprite.svg"));
        assert_eq!(config.images.next_gen, NextGenFormat::Webp);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[images]
quality = 60
"##;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.images.quality, 60);
        // Defaults preserved within the same table
        assert_eq!(config.images.extensions, vec!["png", "jpg"]);
        assert_eq!(config.markup.pattern, "*.html");
    }

    #[test]
    fn parse_next_gen_avif() {
        let config: PipelineConfig = toml::from_str("[images]\nnext_gen = \"avif\"\n").unwrap();
        assert_eq!(config.images.next_gen, NextGenFormat::Avif);
        assert_eq!(config.images.next_gen.extension(), "avif");
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("[styles]\nentyr = \"x.scss\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r##"
build_dir = "public"

[server]
port = 8080
"##,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.build_dir, PathBuf::from("public"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.cors);
    }

    #[test]
    fn load_config_invalid_toml_errors() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is = not [valid").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_quality() {
        let mut config = PipelineConfig::default();
        config.images.quality = 0;
        assert!(config.validate().is_err());
        config.images.quality = 101;
        assert!(config.validate().is_err());
        config.images.quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_same_source_and_build() {
        let mut config = PipelineConfig::default();
        config.build_dir = config.source_dir.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn validate_rejects_project_root_as_build_dir() {
        let mut config = PipelineConfig::default();
        config.build_dir = PathBuf::from(".");
        assert!(config.validate().is_err());
        config.build_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_extensions() {
        let mut config = PipelineConfig::default();
        config.images.extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_keeps_defaults_beside_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[styles]\nbrowsers = [\"safari 13\"]\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.styles.browsers, vec!["safari 13"]);
        assert_eq!(config.styles.entry, PathBuf::from("sass/style.scss"));
        assert!(config.styles.source_map);
        assert_eq!(config.images, ImagesConfig::default());
    }

    #[test]
    fn load_config_validates_file_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "build_dir = \"..\"\n").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    fn validation_message(source_dir: &str, build_dir: &str) -> Option<String> {
        let config = PipelineConfig {
            source_dir: PathBuf::from(source_dir),
            build_dir: PathBuf::from(build_dir),
            ..PipelineConfig::default()
        };
        config.validate().err().map(|e| e.to_string())
    }

    #[test]
    fn validate_rejects_build_dir_outside_project() {
        let parent = validation_message("src", "..").unwrap();
        assert!(parent.contains("build_dir must not contain '..'"), "{parent}");
        let escape = validation_message("src", "build/../../elsewhere").unwrap();
        assert!(escape.contains("'..'"), "{escape}");
        let absolute = validation_message("src", "/").unwrap();
        assert!(absolute.contains("build_dir must be relative"), "{absolute}");
        let source = validation_message("/srv/site/src", "build").unwrap();
        assert!(source.contains("source_dir must be relative"), "{source}");
    }

    #[test]
    fn validate_rejects_nested_source_and_build() {
        let inside_build = validation_message("build/src", "build").unwrap();
        assert!(inside_build.contains("source_dir must not be inside build_dir"));
        let inside_source = validation_message("src", "src/build").unwrap();
        assert!(inside_source.contains("build_dir must not be inside source_dir"));
        let root_source = validation_message(".", "build").unwrap();
        assert!(root_source.contains("build_dir must not be inside source_dir"));
        // "./build" is the same directory as "build"
        let same = validation_message("src", "./src").unwrap();
        assert!(same.contains("must differ"));
    }

    #[test]
    fn validate_accepts_sibling_dirs() {
        assert_eq!(validation_message("site/src", "site/public"), None);
        assert_eq!(validation_message("./src", "dist/www"), None);
        // Prefix matching is by component, not by string.
        assert_eq!(validation_message("src", "src-build"), None);
    }

    #[test]
    fn project_paths() {
        let project = Project::new("/site", PipelineConfig::default());
        assert_eq!(project.source_root(), PathBuf::from("/site/src"));
        assert_eq!(project.build_root(), PathBuf::from("/site/build"));
        assert_eq!(project.image_source(), PathBuf::from("/site/src/img"));
        assert_eq!(project.image_build(), PathBuf::from("/site/build/img"));
    }

    #[test]
    fn effective_threads_clamps() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(1)
            }),
            1
        );
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(cores + 10)
            }),
            cores
        );
    }
}
