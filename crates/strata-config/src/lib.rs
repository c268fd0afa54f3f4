//! Configuration for a Strata VFS: the mount table, path policy and logging.
//!
//! Configs are TOML. Every table rejects unknown keys so a typo in a mount
//! entry fails loudly instead of silently dropping the mount.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Which kind of content source a [`MountConfig`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    /// A plain directory on the host file system.
    Directory,
    /// A zip asset pack.
    Pack,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    pub kind: MountKind,
    /// Host path, relative to the VFS base directory unless absolute.
    pub path: PathBuf,
    /// Rooted VFS prefix the source is mounted under.
    #[serde(default = "MountConfig::default_prefix")]
    pub prefix: String,
}

impl MountConfig {
    fn default_prefix() -> String {
        "/".to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VfsConfig {
    /// Reject paths that could not be materialized on Windows (illegal
    /// characters, reserved device names).
    #[serde(default = "VfsConfig::default_strict_paths")]
    pub strict_paths: bool,

    /// Run the background case-mismatch check on directory lookups.
    ///
    /// Defaults to enabled in debug builds only.
    #[serde(default)]
    pub case_check: Option<bool>,

    /// Mounts in priority order; the first entry wins on conflicts.
    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VfsConfig {
    fn default_strict_paths() -> bool {
        true
    }

    pub fn effective_case_check(&self) -> bool {
        self.case_check.unwrap_or(cfg!(debug_assertions))
    }

    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(
            target = "strata.config",
            path = %path.display(),
            mounts = config.mounts.len(),
            strict_paths = config.strict_paths,
            "loaded vfs config"
        );
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            strict_paths: Self::default_strict_paths(),
            case_check: None,
            mounts: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level, or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path.
    ///
    /// If the file cannot be opened, file logging is disabled while other sinks
    /// remain active.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    /// `level` as `EnvFilter` directives. Bare level names are matched
    /// case-insensitively (`warning` means `warn`); anything else is passed
    /// through as a directive string.
    pub(crate) fn directives(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            return Self::default_level();
        }
        if level.eq_ignore_ascii_case("warning") {
            return "warn".to_owned();
        }
        let is_bare_level = ["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|name| level.eq_ignore_ascii_case(name));
        if is_bare_level {
            level.to_ascii_lowercase()
        } else {
            level.to_owned()
        }
    }

    /// The effective filter: the configured directives with `RUST_LOG`
    /// layered on top. Whichever combination parses first wins, down to a
    /// plain `info` filter.
    pub fn env_filter(&self) -> EnvFilter {
        let configured = self.directives();
        let mut candidates = Vec::with_capacity(3);
        if let Ok(env) = std::env::var("RUST_LOG") {
            let env = env.trim();
            if !env.is_empty() {
                candidates.push(format!("{configured},{env}"));
                candidates.push(env.to_owned());
            }
        }
        candidates.push(configured);

        candidates
            .into_iter()
            .find_map(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.message().to_owned())
    }
}

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber described by `config`.
///
/// Only the first call in a process has an effect. If another subscriber is
/// already installed this is a no-op.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let file = config
            .file
            .as_ref()
            .and_then(|path| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
            })
            .map(Arc::new);

        let make_writer = match (config.stderr, file) {
            (true, Some(file)) => BoxMakeWriter::new(std::io::stderr.and(file)),
            (true, None) => BoxMakeWriter::new(std::io::stderr),
            (false, Some(file)) => BoxMakeWriter::new(file),
            (false, None) => BoxMakeWriter::new(std::io::sink),
        };

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let _ = tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init();
    });
}
