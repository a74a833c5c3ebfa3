//! # Configuration
//!
//! Optional `famtree.toml`, read from the working directory or from the path
//! given with `--config`. Every section and key may be omitted. Command-line
//! flags override file values, and `FAMTREE_LOG_FORMAT` overrides
//! `logging.format`.
//!
//! ```toml
//! [store]
//! path = "family.ftree"
//! format = "binary"
//!
//! [logging]
//! format = "text"
//! filter = "famtree=info"
//!
//! [graph]
//! ancestors = false
//! descendants = false
//! output_format = "dot"
//! ```

use clap::ValueEnum;
use famtree_core::FamtreeError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "famtree.toml";

/// Database file used when neither flag nor config names one.
pub const DEFAULT_DATABASE: &str = "family.ftree";

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "famtree=info";

/// Environment variable selecting text or JSON logs.
pub const LOG_FORMAT_ENV: &str = "FAMTREE_LOG_FORMAT";

// =============================================================================
// VALUE ENUMS
// =============================================================================

/// On-disk encoding of the record store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// Header + postcard payload.
    #[default]
    Binary,
    /// Pretty-printed JSON document.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse the environment override; unknown values fall back to text.
    #[must_use]
    pub fn from_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Projection output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Dot,
    Json,
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    pub format: Option<StoreFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    #[serde(default)]
    pub ancestors: bool,
    #[serde(default)]
    pub descendants: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if present.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, FamtreeError> {
        let (file, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !file.exists() {
            if explicit {
                return Err(FamtreeError::IoError(format!(
                    "Config file '{}' not found",
                    file.display()
                )));
            }
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&file).map_err(|e| {
            FamtreeError::IoError(format!("Failed to read config '{}': {e}", file.display()))
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            FamtreeError::DeserializationError(message) => FamtreeError::DeserializationError(
                format!("Failed to parse config '{}': {message}", file.display()),
            ),
            other => other,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, FamtreeError> {
        toml::from_str(contents).map_err(|e| FamtreeError::DeserializationError(e.to_string()))
    }

    /// The database path: flag, then config, then [`DEFAULT_DATABASE`].
    #[must_use]
    pub fn database(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    /// The store format: flag, then config, then binary.
    #[must_use]
    pub fn store_format(&self, flag: Option<StoreFormat>) -> StoreFormat {
        flag.or(self.store.format).unwrap_or_default()
    }

    /// The log format: environment value, then config.
    #[must_use]
    pub fn log_format(&self, env_value: Option<&str>) -> LogFormat {
        env_value.map_or(self.logging.format, LogFormat::from_env_value)
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

// =============================================================================
// TESTS
// =============================================================================
