//! Configuration file parsing and structures.
//!
//! Configuration is TOML. Several files may be given (e.g. a base file plus one
//! holding gateway EUIDs); they are merged with first-wins semantics and a
//! gateway defined in more than one file is an error.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use crate::client::GatewayEntry;
use crate::error::ConfigError;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,

    /// Gateway config entries keyed by entry id
    pub gateways: BTreeMap<String, GatewayEntry>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"it600::mirror" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

/// One configuration file as written, before merging.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    #[serde(default)]
    logging: Option<PartialLoggingConfig>,
    #[serde(default)]
    gateways: BTreeMap<String, GatewayEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    level: Option<LogLevel>,
    #[serde(default)]
    overrides: HashMap<String, LogLevel>,
}

impl Config {
    /// Load configuration from a single TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_files(&[path.as_ref().to_path_buf()])
    }

    /// Load and merge configuration from multiple TOML files
    ///
    /// The first file to set `logging.level` wins; overrides and gateways are
    /// combined.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut partials = Vec::with_capacity(paths.len());
        for path in paths {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            partials.push(toml::from_str::<PartialConfig>(&content)?);
        }
        Self::merge(partials)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::merge(vec![toml::from_str(content)?])
    }

    fn merge(partials: Vec<PartialConfig>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let mut level = None;

        for partial in partials {
            if let Some(logging) = partial.logging {
                level = level.or(logging.level);
                for (target, target_level) in logging.overrides {
                    config.logging.overrides.entry(target).or_insert(target_level);
                }
            }

            for (entry_id, entry) in partial.gateways {
                if config.gateways.contains_key(&entry_id) {
                    return Err(ConfigError::Invalid {
                        entry: entry_id,
                        reason: "defined in more than one file".to_string(),
                    });
                }
                config.gateways.insert(entry_id, entry);
            }
        }

        config.logging.level = level.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (entry_id, entry) in &self.gateways {
            let invalid = |reason: &str| ConfigError::Invalid {
                entry: entry_id.clone(),
                reason: reason.to_string(),
            };
            if entry.host.trim().is_empty() {
                return Err(invalid("host must not be empty"));
            }
            if entry.euid.trim().is_empty() {
                return Err(invalid("euid must not be empty"));
            }
            if entry.port == 0 {
                return Err(invalid("port must not be 0"));
            }
        }
        Ok(())
    }
}
