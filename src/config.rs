//! TOML configuration.
//!
//! Lookup order: explicit path, then `MINQ_CONFIG`, then `./minq.toml`, then defaults.
//! `MINQ_SLOW_COMMAND_MS` overrides the slow-command threshold from any source.

use crate::errors::DbError;
use bson::{Document, doc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// File logging is set up by [`Config::apply`] only when enabled.
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub level: String,
    pub retention: usize,
    pub dev6: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            level: "info".into(),
            retention: crate::logger::DEFAULT_RETENTION,
            dev6: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub slow_command_ms: u64,
    /// Starting options of every query.
    pub default_options: Document,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { slow_command_ms: 500, default_options: doc! { "safe": true } }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub query: QueryConfig,
}

impl Config {
    /// # Errors
    /// Returns `DbError::Config` when the text is not valid configuration.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// Returns `DbError::Io` if the file cannot be read, `DbError::Config` if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolve configuration from the usual places.
    ///
    /// An explicit `path` must exist; the implicit locations are skipped when absent.
    ///
    /// # Errors
    /// Returns an error when the chosen file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, DbError> {
        let mut cfg = match Self::locate(path) {
            Some(p) => {
                log::debug!("loading configuration from {}", p.display());
                Self::from_file(&p)?
            }
            None => Self::default(),
        };
        if let Some(ms) = std::env::var("MINQ_SLOW_COMMAND_MS").ok().and_then(|s| s.parse().ok()) {
            cfg.query.slow_command_ms = ms;
        }
        Ok(cfg)
    }

    fn locate(path: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = path {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("MINQ_CONFIG") {
            return Some(PathBuf::from(p));
        }
        std::env::current_dir().ok().map(|d| d.join("minq.toml")).filter(|p| p.exists())
    }

    /// Push settings into the process: slow-command threshold, and file logging when enabled.
    ///
    /// # Errors
    /// Returns an error if logging cannot be configured.
    pub fn apply(&self) -> Result<(), DbError> {
        crate::telemetry::set_slow_command_ms(self.query.slow_command_ms);
        if self.logging.enabled {
            let l = &self.logging;
            crate::logger::configure_logging_with_dev(
                l.dir.as_deref(),
                Some(l.level.as_str()),
                Some(l.retention),
                l.dev6,
            )?;
        }
        Ok(())
    }
}
