//! Optional TOML config file, read only when `-c/--config` names one.
//!
//! Without `-c` no file is consulted, so a run without `-e` keeps the
//! match-everything default. Command-line flags are merged on top in
//! [`Settings::resolve`], which produces the single object the rest of the
//! run reads from.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::filter::PatternSet;

/// Seconds to wait for input when neither the CLI nor the config file say otherwise.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 3;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0} bytes (max {max} bytes)", max = Config::MAX_FILE_SIZE)]
    TooLarge(u64),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Contents of the config file. Any subset of keys may be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Title filters, in evaluation order.
    pub patterns: Vec<String>,

    /// Seconds to wait for input on stdin.
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Loads the config file the user named.
    ///
    /// The file must exist. An empty file yields the defaults; unknown keys
    /// are rejected so a typo does not silently drop a filter.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let size = std::fs::metadata(path)?.len();
        if size > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(size));
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            patterns = config.patterns.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub patterns: Vec<String>,
    pub timeout_seconds: u64,
}

impl Settings {
    /// Merges command-line values over the config file.
    ///
    /// Patterns given on the command line replace the config file's list
    /// entirely; a timeout given on the command line wins over the file.
    pub fn resolve(config: Config, cli_patterns: Vec<String>, cli_timeout: Option<u64>) -> Self {
        let patterns = if cli_patterns.is_empty() {
            config.patterns
        } else {
            cli_patterns
        };
        Self {
            patterns,
            timeout_seconds: cli_timeout.unwrap_or(config.timeout_seconds),
        }
    }

    /// Resolves settings from command-line values, reading `config_path`
    /// only when one was given.
    pub fn from_cli(
        config_path: Option<&Path>,
        cli_patterns: Vec<String>,
        cli_timeout: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        Ok(Self::resolve(config, cli_patterns, cli_timeout))
    }

    /// Builds the pattern set: the first pattern replaces the default
    /// wildcard, the rest are appended.
    pub fn pattern_set(&self) -> PatternSet {
        PatternSet::from_patterns(&self.patterns)
    }
}

// ============================================================================
// Tests
// ============================================================================
