//! Locating and parsing `pz-watchdog.toml`.

use std::path::{Path, PathBuf};

use super::WatchConfig;

/// File name searched for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pz-watchdog.toml";

/// Finds the watchdog's TOML file; the first existing candidate wins.
#[derive(Debug)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
    /// A missing file is an error rather than a fallback to defaults.
    required: bool,
}

impl ConfigLoader {
    /// Look in the working directory, then in `<config_dir>/pz-watchdog/`.
    #[must_use]
    pub fn new() -> Self {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("pz-watchdog").join("config.toml"));
        }
        Self {
            candidates,
            required: false,
        }
    }

    /// Only consider `path` (the `--config` flag). It must exist.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![path],
            required: true,
        }
    }

    /// Parse the first existing candidate, or fall back to defaults.
    ///
    /// The result is not validated; command-line overrides are usually
    /// applied first, then [`WatchConfig::validate`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed, or if
    /// an explicit path does not exist.
    pub fn load(&self) -> Result<WatchConfig, ConfigError> {
        match self.find_config_file() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Reading watchdog config");
                Self::parse_file(&path)
            }
            None if self.required => Self::parse_file(&self.candidates[0]),
            None => {
                tracing::debug!(candidates = ?self.candidates, "No watchdog config file, using defaults");
                Ok(WatchConfig::default())
            }
        }
    }

    fn parse_file(path: &Path) -> Result<WatchConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Candidate files in priority order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// The candidate [`load`](Self::load) would read.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|p| p.is_file()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchConfig {
    /// Check the invariants the daemon relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rcon.password.trim().is_empty() {
            return Err(ConfigError::Invalid("RCON password cannot be empty".into()));
        }
        if self.rcon.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "rcon.timeout_secs must be greater than 0".into(),
            ));
        }
        if !self.mod_check.external_scheduler && self.mod_check.poll_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "mod_check.poll_interval_minutes must be greater than 0 when no external scheduler is used"
                    .into(),
            ));
        }
        if self.mod_check.poll_interval_minutes.checked_mul(60).is_none() {
            return Err(ConfigError::Invalid(
                "mod_check.poll_interval_minutes is too large".into(),
            ));
        }
        if self.logs.idle_millis == 0 || self.logs.empty_retry_secs == 0 {
            return Err(ConfigError::Invalid(
                "logs.idle_millis and logs.empty_retry_secs must be greater than 0".into(),
            ));
        }
        glob::Pattern::new(&self.logs.pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: self.logs.pattern.clone(),
            source: e,
        })?;
        if self.restart.timing.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "restart.timing.poll_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Errors from loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid log file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
