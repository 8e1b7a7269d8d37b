//! Environment-driven bridge configuration.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Env var selecting the log level (`trace|debug|info|warn|error`).
pub const ENV_LOG_LEVEL: &str = "HOSTBRIDGE_LOG_LEVEL";
/// Env var holding the absolute log directory; file logging is off when unset.
pub const ENV_LOG_DIR: &str = "HOSTBRIDGE_LOG_DIR";
/// Env var toggling stdout echo of diagnostic lines (`1|0|true|false`).
pub const ENV_ECHO_DIAGNOSTICS: &str = "HOSTBRIDGE_ECHO_DIAGNOSTICS";

/// Resolved bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub echo_diagnostics: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            echo_diagnostics: true,
        }
    }
}

impl BridgeConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, treating blank values as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(level) = read(ENV_LOG_LEVEL) {
            let normalized = normalize_level(&level).map_err(|_| ConfigError::InvalidValue {
                key: ENV_LOG_LEVEL,
                value: level.clone(),
            })?;
            config.log_level = normalized.to_string();
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            let path = PathBuf::from(&dir);
            if !path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_LOG_DIR,
                    value: dir,
                });
            }
            config.log_dir = Some(path);
        }
        if let Some(echo) = read(ENV_ECHO_DIAGNOSTICS) {
            config.echo_diagnostics = parse_flag(&echo).ok_or(ConfigError::InvalidValue {
                key: ENV_ECHO_DIAGNOSTICS,
                value: echo,
            })?;
        }
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value for {key}: `{value}`"),
        }
    }
}

impl Error for ConfigError {}
