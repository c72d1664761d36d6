//! Engine configuration from environment variables

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the engine and its command interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sqlite database path for the durable job store.
    pub db_path: String,
    /// Bound on simultaneously running jobs.
    pub max_concurrent_jobs: usize,
    /// Initial value of the auto-exploit gate. Default false.
    pub auto_exploit: bool,
    /// HTTP listen port for the command interface.
    pub port: u16,
    /// Event bus channel capacity.
    pub event_bus_capacity: usize,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db_path: std::env::var("KRAIT_DB_PATH")
                .unwrap_or_else(|_| "./krait.db".to_string()),
            max_concurrent_jobs: parse_var("KRAIT_MAX_CONCURRENT_JOBS", 4)?,
            auto_exploit: parse_bool("KRAIT_AUTO_EXPLOIT", false)?,
            port: parse_var("KRAIT_PORT", 8080)?,
            event_bus_capacity: parse_var("KRAIT_EVENT_BUS_CAPACITY", 1024)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue(
                "KRAIT_MAX_CONCURRENT_JOBS must be > 0".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "KRAIT_EVENT_BUS_CAPACITY must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: "./krait.db".to_string(),
            max_concurrent_jobs: 4,
            auto_exploit: false,
            port: 8080,
            event_bus_capacity: 1024,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue(name.to_string())),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_jobs, 4);
        assert!(!config.auto_exploit);
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = EngineConfig {
            max_concurrent_jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
