//! Runtime configuration.
//!
//! Loaded from TOML (`servitor.toml`) or built in code; every field falls back
//! to the constants in [`crate::defaults`].

use crate::defaults::{
    DEFAULT_PENDING_QUEUE_CAPACITY, DEFAULT_POLL_EVENTS, DEFAULT_RUN_QUEUE_CAPACITY,
    DEFAULT_WORKERS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written as TOML
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Scheduler sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Worker threads; `0` means one per CPU core.
    pub workers: usize,

    /// Capacity of the run queue.
    pub run_queue_capacity: usize,

    /// Capacity of the pending-operation queue.
    pub pending_queue_capacity: usize,

    /// Events fetched per reactor poll.
    pub poll_events: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            run_queue_capacity: DEFAULT_RUN_QUEUE_CAPACITY,
            pending_queue_capacity: DEFAULT_PENDING_QUEUE_CAPACITY,
            poll_events: DEFAULT_POLL_EVENTS,
        }
    }
}

impl RuntimeConfig {
    /// Load a configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML, in the format [`Self::from_str`] reads
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Check that every capacity is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "run_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.pending_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pending_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.poll_events == 0 {
            return Err(ConfigError::Invalid(
                "poll_events must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of worker threads to start, resolving `0` to the CPU count.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Override the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Override the capacity of both queues
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.run_queue_capacity = capacity;
        self.pending_queue_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.run_queue_capacity, 4096);
        assert_eq!(config.pending_queue_capacity, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = RuntimeConfig::from_str("workers = 8\nrun_queue_capacity = 16\n").unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.run_queue_capacity, 16);
        // Unspecified fields keep their defaults
        assert_eq!(config.pending_queue_capacity, DEFAULT_PENDING_QUEUE_CAPACITY);
    }

    #[test]
    fn test_reject_zero_capacity() {
        let err = RuntimeConfig::from_str("pending_queue_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_reject_unknown_field() {
        let err = RuntimeConfig::from_str("threads = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servitor.toml");
        std::fs::write(&path, "workers = 2\npoll_events = 64\n").unwrap();

        let config = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.poll_events, 64);

        let missing = RuntimeConfig::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RuntimeConfig::default()
            .with_workers(6)
            .with_queue_capacity(32);
        let text = config.to_toml().unwrap();
        assert!(text.contains("workers = 6"));
        assert_eq!(RuntimeConfig::from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_effective_workers() {
        assert_eq!(RuntimeConfig::default().with_workers(3).effective_workers(), 3);
        assert_eq!(
            RuntimeConfig::default().with_workers(0).effective_workers(),
            num_cpus::get()
        );
    }

    #[test]
    fn test_with_queue_capacity() {
        let config = RuntimeConfig::default().with_queue_capacity(8);
        assert_eq!(config.run_queue_capacity, 8);
        assert_eq!(config.pending_queue_capacity, 8);
    }
}
