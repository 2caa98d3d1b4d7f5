//! Main application configuration
//!
//! This module defines the primary configuration structures for the scrim-hall
//! matchmaking service, including environment variable loading and validation.

use crate::config::rating::RatingSettings;
use crate::queue::QueueConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub rating: RatingSettings,
    /// Queues registered at startup
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking and lifecycle timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// How long players have to ready up before the match is cancelled
    pub ready_timeout_seconds: u64,
    /// How long a match may stay in progress before the vote times out
    pub vote_timeout_seconds: u64,
    /// Teardown delay after a match completes
    pub completed_grace_seconds: u64,
    /// Teardown delay after a match is cancelled
    pub cancelled_grace_seconds: u64,
    /// Interval of the global match-formation sweep
    pub sweep_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "scrim-hall".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            ready_timeout_seconds: 300,    // 5 minutes
            vote_timeout_seconds: 7200,    // 2 hours
            completed_grace_seconds: 30,
            cancelled_grace_seconds: 10,
            sweep_interval_seconds: 5,
        }
    }
}

impl MatchmakingSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_seconds)
    }

    pub fn vote_timeout(&self) -> Duration {
        Duration::from_secs(self.vote_timeout_seconds)
    }

    pub fn completed_grace(&self) -> Duration {
        Duration::from_secs(self.completed_grace_seconds)
    }

    pub fn cancelled_grace(&self) -> Duration {
        Duration::from_secs(self.cancelled_grace_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|e| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS: {}", e))?;
        }

        if let Ok(timeout) = env::var("READY_TIMEOUT_SECONDS") {
            config.matchmaking.ready_timeout_seconds = timeout
                .parse()
                .map_err(|e| anyhow!("Invalid READY_TIMEOUT_SECONDS: {}", e))?;
        }
        if let Ok(timeout) = env::var("VOTE_TIMEOUT_SECONDS") {
            config.matchmaking.vote_timeout_seconds = timeout
                .parse()
                .map_err(|e| anyhow!("Invalid VOTE_TIMEOUT_SECONDS: {}", e))?;
        }
        if let Ok(interval) = env::var("SWEEP_INTERVAL_SECONDS") {
            config.matchmaking.sweep_interval_seconds = interval
                .parse()
                .map_err(|e| anyhow!("Invalid SWEEP_INTERVAL_SECONDS: {}", e))?;
        }

        if let Ok(mean) = env::var("RATING_INITIAL_MEAN") {
            config.rating.initial_mean = mean
                .parse()
                .map_err(|e| anyhow!("Invalid RATING_INITIAL_MEAN: {}", e))?;
        }
        if let Ok(spread) = env::var("RATING_INITIAL_SPREAD") {
            config.rating.initial_spread = spread
                .parse()
                .map_err(|e| anyhow!("Invalid RATING_INITIAL_SPREAD: {}", e))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            )
        })?;

        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        validate_config(&config)?;
        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.service.name.is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.service.log_level.as_str()) {
        return Err(anyhow!(
            "Invalid log level '{}', expected one of {:?}",
            config.service.log_level,
            valid_levels
        ));
    }

    if config.matchmaking.ready_timeout_seconds == 0 {
        return Err(anyhow!("Ready timeout must be positive"));
    }
    if config.matchmaking.vote_timeout_seconds == 0 {
        return Err(anyhow!("Vote timeout must be positive"));
    }
    if config.matchmaking.sweep_interval_seconds == 0 {
        return Err(anyhow!("Sweep interval must be positive"));
    }

    config.rating.validate()?;

    for queue in &config.queues {
        queue.validate()?;
    }

    Ok(())
}
