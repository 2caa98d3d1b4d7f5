//! Configuration management for the scrim-hall service
//!
//! This module handles all configuration loading from environment variables
//! and TOML files, validation, and default values for the matchmaking service.

pub mod app;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, MatchmakingSettings, ServiceSettings};
pub use rating::RatingSettings;
