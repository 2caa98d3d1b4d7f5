//! Scrim Hall - matchmaking service for team games
//!
//! This crate provides queue-based matchmaking with supervised match
//! lifecycles, team balancing, and a Weng-Lin (OpenSkill) rating system.

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod matchmaking;
pub mod queue;
pub mod rating;
pub mod service;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use events::{EventSink, ResultSubscriber};
pub use service::MatchmakingService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
