//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Player {player_id} is already in an active match")]
    AlreadyInMatch { player_id: String },

    #[error("Player {player_id} is not a member of match {match_id}")]
    NotInMatch { player_id: String, match_id: String },

    #[error("Player {player_id} is already queued in {queue_id}")]
    AlreadyInQueue { player_id: String, queue_id: String },

    #[error("Player {player_id} is not queued in {queue_id}")]
    NotInQueue { player_id: String, queue_id: String },

    #[error("Queue {queue_id} is disabled")]
    QueueDisabled { queue_id: String },

    #[error("Queue not found: {queue_id}")]
    QueueNotFound { queue_id: String },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("Map {map} is already in the pool of queue {queue_id}")]
    DuplicateMap { queue_id: String, map: String },

    #[error("Map {map} is not in the pool of queue {queue_id}")]
    MapNotFound { queue_id: String, map: String },

    #[error("Cannot remove the last map from queue {queue_id}")]
    LastMapProtected { queue_id: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("Rating lookup failed: {reason}")]
    RatingUnavailable { reason: String },

    #[error("Persistence operation failed: {operation}: {message}")]
    PersistenceFailure { operation: String, message: String },

    #[error("Invalid state for match {match_id}: {message}")]
    InvalidState { match_id: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
