//! Matchmaking: team assignment, match formation, and the coordinator
//!
//! The engine turns a queue's pool into a concrete match plan; the
//! coordinator serializes formation decisions behind one global lock so two
//! concurrent triggers can never double-book a participant.

pub mod coordinator;
pub mod engine;
pub mod teams;

// Re-export commonly used types
pub use coordinator::MatchCoordinator;
pub use engine::{MatchEngine, MatchPlan};
