//! Skill rating engine built on the Weng-Lin (OpenSkill) algorithm
//!
//! This module maintains per-(player, mode) skill distributions through an
//! append-only ledger, predicts two-team win probabilities, and aggregates
//! leaderboards.

pub mod engine;
pub mod weng_lin;

// Re-export commonly used types
pub use engine::RatingEngine;
pub use weng_lin::RatingSystemConfig;
