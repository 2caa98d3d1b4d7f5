//! Match lifecycle: state machine and per-match supervision
//!
//! `MatchInstance` is the pure state machine (no clocks, no IO); the
//! supervisor wraps each instance in a single-writer task that owns its
//! timers, persistence, and notifications.

pub mod instance;
pub mod supervisor;

// Re-export commonly used types
pub use instance::{MatchInstance, ReadyOutcome, VoteOutcome};
pub use supervisor::{MatchSupervisor, RequeueRequest};
