//! Queue definitions and the player pool
//!
//! A queue is a named pool of waiting participants targeting a fixed team
//! size and map pool; the player pool is the in-memory index of who is
//! queued where and who is locked into an active match.

pub mod pool;
pub mod registry;

// Re-export commonly used types
pub use pool::PlayerPool;
pub use registry::{QueueConfig, QueueRegistry};
