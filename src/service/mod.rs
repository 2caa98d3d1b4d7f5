//! Service layer: wiring and the public operation surface

pub mod app;

// Re-export commonly used types
pub use app::MatchmakingService;
