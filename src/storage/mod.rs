//! Persistence boundary for matches, results, ratings, and players
//!
//! The core only depends on the `RecordStore` trait; the in-memory
//! implementation backs tests and single-process deployments. A database
//! implementation would live behind the same trait.

pub mod memory;

// Re-export commonly used types
pub use memory::{InMemoryRecordStore, MockRecordStore};

use crate::error::Result;
use crate::types::{MatchResult, MatchSnapshot, ModeId, PlayerId, PlayerRecord, RatingRow};

/// Trait for record persistence operations, keyed by opaque ids
pub trait RecordStore: Send + Sync {
    /// Persist a newly created match
    fn save_match(&self, snapshot: &MatchSnapshot) -> Result<()>;

    /// Update a match after a state transition
    fn update_match(&self, snapshot: &MatchSnapshot) -> Result<()>;

    /// Find matches left in a non-terminal state (startup recovery)
    fn find_active_matches(&self) -> Result<Vec<MatchSnapshot>>;

    /// Persist an immutable match result
    fn save_match_result(&self, result: &MatchResult) -> Result<()>;

    /// All results for a mode in chronological completion order
    fn find_match_results_by_mode(&self, mode_id: &ModeId) -> Result<Vec<MatchResult>>;

    /// Append one rating ledger row
    fn save_rating_row(&self, row: &RatingRow) -> Result<()>;

    /// Most recent ledger row for a (player, mode) pair
    fn find_latest_rating(
        &self,
        player_id: &PlayerId,
        mode_id: &ModeId,
    ) -> Result<Option<RatingRow>>;

    /// Every ledger row for a mode in append order
    fn find_rating_rows_by_mode(&self, mode_id: &ModeId) -> Result<Vec<RatingRow>>;

    /// Wipe the ledger for a mode, returning the number of rows removed
    fn delete_rating_rows(&self, mode_id: &ModeId) -> Result<usize>;

    /// Persist a player record
    fn save_player(&self, record: &PlayerRecord) -> Result<()>;

    /// Look up a player record
    fn find_player(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>>;
}
