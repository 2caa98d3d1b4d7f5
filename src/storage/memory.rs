//! In-memory record store implementations
//!
//! `InMemoryRecordStore` is the default backing store; `MockRecordStore`
//! adds failure injection and call recording for tests.

use crate::error::{MatchmakingError, Result};
use crate::storage::RecordStore;
use crate::types::{MatchId, MatchResult, MatchSnapshot, ModeId, PlayerId, PlayerRecord, RatingRow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// In-memory record store
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    matches: RwLock<HashMap<MatchId, MatchSnapshot>>,
    results: RwLock<Vec<MatchResult>>,
    rating_rows: RwLock<Vec<RatingRow>>,
    players: RwLock<HashMap<PlayerId, PlayerRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err(what: &str) -> MatchmakingError {
        MatchmakingError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn save_match(&self, snapshot: &MatchSnapshot) -> Result<()> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| Self::lock_err("matches"))?;
        matches.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    fn update_match(&self, snapshot: &MatchSnapshot) -> Result<()> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| Self::lock_err("matches"))?;
        matches.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    fn find_active_matches(&self) -> Result<Vec<MatchSnapshot>> {
        let matches = self.matches.read().map_err(|_| Self::lock_err("matches"))?;
        Ok(matches
            .values()
            .filter(|m| m.state.is_active())
            .cloned()
            .collect())
    }

    fn save_match_result(&self, result: &MatchResult) -> Result<()> {
        let mut results = self
            .results
            .write()
            .map_err(|_| Self::lock_err("results"))?;
        results.push(result.clone());
        Ok(())
    }

    fn find_match_results_by_mode(&self, mode_id: &ModeId) -> Result<Vec<MatchResult>> {
        let results = self.results.read().map_err(|_| Self::lock_err("results"))?;
        let mut found: Vec<MatchResult> = results
            .iter()
            .filter(|r| &r.mode_id == mode_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        Ok(found)
    }

    fn save_rating_row(&self, row: &RatingRow) -> Result<()> {
        let mut rows = self
            .rating_rows
            .write()
            .map_err(|_| Self::lock_err("rating rows"))?;
        rows.push(row.clone());
        Ok(())
    }

    fn find_latest_rating(
        &self,
        player_id: &PlayerId,
        mode_id: &ModeId,
    ) -> Result<Option<RatingRow>> {
        let rows = self
            .rating_rows
            .read()
            .map_err(|_| Self::lock_err("rating rows"))?;
        Ok(rows
            .iter()
            .rev()
            .find(|r| &r.player_id == player_id && &r.mode_id == mode_id)
            .cloned())
    }

    fn find_rating_rows_by_mode(&self, mode_id: &ModeId) -> Result<Vec<RatingRow>> {
        let rows = self
            .rating_rows
            .read()
            .map_err(|_| Self::lock_err("rating rows"))?;
        Ok(rows
            .iter()
            .filter(|r| &r.mode_id == mode_id)
            .cloned()
            .collect())
    }

    fn delete_rating_rows(&self, mode_id: &ModeId) -> Result<usize> {
        let mut rows = self
            .rating_rows
            .write()
            .map_err(|_| Self::lock_err("rating rows"))?;
        let before = rows.len();
        rows.retain(|r| &r.mode_id != mode_id);
        Ok(before - rows.len())
    }

    fn save_player(&self, record: &PlayerRecord) -> Result<()> {
        let mut players = self
            .players
            .write()
            .map_err(|_| Self::lock_err("players"))?;
        players.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn find_player(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>> {
        let players = self.players.read().map_err(|_| Self::lock_err("players"))?;
        Ok(players.get(player_id).cloned())
    }
}

/// Record store for testing: records calls and can inject failures
#[derive(Debug, Default)]
pub struct MockRecordStore {
    inner: InMemoryRecordStore,
    fail_rating_lookups: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `find_latest_rating` call fail
    pub fn set_fail_rating_lookups(&self, fail: bool) {
        self.fail_rating_lookups.store(fail, Ordering::SeqCst);
    }

    /// Make every write operation fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self, operation: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MatchmakingError::PersistenceFailure {
                operation: operation.to_string(),
                message: "injected write failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl RecordStore for MockRecordStore {
    fn save_match(&self, snapshot: &MatchSnapshot) -> Result<()> {
        self.check_write("save_match")?;
        self.inner.save_match(snapshot)
    }

    fn update_match(&self, snapshot: &MatchSnapshot) -> Result<()> {
        self.check_write("update_match")?;
        self.inner.update_match(snapshot)
    }

    fn find_active_matches(&self) -> Result<Vec<MatchSnapshot>> {
        self.inner.find_active_matches()
    }

    fn save_match_result(&self, result: &MatchResult) -> Result<()> {
        self.check_write("save_match_result")?;
        self.inner.save_match_result(result)
    }

    fn find_match_results_by_mode(&self, mode_id: &ModeId) -> Result<Vec<MatchResult>> {
        self.inner.find_match_results_by_mode(mode_id)
    }

    fn save_rating_row(&self, row: &RatingRow) -> Result<()> {
        self.check_write("save_rating_row")?;
        self.inner.save_rating_row(row)
    }

    fn find_latest_rating(
        &self,
        player_id: &PlayerId,
        mode_id: &ModeId,
    ) -> Result<Option<RatingRow>> {
        if self.fail_rating_lookups.load(Ordering::SeqCst) {
            return Err(MatchmakingError::RatingUnavailable {
                reason: "injected lookup failure".to_string(),
            }
            .into());
        }
        self.inner.find_latest_rating(player_id, mode_id)
    }

    fn find_rating_rows_by_mode(&self, mode_id: &ModeId) -> Result<Vec<RatingRow>> {
        self.inner.find_rating_rows_by_mode(mode_id)
    }

    fn delete_rating_rows(&self, mode_id: &ModeId) -> Result<usize> {
        self.inner.delete_rating_rows(mode_id)
    }

    fn save_player(&self, record: &PlayerRecord) -> Result<()> {
        self.check_write("save_player")?;
        self.inner.save_player(record)
    }

    fn find_player(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>> {
        self.inner.find_player(player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchState, SkillRating, TeamSide};
    use crate::utils::{current_timestamp, generate_match_id};

    fn snapshot(state: MatchState) -> MatchSnapshot {
        MatchSnapshot {
            id: generate_match_id(),
            queue_id: "naq".to_string(),
            mode_id: "ctf".to_string(),
            map: "dm4".to_string(),
            team1: vec!["p1".to_string()],
            team2: vec!["p2".to_string()],
            state,
            created_at: current_timestamp(),
            started_at: None,
        }
    }

    fn rating_row(player: &str, mode: &str, mean: f64) -> RatingRow {
        let before = SkillRating::default();
        let after = SkillRating { mean, spread: 180.0 };
        RatingRow {
            player_id: player.to_string(),
            mode_id: mode.to_string(),
            match_id: generate_match_id(),
            before,
            after,
            ordinal_before: before.ordinal(3.0),
            ordinal_after: after.ordinal(3.0),
            ordinal_delta: after.ordinal(3.0) - before.ordinal(3.0),
            recorded_at: current_timestamp(),
        }
    }

    #[test]
    fn test_active_match_query() {
        let store = InMemoryRecordStore::new();
        let active = snapshot(MatchState::InProgress);
        let closed = snapshot(MatchState::Closed);
        store.save_match(&active).unwrap();
        store.save_match(&closed).unwrap();

        let found = store.find_active_matches().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, active.id);
    }

    #[test]
    fn test_update_match_overwrites() {
        let store = InMemoryRecordStore::new();
        let mut snap = snapshot(MatchState::Created);
        store.save_match(&snap).unwrap();

        snap.state = MatchState::Closed;
        store.update_match(&snap).unwrap();

        assert!(store.find_active_matches().unwrap().is_empty());
    }

    #[test]
    fn test_latest_rating_wins() {
        let store = InMemoryRecordStore::new();
        store.save_rating_row(&rating_row("p1", "ctf", 1520.0)).unwrap();
        store.save_rating_row(&rating_row("p1", "ctf", 1560.0)).unwrap();
        store.save_rating_row(&rating_row("p1", "duel", 1400.0)).unwrap();

        let latest = store
            .find_latest_rating(&"p1".to_string(), &"ctf".to_string())
            .unwrap()
            .unwrap();
        assert_eq!(latest.after.mean, 1560.0);

        assert!(store
            .find_latest_rating(&"p2".to_string(), &"ctf".to_string())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete_rating_rows_is_mode_scoped() {
        let store = InMemoryRecordStore::new();
        store.save_rating_row(&rating_row("p1", "ctf", 1520.0)).unwrap();
        store.save_rating_row(&rating_row("p2", "ctf", 1480.0)).unwrap();
        store.save_rating_row(&rating_row("p1", "duel", 1510.0)).unwrap();

        let removed = store.delete_rating_rows(&"ctf".to_string()).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            store
                .find_rating_rows_by_mode(&"duel".to_string())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_results_sorted_chronologically() {
        let store = InMemoryRecordStore::new();
        let base = current_timestamp();
        for offset in [30i64, 10, 20] {
            let result = MatchResult {
                match_id: generate_match_id(),
                mode_id: "ctf".to_string(),
                queue_id: "naq".to_string(),
                map: "dm4".to_string(),
                team1: vec!["p1".to_string()],
                team2: vec!["p2".to_string()],
                winner: TeamSide::Team1,
                completed_at: base + chrono::Duration::seconds(offset),
            };
            store.save_match_result(&result).unwrap();
        }

        let results = store.find_match_results_by_mode(&"ctf".to_string()).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].completed_at <= w[1].completed_at));
    }

    #[test]
    fn test_mock_store_failure_injection() {
        let store = MockRecordStore::new();
        store.save_rating_row(&rating_row("p1", "ctf", 1520.0)).unwrap();

        store.set_fail_rating_lookups(true);
        assert!(store
            .find_latest_rating(&"p1".to_string(), &"ctf".to_string())
            .is_err());

        store.set_fail_rating_lookups(false);
        assert!(store
            .find_latest_rating(&"p1".to_string(), &"ctf".to_string())
            .unwrap()
            .is_some());

        store.set_fail_writes(true);
        assert!(store.save_rating_row(&rating_row("p1", "ctf", 1530.0)).is_err());
    }
}
