//! Rating engine: prediction, post-match updates, leaderboards, rebuild
//!
//! All skill state lives in the append-only ledger behind the record store;
//! the engine itself is stateless apart from its configuration, so it can be
//! shared freely across tasks.

use crate::error::{MatchmakingError, Result};
use crate::events::ResultSubscriber;
use crate::rating::weng_lin::RatingSystemConfig;
use crate::storage::RecordStore;
use crate::types::{
    LeaderboardEntry, MatchResult, ModeId, PlayerId, RatingRow, SkillRating, TeamSide,
};
use async_trait::async_trait;
use chrono::Duration;
use skillratings::weng_lin::{expected_score_two_teams, weng_lin_two_teams, WengLinRating};
use skillratings::Outcomes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Skill rating engine for two-team matches
pub struct RatingEngine {
    store: Arc<dyn RecordStore>,
    config: RatingSystemConfig,
}

impl RatingEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: RatingSystemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &RatingSystemConfig {
        &self.config
    }

    /// Current skill for a (player, mode) pair: the most recent ledger row,
    /// or the configured prior when no history exists
    pub fn current_rating(&self, player_id: &PlayerId, mode_id: &ModeId) -> Result<SkillRating> {
        let latest = self.store.find_latest_rating(player_id, mode_id)?;
        Ok(latest
            .map(|row| row.after)
            .unwrap_or_else(|| self.config.default_rating()))
    }

    /// Win probabilities for two teams, summing to 1.0
    pub fn predict_win(&self, team_a: &[SkillRating], team_b: &[SkillRating]) -> (f64, f64) {
        let a: Vec<WengLinRating> = team_a.iter().map(|r| (*r).into()).collect();
        let b: Vec<WengLinRating> = team_b.iter().map(|r| (*r).into()).collect();
        expected_score_two_teams(&a, &b, &self.config.weng_lin)
    }

    /// Apply a finalized result: run the two-team Bayesian update and append
    /// one ledger row per participant
    pub fn apply_match_result(&self, result: &MatchResult) -> Result<Vec<RatingRow>> {
        let before1 = self.fetch_team_ratings(&result.team1, &result.mode_id)?;
        let before2 = self.fetch_team_ratings(&result.team2, &result.mode_id)?;

        let team1: Vec<WengLinRating> = before1.iter().map(|r| (*r).into()).collect();
        let team2: Vec<WengLinRating> = before2.iter().map(|r| (*r).into()).collect();

        // Outcome from team1's perspective
        let outcome = match result.winner {
            TeamSide::Team1 => Outcomes::WIN,
            TeamSide::Team2 => Outcomes::LOSS,
        };

        let (after1, after2) = weng_lin_two_teams(&team1, &team2, &outcome, &self.config.weng_lin);

        let mut rows = Vec::with_capacity(result.team1.len() + result.team2.len());
        for (player_id, before, after) in result
            .team1
            .iter()
            .zip(before1.iter().zip(after1.iter()))
            .map(|(p, (b, a))| (p, *b, SkillRating::from(*a)))
            .chain(
                result
                    .team2
                    .iter()
                    .zip(before2.iter().zip(after2.iter()))
                    .map(|(p, (b, a))| (p, *b, SkillRating::from(*a))),
            )
        {
            let ordinal_before = self.config.ordinal(&before);
            let ordinal_after = self.config.ordinal(&after);
            let row = RatingRow {
                player_id: player_id.clone(),
                mode_id: result.mode_id.clone(),
                match_id: result.match_id,
                before,
                after,
                ordinal_before,
                ordinal_after,
                ordinal_delta: ordinal_after - ordinal_before,
                recorded_at: result.completed_at,
            };
            self.store.save_rating_row(&row)?;
            rows.push(row);
        }

        debug!(
            "Applied result of match {} to {} ledger rows (winner: {})",
            result.match_id,
            rows.len(),
            result.winner
        );
        Ok(rows)
    }

    /// Leaderboard for a mode: each player's most recent ledger row inside
    /// the activity window, ranked by ordinal
    pub fn leaderboard(
        &self,
        mode_id: &ModeId,
        limit: usize,
        activity_window: Duration,
    ) -> Result<Vec<LeaderboardEntry>> {
        let cutoff = crate::utils::current_timestamp() - activity_window;
        let rows = self.store.find_rating_rows_by_mode(mode_id)?;

        let mut latest: HashMap<&PlayerId, &RatingRow> = HashMap::new();
        let mut counts: HashMap<&PlayerId, usize> = HashMap::new();
        for row in rows.iter().filter(|r| r.recorded_at >= cutoff) {
            *counts.entry(&row.player_id).or_insert(0) += 1;
            let entry = latest.entry(&row.player_id).or_insert(row);
            if row.recorded_at >= entry.recorded_at {
                *entry = row;
            }
        }

        let mut entries: Vec<LeaderboardEntry> = latest
            .into_iter()
            .map(|(player_id, row)| LeaderboardEntry {
                player_id: player_id.clone(),
                rating: row.after,
                ordinal: row.ordinal_after,
                win_count: counts.get(player_id).copied().unwrap_or(0),
            })
            .collect();

        entries.sort_by(|a, b| {
            b.ordinal
                .partial_cmp(&a.ordinal)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(limit);
        Ok(entries)
    }

    /// Wipe the ledger for a mode and replay its full match history in
    /// chronological order; returns the number of results replayed
    pub fn rebuild(&self, mode_id: &ModeId) -> Result<usize> {
        let removed = self.store.delete_rating_rows(mode_id)?;
        let results = self.store.find_match_results_by_mode(mode_id)?;

        info!(
            "Rebuilding ratings for mode {}: {} rows wiped, {} results to replay",
            mode_id,
            removed,
            results.len()
        );

        for result in &results {
            self.apply_match_result(result)?;
        }
        Ok(results.len())
    }

    fn fetch_team_ratings(&self, team: &[PlayerId], mode_id: &ModeId) -> Result<Vec<SkillRating>> {
        if team.is_empty() {
            return Err(MatchmakingError::InternalError {
                message: "Cannot rate an empty team".to_string(),
            }
            .into());
        }
        team.iter()
            .map(|p| self.current_rating(p, mode_id))
            .collect()
    }
}

#[async_trait]
impl ResultSubscriber for RatingEngine {
    async fn match_result(&self, result: &MatchResult) -> Result<()> {
        if let Err(e) = self.apply_match_result(result) {
            error!(
                "Rating update failed for match {}: {}",
                result.match_id, e
            );
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRecordStore;
    use crate::utils::{current_timestamp, generate_match_id};

    fn engine_with_store() -> (RatingEngine, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let engine = RatingEngine::new(store.clone(), RatingSystemConfig::default()).unwrap();
        (engine, store)
    }

    fn result(
        team1: &[&str],
        team2: &[&str],
        winner: TeamSide,
        offset_secs: i64,
    ) -> MatchResult {
        MatchResult {
            match_id: generate_match_id(),
            mode_id: "ctf".to_string(),
            queue_id: "naq".to_string(),
            map: "dm4".to_string(),
            team1: team1.iter().map(|s| s.to_string()).collect(),
            team2: team2.iter().map(|s| s.to_string()).collect(),
            winner,
            completed_at: current_timestamp() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_default_prior_for_unknown_player() {
        let (engine, _) = engine_with_store();
        let rating = engine
            .current_rating(&"nobody".to_string(), &"ctf".to_string())
            .unwrap();
        assert_eq!(rating.mean, 1500.0);
        assert_eq!(rating.spread, 200.0);
    }

    #[test]
    fn test_predict_symmetric_teams() {
        let (engine, _) = engine_with_store();
        let team = vec![SkillRating::default(), SkillRating::default()];
        let (pa, pb) = engine.predict_win(&team, &team);
        assert!((pa - 0.5).abs() < 1e-9);
        assert!((pa + pb - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_monotonic_in_mean() {
        let (engine, _) = engine_with_store();
        let strong = vec![SkillRating {
            mean: 1700.0,
            spread: 150.0,
        }];
        let weak = vec![SkillRating {
            mean: 1300.0,
            spread: 150.0,
        }];
        let (pa, pb) = engine.predict_win(&strong, &weak);
        assert!(pa > 0.5);
        assert!(pa > pb);
        assert!((pa + pb - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_result_shifts_means() {
        let (engine, _) = engine_with_store();
        let rows = engine
            .apply_match_result(&result(&["w1", "w2"], &["l1", "l2"], TeamSide::Team1, 0))
            .unwrap();

        assert_eq!(rows.len(), 4);
        for row in &rows {
            if row.player_id.starts_with('w') {
                assert!(row.after.mean > row.before.mean);
                assert!(row.ordinal_delta > 0.0);
            } else {
                assert!(row.after.mean < row.before.mean);
            }
        }
    }

    #[test]
    fn test_upset_shifts_more_than_expected_win() {
        let store = Arc::new(InMemoryRecordStore::new());
        let engine = RatingEngine::new(store, RatingSystemConfig::default()).unwrap();

        // Give the favourite a history well above the prior
        let favourite = result(&["fav"], &["underdog"], TeamSide::Team1, 0);
        let fav_rows = engine.apply_match_result(&favourite).unwrap();
        let expected_gain = fav_rows[0].after.mean - fav_rows[0].before.mean;

        // Now the underdog wins: the surprise shift must be larger than the
        // favourite's expected-win shift was
        let upset = result(&["fav"], &["underdog"], TeamSide::Team2, 10);
        let upset_rows = engine.apply_match_result(&upset).unwrap();
        let underdog_row = upset_rows
            .iter()
            .find(|r| r.player_id == "underdog")
            .unwrap();
        let surprise_gain = underdog_row.after.mean - underdog_row.before.mean;

        assert!(surprise_gain > expected_gain);
    }

    #[test]
    fn test_ledger_is_append_only() {
        let (engine, store) = engine_with_store();
        engine
            .apply_match_result(&result(&["p1"], &["p2"], TeamSide::Team1, 0))
            .unwrap();
        engine
            .apply_match_result(&result(&["p1"], &["p2"], TeamSide::Team1, 10))
            .unwrap();

        let rows = store.find_rating_rows_by_mode(&"ctf".to_string()).unwrap();
        assert_eq!(rows.len(), 4);

        // Second match starts from where the first left off
        let p1_rows: Vec<_> = rows.iter().filter(|r| r.player_id == "p1").collect();
        assert_eq!(p1_rows[1].before, p1_rows[0].after);
    }

    #[test]
    fn test_leaderboard_ranks_by_ordinal() {
        let (engine, _) = engine_with_store();
        engine
            .apply_match_result(&result(&["a", "b"], &["c", "d"], TeamSide::Team1, 0))
            .unwrap();
        engine
            .apply_match_result(&result(&["a", "c"], &["b", "d"], TeamSide::Team1, 10))
            .unwrap();

        let board = engine
            .leaderboard(&"ctf".to_string(), 10, Duration::days(30))
            .unwrap();
        assert_eq!(board.len(), 4);
        assert!(board.windows(2).all(|w| w[0].ordinal >= w[1].ordinal));

        // Double winner ends up on top; every player has two rows in window
        assert_eq!(board[0].player_id, "a");
        assert!(board.iter().all(|e| e.win_count == 2));

        // Limit is honoured
        let top2 = engine
            .leaderboard(&"ctf".to_string(), 2, Duration::days(30))
            .unwrap();
        assert_eq!(top2.len(), 2);
    }

    #[test]
    fn test_leaderboard_activity_window() {
        let (engine, _) = engine_with_store();
        // Completed 40 days before now, outside a 30 day window
        engine
            .apply_match_result(&result(
                &["old1"],
                &["old2"],
                TeamSide::Team1,
                -40 * 24 * 3600,
            ))
            .unwrap();
        engine
            .apply_match_result(&result(&["new1"], &["new2"], TeamSide::Team1, -60))
            .unwrap();

        let board = engine
            .leaderboard(&"ctf".to_string(), 10, Duration::days(30))
            .unwrap();
        let names: Vec<_> = board.iter().map(|e| e.player_id.as_str()).collect();
        assert!(names.contains(&"new1"));
        assert!(!names.contains(&"old1"));
    }

    #[test]
    fn test_rebuild_matches_incremental_application() {
        let (engine, store) = engine_with_store();
        let history = vec![
            result(&["a", "b"], &["c", "d"], TeamSide::Team1, 0),
            result(&["a", "c"], &["b", "d"], TeamSide::Team2, 10),
            result(&["a", "d"], &["b", "c"], TeamSide::Team1, 20),
        ];
        for r in &history {
            store.save_match_result(r).unwrap();
            engine.apply_match_result(r).unwrap();
        }

        let incremental = engine
            .leaderboard(&"ctf".to_string(), 10, Duration::days(30))
            .unwrap();

        let replayed = engine.rebuild(&"ctf".to_string()).unwrap();
        assert_eq!(replayed, 3);

        let rebuilt = engine
            .leaderboard(&"ctf".to_string(), 10, Duration::days(30))
            .unwrap();

        let key = |entries: &[LeaderboardEntry]| -> Vec<(String, i64)> {
            entries
                .iter()
                .map(|e| (e.player_id.clone(), (e.ordinal * 1000.0).round() as i64))
                .collect()
        };
        assert_eq!(key(&incremental), key(&rebuilt));
    }

    #[test]
    fn test_modes_are_independent() {
        let (engine, _) = engine_with_store();
        engine
            .apply_match_result(&result(&["p1"], &["p2"], TeamSide::Team1, 0))
            .unwrap();

        // No ctf history leaks into duel
        let duel = engine
            .current_rating(&"p1".to_string(), &"duel".to_string())
            .unwrap();
        assert_eq!(duel.mean, 1500.0);

        let ctf = engine
            .current_rating(&"p1".to_string(), &"ctf".to_string())
            .unwrap();
        assert!(ctf.mean > 1500.0);
    }
}
