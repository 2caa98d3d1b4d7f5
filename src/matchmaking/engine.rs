//! Match formation engine
//!
//! Turns a queue's current membership into a concrete match plan: uniform
//! candidate selection, team assignment per the queue's algorithm, and a
//! uniform map pick. Returns nothing (and touches nothing) below the target
//! size.

use crate::matchmaking::teams::{split_fair, split_random};
use crate::queue::QueueConfig;
use crate::rating::RatingEngine;
use crate::types::{MapName, MatchId, ModeId, PlayerId, QueueId, SkillRating};
use crate::utils::{choose, current_timestamp, generate_match_id, shuffle};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A formed match, ready to hand to the lifecycle supervisor
#[derive(Debug, Clone)]
pub struct MatchPlan {
    pub id: MatchId,
    pub queue_id: QueueId,
    pub mode_id: ModeId,
    pub map: MapName,
    pub team1: Vec<PlayerId>,
    pub team2: Vec<PlayerId>,
    pub created_at: DateTime<Utc>,
}

impl MatchPlan {
    /// All participants, team1 first
    pub fn players(&self) -> Vec<PlayerId> {
        self.team1
            .iter()
            .chain(self.team2.iter())
            .cloned()
            .collect()
    }
}

/// Decides whether and how a queue's pool becomes a match
pub struct MatchEngine {
    rating: Arc<RatingEngine>,
}

impl MatchEngine {
    pub fn new(rating: Arc<RatingEngine>) -> Self {
        Self { rating }
    }

    /// Try to form a match from the queue's current members. Returns `None`
    /// without side effects when the pool is below the target size.
    pub fn try_form_match<R: Rng>(
        &self,
        config: &QueueConfig,
        mut members: Vec<PlayerId>,
        rng: &mut R,
    ) -> Option<MatchPlan> {
        if members.len() < config.team_size {
            return None;
        }

        // Uniform selection: shuffle, take the target size, reject the rest
        shuffle(&mut members, rng);
        members.truncate(config.team_size);

        let (team1, team2) = self.assign_teams(config, members, rng);
        let map = choose(&config.maps, rng)?.clone();

        let plan = MatchPlan {
            id: generate_match_id(),
            queue_id: config.id.clone(),
            mode_id: config.mode_id.clone(),
            map,
            team1,
            team2,
            created_at: current_timestamp(),
        };

        debug!(
            "Formed match {} on queue {} ({} vs {}, map {}, algorithm {})",
            plan.id,
            plan.queue_id,
            plan.team1.len(),
            plan.team2.len(),
            plan.map,
            config.algorithm
        );
        Some(plan)
    }

    fn assign_teams<R: Rng>(
        &self,
        config: &QueueConfig,
        selected: Vec<PlayerId>,
        rng: &mut R,
    ) -> (Vec<PlayerId>, Vec<PlayerId>) {
        match config.algorithm {
            crate::types::TeamAlgorithm::Random => split_random(selected, rng),
            crate::types::TeamAlgorithm::Fair => {
                match self.fetch_ratings(&selected, &config.mode_id) {
                    Ok(ratings) => split_fair(
                        selected,
                        &ratings,
                        |a, b| self.rating.predict_win(a, b),
                        rng,
                    ),
                    Err(e) => {
                        // Rating trouble never blocks match formation
                        warn!(
                            "Fair split unavailable for queue {} ({}), falling back to random",
                            config.id, e
                        );
                        split_random(selected, rng)
                    }
                }
            }
        }
    }

    fn fetch_ratings(
        &self,
        players: &[PlayerId],
        mode_id: &ModeId,
    ) -> crate::error::Result<HashMap<PlayerId, SkillRating>> {
        players
            .iter()
            .map(|p| Ok((p.clone(), self.rating.current_rating(p, mode_id)?)))
            .collect()
    }
}
