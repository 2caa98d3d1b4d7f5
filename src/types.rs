//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skillratings::weng_lin::WengLinRating;
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for queues
pub type QueueId = String;

/// Unique identifier for game modes
pub type ModeId = String;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Name of a playable map
pub type MapName = String;

/// Team assignment algorithm used when a match is formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamAlgorithm {
    /// Uniform random split
    Random,
    /// Exhaustive search for the most even win probabilities
    Fair,
}

impl std::fmt::Display for TeamAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamAlgorithm::Random => write!(f, "Random"),
            TeamAlgorithm::Fair => write!(f, "Fair"),
        }
    }
}

/// One of the two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamSide {
    Team1,
    Team2,
}

impl TeamSide {
    pub fn other(self) -> TeamSide {
        match self {
            TeamSide::Team1 => TeamSide::Team2,
            TeamSide::Team2 => TeamSide::Team1,
        }
    }
}

impl std::fmt::Display for TeamSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamSide::Team1 => write!(f, "team1"),
            TeamSide::Team2 => write!(f, "team2"),
        }
    }
}

/// Lifecycle state of a match, strictly forward-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchState {
    /// Formed by the matchmaking engine, not yet announced
    Initial,
    /// Persisted and announced, resources allocated
    Created,
    /// Waiting for every player to ready up
    ReadyUp,
    /// Being played, votes accepted
    InProgress,
    /// Finished with a winning team
    Completed,
    /// Cancelled before completion
    Cancelled,
    /// Terminal, resources torn down
    Closed,
}

impl MatchState {
    pub fn is_terminal(self) -> bool {
        self == MatchState::Closed
    }

    /// States that survive a process restart and need recovery
    pub fn is_active(self) -> bool {
        matches!(
            self,
            MatchState::Initial | MatchState::Created | MatchState::ReadyUp | MatchState::InProgress
        )
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchState::Initial => "Initial",
            MatchState::Created => "Created",
            MatchState::ReadyUp => "ReadyUp",
            MatchState::InProgress => "InProgress",
            MatchState::Completed => "Completed",
            MatchState::Cancelled => "Cancelled",
            MatchState::Closed => "Closed",
        };
        write!(f, "{}", name)
    }
}

/// A vote cast by a match participant while the match is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteChoice {
    Team1,
    Team2,
    Cancel,
}

/// Why a match was cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Not everyone readied up before the ready timer expired
    ReadyTimeout,
    /// No majority vote arrived before the vote timer expired
    VoteTimeout,
    /// A majority of players voted to cancel
    PlayerVote,
    /// Administrative override
    Forced(String),
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::ReadyTimeout => write!(f, "ready timeout"),
            CancelReason::VoteTimeout => write!(f, "vote timeout"),
            CancelReason::PlayerVote => write!(f, "player vote"),
            CancelReason::Forced(reason) => write!(f, "forced: {}", reason),
        }
    }
}

/// Skill distribution for a player in one mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillRating {
    pub mean: f64,
    pub spread: f64,
}

impl SkillRating {
    /// Conservative scalar ranking value: `mean - k * spread`
    pub fn ordinal(&self, k: f64) -> f64 {
        self.mean - k * self.spread
    }
}

impl Default for SkillRating {
    fn default() -> Self {
        Self {
            mean: 1500.0,
            spread: 200.0,
        }
    }
}

impl From<WengLinRating> for SkillRating {
    fn from(rating: WengLinRating) -> Self {
        Self {
            mean: rating.rating,
            spread: rating.uncertainty,
        }
    }
}

impl From<SkillRating> for WengLinRating {
    fn from(rating: SkillRating) -> Self {
        Self {
            rating: rating.mean,
            uncertainty: rating.spread,
        }
    }
}

/// Persisted record of a known player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub first_seen: DateTime<Utc>,
}

/// Snapshot of a match, used for persistence and state-change notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub id: MatchId,
    pub queue_id: QueueId,
    pub mode_id: ModeId,
    pub map: MapName,
    pub team1: Vec<PlayerId>,
    pub team2: Vec<PlayerId>,
    pub state: MatchState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl MatchSnapshot {
    /// All participants, team1 first
    pub fn players(&self) -> impl Iterator<Item = &PlayerId> {
        self.team1.iter().chain(self.team2.iter())
    }
}

/// Immutable historical record of a completed match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub mode_id: ModeId,
    pub queue_id: QueueId,
    pub map: MapName,
    pub team1: Vec<PlayerId>,
    pub team2: Vec<PlayerId>,
    pub winner: TeamSide,
    pub completed_at: DateTime<Utc>,
}

impl MatchResult {
    pub fn winning_team(&self) -> &[PlayerId] {
        match self.winner {
            TeamSide::Team1 => &self.team1,
            TeamSide::Team2 => &self.team2,
        }
    }
}

/// One append-only ledger row recording a rating change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingRow {
    pub player_id: PlayerId,
    pub mode_id: ModeId,
    pub match_id: MatchId,
    pub before: SkillRating,
    pub after: SkillRating,
    pub ordinal_before: f64,
    pub ordinal_after: f64,
    pub ordinal_delta: f64,
    pub recorded_at: DateTime<Utc>,
}

/// One line of a mode leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub rating: SkillRating,
    pub ordinal: f64,
    /// Ledger rows for this player inside the activity window
    pub win_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_rating_conversions() {
        let rating = SkillRating {
            mean: 1620.0,
            spread: 140.0,
        };
        let weng_lin: WengLinRating = rating.into();
        assert_eq!(weng_lin.rating, 1620.0);
        assert_eq!(weng_lin.uncertainty, 140.0);

        let back: SkillRating = weng_lin.into();
        assert_eq!(back, rating);
    }

    #[test]
    fn test_ordinal_is_conservative() {
        let certain = SkillRating {
            mean: 1500.0,
            spread: 50.0,
        };
        let uncertain = SkillRating {
            mean: 1500.0,
            spread: 200.0,
        };
        assert!(certain.ordinal(3.0) > uncertain.ordinal(3.0));
    }

    #[test]
    fn test_cancel_reason_display() {
        assert_eq!(CancelReason::ReadyTimeout.to_string(), "ready timeout");
        assert_eq!(CancelReason::VoteTimeout.to_string(), "vote timeout");
        assert_eq!(CancelReason::PlayerVote.to_string(), "player vote");
        assert_eq!(
            CancelReason::Forced("stale".to_string()).to_string(),
            "forced: stale"
        );
    }

    #[test]
    fn test_team_side_other() {
        assert_eq!(TeamSide::Team1.other(), TeamSide::Team2);
        assert_eq!(TeamSide::Team2.other(), TeamSide::Team1);
    }
}
