//! Pure match state machine
//!
//! Holds no clocks and performs no IO; the supervisor drives it. States only
//! move forward, so a late timer or command racing a transition can never
//! rewind a match.

use crate::error::{MatchmakingError, Result};
use crate::matchmaking::MatchPlan;
use crate::types::{
    CancelReason, MatchResult, MatchSnapshot, MatchState, PlayerId, TeamSide, VoteChoice,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// What a ready-up mark amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Recorded, still waiting on others
    Recorded,
    /// This player had already readied; no change
    AlreadyReady,
    /// Everyone is ready now
    AllReady,
}

/// What the vote tally says after a ballot lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// No choice has a majority yet
    Pending,
    /// A majority voted to cancel
    Cancelled,
    /// A majority agreed on the winner
    Won(TeamSide),
}

/// One match from formation to teardown
#[derive(Debug)]
pub struct MatchInstance {
    snapshot: MatchSnapshot,
    ready: HashSet<PlayerId>,
    votes: HashMap<PlayerId, VoteChoice>,
    winner: Option<TeamSide>,
    completed_at: Option<DateTime<Utc>>,
    cancel_reason: Option<CancelReason>,
}

impl MatchInstance {
    pub fn from_plan(plan: MatchPlan) -> Self {
        Self {
            snapshot: MatchSnapshot {
                id: plan.id,
                queue_id: plan.queue_id,
                mode_id: plan.mode_id,
                map: plan.map,
                team1: plan.team1,
                team2: plan.team2,
                state: MatchState::Initial,
                created_at: plan.created_at,
                started_at: None,
            },
            ready: HashSet::new(),
            votes: HashMap::new(),
            winner: None,
            completed_at: None,
            cancel_reason: None,
        }
    }

    pub fn id(&self) -> crate::types::MatchId {
        self.snapshot.id
    }

    pub fn state(&self) -> MatchState {
        self.snapshot.state
    }

    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        self.cancel_reason.as_ref()
    }

    pub fn player_count(&self) -> usize {
        self.snapshot.team1.len() + self.snapshot.team2.len()
    }

    /// Ballots needed for any choice to carry
    pub fn majority(&self) -> usize {
        (self.player_count() + 1) / 2
    }

    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.snapshot.players().any(|p| p == player_id)
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.snapshot.clone()
    }

    fn require_state(&self, expected: MatchState) -> Result<()> {
        if self.snapshot.state != expected {
            return Err(MatchmakingError::InvalidState {
                match_id: self.snapshot.id.to_string(),
                message: format!(
                    "expected {}, found {}",
                    expected, self.snapshot.state
                ),
            }
            .into());
        }
        Ok(())
    }

    fn require_player(&self, player_id: &PlayerId) -> Result<()> {
        if !self.contains_player(player_id) {
            return Err(MatchmakingError::NotInMatch {
                player_id: player_id.clone(),
                match_id: self.snapshot.id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Initial -> Created: the match is persisted and announced
    pub fn mark_created(&mut self) -> Result<()> {
        self.require_state(MatchState::Initial)?;
        self.snapshot.state = MatchState::Created;
        Ok(())
    }

    /// Created -> ReadyUp: the ready window opens
    pub fn begin_ready_up(&mut self) -> Result<()> {
        self.require_state(MatchState::Created)?;
        self.snapshot.state = MatchState::ReadyUp;
        Ok(())
    }

    /// Record a ready mark during the ready window
    pub fn mark_ready(&mut self, player_id: &PlayerId) -> Result<ReadyOutcome> {
        self.require_state(MatchState::ReadyUp)?;
        self.require_player(player_id)?;

        if !self.ready.insert(player_id.clone()) {
            return Ok(ReadyOutcome::AlreadyReady);
        }
        if self.ready.len() == self.player_count() {
            Ok(ReadyOutcome::AllReady)
        } else {
            Ok(ReadyOutcome::Recorded)
        }
    }

    /// ReadyUp -> InProgress: all players readied in time
    pub fn begin_play(&mut self) -> Result<()> {
        self.require_state(MatchState::ReadyUp)?;
        self.snapshot.state = MatchState::InProgress;
        self.snapshot.started_at = Some(current_timestamp());
        Ok(())
    }

    /// Record a ballot; the latest ballot per player counts. The returned
    /// outcome is advisory, the supervisor performs the actual transition.
    pub fn cast_vote(&mut self, player_id: &PlayerId, choice: VoteChoice) -> Result<VoteOutcome> {
        self.require_state(MatchState::InProgress)?;
        self.require_player(player_id)?;

        self.votes.insert(player_id.clone(), choice);
        Ok(self.tally())
    }

    /// Cancel outranks either winner when both reach the bar
    fn tally(&self) -> VoteOutcome {
        let majority = self.majority();
        let count = |choice: VoteChoice| {
            self.votes.values().filter(|v| **v == choice).count()
        };

        if count(VoteChoice::Cancel) >= majority {
            VoteOutcome::Cancelled
        } else if count(VoteChoice::Team1) >= majority {
            VoteOutcome::Won(TeamSide::Team1)
        } else if count(VoteChoice::Team2) >= majority {
            VoteOutcome::Won(TeamSide::Team2)
        } else {
            VoteOutcome::Pending
        }
    }

    /// InProgress -> Completed with a winning team
    pub fn complete(&mut self, winner: TeamSide) -> Result<()> {
        self.require_state(MatchState::InProgress)?;
        self.snapshot.state = MatchState::Completed;
        self.winner = Some(winner);
        self.completed_at = Some(current_timestamp());
        Ok(())
    }

    /// Any pre-completion state -> Cancelled
    pub fn cancel(&mut self, reason: CancelReason) -> Result<()> {
        if !self.snapshot.state.is_active() {
            return Err(MatchmakingError::InvalidState {
                match_id: self.snapshot.id.to_string(),
                message: format!("cannot cancel from {}", self.snapshot.state),
            }
            .into());
        }
        self.snapshot.state = MatchState::Cancelled;
        self.cancel_reason = Some(reason);
        Ok(())
    }

    /// Completed or Cancelled -> Closed
    pub fn close(&mut self) -> Result<()> {
        match self.snapshot.state {
            MatchState::Completed | MatchState::Cancelled => {
                self.snapshot.state = MatchState::Closed;
                Ok(())
            }
            other => Err(MatchmakingError::InvalidState {
                match_id: self.snapshot.id.to_string(),
                message: format!("cannot close from {}", other),
            }
            .into()),
        }
    }

    /// The immutable result of a completed match
    pub fn to_result(&self) -> Result<MatchResult> {
        let (winner, completed_at) = match (self.winner, self.completed_at) {
            (Some(winner), Some(completed_at)) => (winner, completed_at),
            _ => {
                return Err(MatchmakingError::InvalidState {
                    match_id: self.snapshot.id.to_string(),
                    message: format!("no result in state {}", self.snapshot.state),
                }
                .into())
            }
        };
        Ok(MatchResult {
            match_id: self.snapshot.id,
            mode_id: self.snapshot.mode_id.clone(),
            queue_id: self.snapshot.queue_id.clone(),
            map: self.snapshot.map.clone(),
            team1: self.snapshot.team1.clone(),
            team2: self.snapshot.team2.clone(),
            winner,
            completed_at,
        })
    }
}
