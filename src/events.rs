//! In-process notification boundaries
//!
//! The presentation layer observes the core through `EventSink`; finalized
//! match results fan out to every registered `ResultSubscriber` (the rating
//! engine is one of them). The core never knows what renders its events.

use crate::error::Result;
use crate::types::{MatchResult, MatchSnapshot, QueueId};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::{debug, info};

/// Trait for observing pool and lifecycle changes
#[async_trait]
pub trait EventSink: Send + Sync {
    /// A queue's membership changed; observers recompute state themselves
    async fn queue_changed(&self, queue_id: &QueueId) -> Result<()>;

    /// A match advanced to a new lifecycle state
    async fn match_state_changed(&self, snapshot: &MatchSnapshot) -> Result<()>;
}

/// Trait for consuming finalized match results
#[async_trait]
pub trait ResultSubscriber: Send + Sync {
    async fn match_result(&self, result: &MatchResult) -> Result<()>;
}

/// Event sink that logs every notification
#[derive(Debug, Default)]
pub struct LoggingEventSink;

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn queue_changed(&self, queue_id: &QueueId) -> Result<()> {
        info!("Queue {} changed", queue_id);
        Ok(())
    }

    async fn match_state_changed(&self, snapshot: &MatchSnapshot) -> Result<()> {
        info!(
            "Match {} is now {} ({} vs {} on {})",
            snapshot.id,
            snapshot.state,
            snapshot.team1.len(),
            snapshot.team2.len(),
            snapshot.map
        );
        if let Ok(payload) = serde_json::to_string(snapshot) {
            debug!("match_state_changed payload: {}", payload);
        }
        Ok(())
    }
}

/// Event sink that captures notifications for assertions in tests
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    queue_changes: Mutex<Vec<QueueId>>,
    match_changes: Mutex<Vec<MatchSnapshot>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_changes(&self) -> Vec<QueueId> {
        self.queue_changes
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn match_changes(&self) -> Vec<MatchSnapshot> {
        self.match_changes
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// States a given match passed through, in notification order
    pub fn states_for(&self, match_id: &crate::types::MatchId) -> Vec<crate::types::MatchState> {
        self.match_changes()
            .iter()
            .filter(|s| &s.id == match_id)
            .map(|s| s.state)
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn queue_changed(&self, queue_id: &QueueId) -> Result<()> {
        if let Ok(mut changes) = self.queue_changes.lock() {
            changes.push(queue_id.clone());
        }
        Ok(())
    }

    async fn match_state_changed(&self, snapshot: &MatchSnapshot) -> Result<()> {
        if let Ok(mut changes) = self.match_changes.lock() {
            changes.push(snapshot.clone());
        }
        Ok(())
    }
}
