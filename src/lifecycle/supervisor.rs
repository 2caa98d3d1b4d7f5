//! Per-match supervision
//!
//! Every launched match gets one task that owns its `MatchInstance`, its
//! timers, and all of its IO. Commands arrive over a channel and are applied
//! one at a time, so ready marks, ballots, timer expiries, and force-cancels
//! can never interleave inside a single match.

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::events::{EventSink, ResultSubscriber};
use crate::lifecycle::instance::{MatchInstance, ReadyOutcome, VoteOutcome};
use crate::matchmaking::MatchPlan;
use crate::queue::PlayerPool;
use crate::storage::RecordStore;
use crate::types::{CancelReason, MatchId, PlayerId, QueueId, TeamSide, VoteChoice};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{error, info, warn};

const COMMAND_BUFFER: usize = 32;

/// A player's request to rejoin a queue once their match tears down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequeueRequest {
    pub player_id: PlayerId,
    pub queue_id: QueueId,
}

enum MatchCommand {
    MarkReady {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<ReadyOutcome>>,
    },
    CastVote {
        player_id: PlayerId,
        choice: VoteChoice,
        reply: oneshot::Sender<Result<VoteOutcome>>,
    },
    ForceCancel {
        reason: String,
        reply: oneshot::Sender<Result<()>>,
    },
    RegisterRequeue {
        player_id: PlayerId,
        queue_id: QueueId,
        reply: oneshot::Sender<Result<()>>,
    },
}

type HandleMap = Arc<RwLock<HashMap<MatchId, mpsc::Sender<MatchCommand>>>>;

/// Launches match tasks and routes commands to them
pub struct MatchSupervisor {
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    pool: Arc<PlayerPool>,
    subscribers: Vec<Arc<dyn ResultSubscriber>>,
    settings: MatchmakingSettings,
    requeue_tx: mpsc::Sender<RequeueRequest>,
    handles: HandleMap,
}

impl MatchSupervisor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
        pool: Arc<PlayerPool>,
        subscribers: Vec<Arc<dyn ResultSubscriber>>,
        settings: MatchmakingSettings,
        requeue_tx: mpsc::Sender<RequeueRequest>,
    ) -> Self {
        Self {
            store,
            events,
            pool,
            subscribers,
            settings,
            requeue_tx,
            handles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn lock_err() -> MatchmakingError {
        MatchmakingError::InternalError {
            message: "Failed to acquire supervisor handle lock".to_string(),
        }
    }

    /// Spawn the task that drives one match from plan to teardown
    pub fn launch(&self, plan: MatchPlan) -> Result<()> {
        let instance = MatchInstance::from_plan(plan);
        let match_id = instance.id();

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        {
            let mut handles = self.handles.write().map_err(|_| Self::lock_err())?;
            handles.insert(match_id, tx);
        }

        let driver = MatchDriver {
            instance,
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            pool: Arc::clone(&self.pool),
            subscribers: self.subscribers.clone(),
            settings: self.settings.clone(),
            requeue_tx: self.requeue_tx.clone(),
            commands: rx,
            requeue: Vec::new(),
        };
        let handles = Arc::clone(&self.handles);
        tokio::spawn(async move {
            driver.run().await;
            if let Ok(mut handles) = handles.write() {
                handles.remove(&match_id);
            }
        });
        Ok(())
    }

    /// Matches currently under supervision
    pub fn active_matches(&self) -> Result<Vec<MatchId>> {
        let handles = self.handles.read().map_err(|_| Self::lock_err())?;
        Ok(handles.keys().copied().collect())
    }

    pub async fn mark_ready(&self, match_id: &MatchId, player_id: &PlayerId) -> Result<ReadyOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(
            match_id,
            MatchCommand::MarkReady {
                player_id: player_id.clone(),
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| Self::gone(match_id))?
    }

    pub async fn cast_vote(
        &self,
        match_id: &MatchId,
        player_id: &PlayerId,
        choice: VoteChoice,
    ) -> Result<VoteOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(
            match_id,
            MatchCommand::CastVote {
                player_id: player_id.clone(),
                choice,
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| Self::gone(match_id))?
    }

    /// Administrative cancel; skips any remaining teardown grace
    pub async fn force_cancel(&self, match_id: &MatchId, reason: impl Into<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            match_id,
            MatchCommand::ForceCancel {
                reason: reason.into(),
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| Self::gone(match_id))?
    }

    /// Ask to rejoin a queue automatically when the match tears down
    pub async fn register_requeue(
        &self,
        match_id: &MatchId,
        player_id: &PlayerId,
        queue_id: &QueueId,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(
            match_id,
            MatchCommand::RegisterRequeue {
                player_id: player_id.clone(),
                queue_id: queue_id.clone(),
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| Self::gone(match_id))?
    }

    fn gone(match_id: &MatchId) -> anyhow::Error {
        MatchmakingError::MatchNotFound {
            match_id: match_id.to_string(),
        }
        .into()
    }

    async fn send(&self, match_id: &MatchId, command: MatchCommand) -> Result<()> {
        let sender = {
            let handles = self.handles.read().map_err(|_| Self::lock_err())?;
            handles.get(match_id).cloned()
        };
        match sender {
            Some(sender) => sender.send(command).await.map_err(|_| Self::gone(match_id)),
            None => Err(Self::gone(match_id)),
        }
    }
}

/// The single writer for one match
struct MatchDriver {
    instance: MatchInstance,
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    pool: Arc<PlayerPool>,
    subscribers: Vec<Arc<dyn ResultSubscriber>>,
    settings: MatchmakingSettings,
    requeue_tx: mpsc::Sender<RequeueRequest>,
    commands: mpsc::Receiver<MatchCommand>,
    requeue: Vec<RequeueRequest>,
}

impl MatchDriver {
    async fn run(mut self) {
        let match_id = self.instance.id();
        info!("Supervising match {}", match_id);

        self.announce().await;
        self.ready_phase().await;
        if self.instance.state() == crate::types::MatchState::InProgress {
            self.play_phase().await;
        }
        self.teardown().await;
        info!("Match {} torn down", match_id);
    }

    /// Initial -> Created -> ReadyUp, persisted and announced at each step
    async fn announce(&mut self) {
        let snapshot = self.instance.snapshot();
        if let Err(e) = self.store.save_match(&snapshot) {
            error!("Failed to persist new match {}: {}", snapshot.id, e);
        }
        if self.instance.mark_created().is_ok() {
            self.persist_and_notify().await;
        }
        if self.instance.begin_ready_up().is_ok() {
            self.persist_and_notify().await;
        }
    }

    async fn ready_phase(&mut self) {
        let deadline = sleep(self.settings.ready_timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!(
                        "Match {} cancelled: not everyone readied in time",
                        self.instance.id()
                    );
                    self.cancel(CancelReason::ReadyTimeout).await;
                    return;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                return;
                            }
                        }
                        None => {
                            self.cancel(CancelReason::Forced("supervisor shut down".to_string()))
                                .await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn play_phase(&mut self) {
        let deadline = sleep(self.settings.vote_timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!("Match {} cancelled: no vote majority in time", self.instance.id());
                    self.cancel(CancelReason::VoteTimeout).await;
                    return;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                return;
                            }
                        }
                        None => {
                            self.cancel(CancelReason::Forced("supervisor shut down".to_string()))
                                .await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Apply one command; returns true when the current phase is over
    async fn handle_command(&mut self, command: MatchCommand) -> bool {
        match command {
            MatchCommand::MarkReady { player_id, reply } => {
                let outcome = self.instance.mark_ready(&player_id);
                let all_ready = matches!(outcome, Ok(ReadyOutcome::AllReady));
                let _ = reply.send(outcome);
                if all_ready {
                    self.begin_play().await;
                }
                all_ready
            }
            MatchCommand::CastVote {
                player_id,
                choice,
                reply,
            } => {
                let outcome = self.instance.cast_vote(&player_id, choice);
                let decided = match &outcome {
                    Ok(VoteOutcome::Cancelled) => Some(None),
                    Ok(VoteOutcome::Won(side)) => Some(Some(*side)),
                    _ => None,
                };
                let _ = reply.send(outcome);
                match decided {
                    Some(None) => {
                        self.cancel(CancelReason::PlayerVote).await;
                        true
                    }
                    Some(Some(side)) => {
                        self.complete(side).await;
                        true
                    }
                    None => false,
                }
            }
            MatchCommand::ForceCancel { reason, reply } => {
                let result = self.instance.cancel(CancelReason::Forced(reason));
                let cancelled = result.is_ok();
                let _ = reply.send(result);
                if cancelled {
                    self.persist_and_notify().await;
                    self.free_players();
                }
                cancelled
            }
            MatchCommand::RegisterRequeue {
                player_id,
                queue_id,
                reply,
            } => {
                let _ = reply.send(self.record_requeue(player_id, queue_id));
                false
            }
        }
    }

    fn record_requeue(&mut self, player_id: PlayerId, queue_id: QueueId) -> Result<()> {
        if !self.instance.contains_player(&player_id) {
            return Err(MatchmakingError::NotInMatch {
                player_id,
                match_id: self.instance.id().to_string(),
            }
            .into());
        }
        let request = RequeueRequest {
            player_id,
            queue_id,
        };
        if !self.requeue.contains(&request) {
            self.requeue.push(request);
        }
        Ok(())
    }

    async fn begin_play(&mut self) {
        if let Err(e) = self.instance.begin_play() {
            error!("Match {} could not start: {}", self.instance.id(), e);
            return;
        }
        self.persist_and_notify().await;
    }

    async fn complete(&mut self, winner: TeamSide) {
        if let Err(e) = self.instance.complete(winner) {
            error!("Match {} could not complete: {}", self.instance.id(), e);
            return;
        }
        self.persist_and_notify().await;

        let result = match self.instance.to_result() {
            Ok(result) => result,
            Err(e) => {
                error!("Match {} has no result: {}", self.instance.id(), e);
                return;
            }
        };
        if let Err(e) = self.store.save_match_result(&result) {
            error!("Failed to persist result of match {}: {}", result.match_id, e);
        }
        for subscriber in &self.subscribers {
            if let Err(e) = subscriber.match_result(&result).await {
                error!(
                    "Result subscriber failed for match {}: {}",
                    result.match_id, e
                );
            }
        }
        self.free_players();
    }

    async fn cancel(&mut self, reason: CancelReason) {
        let reason_text = reason.to_string();
        if let Err(e) = self.instance.cancel(reason) {
            error!("Match {} could not cancel: {}", self.instance.id(), e);
            return;
        }
        info!("Match {} cancelled ({})", self.instance.id(), reason_text);
        self.persist_and_notify().await;
        self.free_players();
    }

    /// Players may queue again as soon as the outcome is decided
    fn free_players(&self) {
        let snapshot = self.instance.snapshot();
        for player_id in snapshot.players() {
            if let Err(e) = self.pool.clear_match(player_id) {
                error!("Failed to free player {}: {}", player_id, e);
            }
        }
    }

    /// Grace delay (skipped after a force-cancel), then close and free players
    async fn teardown(&mut self) {
        let forced = matches!(self.instance.cancel_reason(), Some(CancelReason::Forced(_)));
        let grace = match self.instance.state() {
            crate::types::MatchState::Completed => Some(self.settings.completed_grace()),
            crate::types::MatchState::Cancelled if !forced => {
                Some(self.settings.cancelled_grace())
            }
            _ => None,
        };
        if let Some(grace) = grace {
            self.grace_window(grace).await;
        }

        if self.instance.close().is_ok() {
            self.persist_and_notify().await;
        }

        // Backstop; players normally come free at completion or cancellation
        self.free_players();
        for request in self.requeue.drain(..) {
            if let Err(e) = self.requeue_tx.send(request).await {
                warn!("Requeue dropped, service is shutting down: {}", e);
            }
        }
    }

    /// Commands still get answers during the grace window; a force-cancel
    /// cuts it short
    async fn grace_window(&mut self, grace: std::time::Duration) {
        let deadline = sleep(grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return,
                command = self.commands.recv() => {
                    match command {
                        Some(MatchCommand::ForceCancel { reply, .. }) => {
                            let _ = reply.send(Ok(()));
                            return;
                        }
                        Some(MatchCommand::RegisterRequeue { player_id, queue_id, reply }) => {
                            let _ = reply.send(self.record_requeue(player_id, queue_id));
                        }
                        Some(MatchCommand::MarkReady { player_id, reply }) => {
                            let _ = reply.send(self.instance.mark_ready(&player_id));
                        }
                        Some(MatchCommand::CastVote { player_id, choice, reply }) => {
                            let _ = reply.send(self.instance.cast_vote(&player_id, choice));
                        }
                        None => return,
                    }
                }
            }
        }
    }

    async fn persist_and_notify(&self) {
        let snapshot = self.instance.snapshot();
        if let Err(e) = self.store.update_match(&snapshot) {
            error!("Failed to persist match {}: {}", snapshot.id, e);
        }
        if let Err(e) = self.events.match_state_changed(&snapshot).await {
            error!("Failed to announce match {}: {}", snapshot.id, e);
        }
    }
}
