//! The matchmaking service facade
//!
//! Wires pool, registry, engine, supervisor, coordinator, and rating engine
//! together and exposes the operations the presentation layer calls. Also
//! owns the background tasks: the periodic formation sweep and the requeue
//! worker that rejoins players after their match tears down.

use crate::config::AppConfig;
use crate::error::{MatchmakingError, Result};
use crate::events::{EventSink, ResultSubscriber};
use crate::lifecycle::{MatchSupervisor, ReadyOutcome, RequeueRequest, VoteOutcome};
use crate::matchmaking::{MatchCoordinator, MatchEngine};
use crate::queue::{PlayerPool, QueueConfig, QueueRegistry};
use crate::rating::{RatingEngine, RatingSystemConfig};
use crate::storage::RecordStore;
use crate::types::{
    LeaderboardEntry, MapName, MatchId, MatchState, ModeId, PlayerId, PlayerRecord, QueueId,
    TeamAlgorithm, VoteChoice,
};
use crate::utils::current_timestamp;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const REQUEUE_BUFFER: usize = 64;

/// Everything a caller can do to the matchmaking system
pub struct MatchmakingService {
    config: AppConfig,
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    pool: Arc<PlayerPool>,
    registry: Arc<QueueRegistry>,
    rating: Arc<RatingEngine>,
    supervisor: Arc<MatchSupervisor>,
    coordinator: Arc<MatchCoordinator>,
    requeue_rx: Mutex<Option<mpsc::Receiver<RequeueRequest>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MatchmakingService {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let pool = Arc::new(PlayerPool::new());
        let registry = Arc::new(QueueRegistry::new());
        let rating = Arc::new(RatingEngine::new(
            Arc::clone(&store),
            RatingSystemConfig::from_settings(&config.rating),
        )?);

        let (requeue_tx, requeue_rx) = mpsc::channel(REQUEUE_BUFFER);
        let subscribers: Vec<Arc<dyn ResultSubscriber>> = vec![Arc::clone(&rating) as _];
        let supervisor = Arc::new(MatchSupervisor::new(
            Arc::clone(&store),
            Arc::clone(&events),
            Arc::clone(&pool),
            subscribers,
            config.matchmaking.clone(),
            requeue_tx,
        ));
        let coordinator = Arc::new(MatchCoordinator::new(
            Arc::clone(&pool),
            Arc::clone(&registry),
            MatchEngine::new(Arc::clone(&rating)),
            Arc::clone(&supervisor),
        ));

        Ok(Self {
            config,
            store,
            events,
            pool,
            registry,
            rating,
            supervisor,
            coordinator,
            requeue_rx: Mutex::new(Some(requeue_rx)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn lock_err() -> MatchmakingError {
        MatchmakingError::InternalError {
            message: "Failed to acquire service task lock".to_string(),
        }
    }

    /// Spawn the periodic sweep and the requeue worker
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let requeue_rx = self
            .requeue_rx
            .lock()
            .map_err(|_| Self::lock_err())?
            .take()
            .ok_or(MatchmakingError::InternalError {
                message: "Service already started".to_string(),
            })?;

        let sweep = Arc::clone(&self.coordinator)
            .start_sweep_task(self.config.matchmaking.sweep_interval());

        let service = Arc::clone(self);
        let requeue = tokio::spawn(async move {
            let mut requeue_rx = requeue_rx;
            while let Some(request) = requeue_rx.recv().await {
                match service
                    .join_queue(&request.player_id, &request.queue_id)
                    .await
                {
                    Ok(_) => info!(
                        "Requeued player {} into {}",
                        request.player_id, request.queue_id
                    ),
                    Err(e) => warn!(
                        "Requeue failed for player {} into {}: {}",
                        request.player_id, request.queue_id, e
                    ),
                }
            }
        });

        let mut tasks = self.tasks.lock().map_err(|_| Self::lock_err())?;
        tasks.push(sweep);
        tasks.push(requeue);
        info!(
            "Matchmaking service started (sweep every {}s)",
            self.config.matchmaking.sweep_interval_seconds
        );
        Ok(())
    }

    /// Stop background tasks and force-cancel everything still running
    pub async fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        match self.reset_all_active_matches("service shutdown").await {
            Ok(count) if count > 0 => info!("Cancelled {} matches during shutdown", count),
            Ok(_) => {}
            Err(e) => error!("Shutdown cleanup failed: {}", e),
        }
        info!("Matchmaking service stopped");
    }

    // Queue administration

    pub fn register_queue(&self, config: QueueConfig) -> Result<()> {
        info!("Registering queue {} ({})", config.id, config.display_name);
        self.registry.register(config)
    }

    pub fn queue_ids(&self) -> Result<Vec<QueueId>> {
        self.registry.queue_ids()
    }

    pub fn queue_config(&self, queue_id: &QueueId) -> Result<QueueConfig> {
        self.registry.get(queue_id)
    }

    pub fn set_algorithm(&self, queue_id: &QueueId, algorithm: TeamAlgorithm) -> Result<()> {
        info!("Queue {} now splits teams with {}", queue_id, algorithm);
        self.registry.set_algorithm(queue_id, algorithm)
    }

    /// Re-enable a queue and immediately look for a formable match
    pub async fn enable_queue(&self, queue_id: &QueueId) -> Result<()> {
        self.registry.set_enabled(queue_id, true)?;
        info!("Queue {} enabled", queue_id);
        self.coordinator.check_queue(queue_id).await?;
        Ok(())
    }

    /// Disable a queue and evict everyone waiting in it
    pub async fn disable_queue(&self, queue_id: &QueueId) -> Result<Vec<PlayerId>> {
        self.registry.set_enabled(queue_id, false)?;
        let evicted = self.pool.evict_all(queue_id)?;
        info!("Queue {} disabled, {} players evicted", queue_id, evicted.len());
        if !evicted.is_empty() {
            self.notify_queue(queue_id).await;
        }
        Ok(evicted)
    }

    pub fn add_map(&self, queue_id: &QueueId, map: &MapName) -> Result<()> {
        self.registry.add_map(queue_id, map)
    }

    pub fn remove_map(&self, queue_id: &QueueId, map: &MapName) -> Result<()> {
        self.registry.remove_map(queue_id, map)
    }

    // Queue membership

    /// Join a queue; triggers a formation check when the membership grows.
    /// Returns false when the player was already waiting in this queue.
    pub async fn join_queue(&self, player_id: &PlayerId, queue_id: &QueueId) -> Result<bool> {
        let config = self.registry.get(queue_id)?;
        if !config.enabled {
            return Err(MatchmakingError::QueueDisabled {
                queue_id: queue_id.clone(),
            }
            .into());
        }

        self.ensure_player(player_id)?;
        let joined = self.pool.join(player_id, queue_id)?;
        if joined {
            self.notify_queue(queue_id).await;
            self.coordinator.check_queue(queue_id).await?;
        }
        Ok(joined)
    }

    /// Leave a queue; returns false when the player was not waiting in it
    pub async fn leave_queue(&self, player_id: &PlayerId, queue_id: &QueueId) -> Result<bool> {
        self.registry.get(queue_id)?;
        let removed = self.pool.leave(player_id, queue_id)?;
        if removed {
            self.notify_queue(queue_id).await;
        }
        Ok(removed)
    }

    pub fn queue_members(&self, queue_id: &QueueId) -> Result<Vec<PlayerId>> {
        self.registry.get(queue_id)?;
        self.pool.members(queue_id)
    }

    pub fn active_match(&self, player_id: &PlayerId) -> Result<Option<MatchId>> {
        self.pool.active_match(player_id)
    }

    // Match participation

    pub async fn mark_ready(&self, match_id: &MatchId, player_id: &PlayerId) -> Result<ReadyOutcome> {
        self.supervisor.mark_ready(match_id, player_id).await
    }

    pub async fn cast_vote(
        &self,
        match_id: &MatchId,
        player_id: &PlayerId,
        choice: VoteChoice,
    ) -> Result<VoteOutcome> {
        self.supervisor.cast_vote(match_id, player_id, choice).await
    }

    /// Ask to rejoin a queue automatically once this match tears down
    pub async fn register_requeue(
        &self,
        match_id: &MatchId,
        player_id: &PlayerId,
        queue_id: &QueueId,
    ) -> Result<()> {
        self.registry.get(queue_id)?;
        self.supervisor
            .register_requeue(match_id, player_id, queue_id)
            .await
    }

    pub async fn force_cancel(&self, match_id: &MatchId, reason: impl Into<String>) -> Result<()> {
        self.supervisor.force_cancel(match_id, reason).await
    }

    // Ratings

    pub fn leaderboard(&self, mode_id: &ModeId) -> Result<Vec<LeaderboardEntry>> {
        self.rating.leaderboard(
            mode_id,
            self.config.rating.leaderboard_limit,
            chrono::Duration::days(self.config.rating.leaderboard_window_days),
        )
    }

    pub fn predict_win(&self, match_id: &MatchId) -> Result<(f64, f64)> {
        let snapshot = self
            .store
            .find_active_matches()?
            .into_iter()
            .find(|m| &m.id == match_id)
            .ok_or_else(|| MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            })?;

        let fetch = |team: &[PlayerId]| -> Result<Vec<crate::types::SkillRating>> {
            team.iter()
                .map(|p| self.rating.current_rating(p, &snapshot.mode_id))
                .collect()
        };
        let team1 = fetch(&snapshot.team1)?;
        let team2 = fetch(&snapshot.team2)?;
        Ok(self.rating.predict_win(&team1, &team2))
    }

    /// Wipe and replay a mode's rating history
    pub fn reset_all_ratings(&self, mode_id: &ModeId) -> Result<usize> {
        self.rating.rebuild(mode_id)
    }

    // Recovery

    /// Force-cancel every active match: the supervised ones through their
    /// tasks, plus any orphans persisted by a previous run
    pub async fn reset_all_active_matches(&self, reason: &str) -> Result<usize> {
        let supervised = self.supervisor.active_matches()?;
        let mut count = 0;
        for match_id in &supervised {
            if self.supervisor.force_cancel(match_id, reason).await.is_ok() {
                count += 1;
            }
        }

        let supervised: HashSet<MatchId> = supervised.into_iter().collect();
        for mut snapshot in self.store.find_active_matches()? {
            if supervised.contains(&snapshot.id) {
                continue;
            }
            snapshot.state = MatchState::Cancelled;
            self.store.update_match(&snapshot)?;
            snapshot.state = MatchState::Closed;
            self.store.update_match(&snapshot)?;
            for player_id in snapshot.players() {
                self.pool.clear_match(player_id)?;
            }
            if let Err(e) = self.events.match_state_changed(&snapshot).await {
                error!("Failed to announce match {}: {}", snapshot.id, e);
            }
            warn!("Closed orphaned match {} ({})", snapshot.id, reason);
            count += 1;
        }
        Ok(count)
    }

    fn ensure_player(&self, player_id: &PlayerId) -> Result<()> {
        if self.store.find_player(player_id)?.is_none() {
            self.store.save_player(&PlayerRecord {
                id: player_id.clone(),
                first_seen: current_timestamp(),
            })?;
        }
        Ok(())
    }

    async fn notify_queue(&self, queue_id: &QueueId) {
        if let Err(e) = self.events.queue_changed(queue_id).await {
            error!("Failed to announce queue {} change: {}", queue_id, e);
        }
    }
}
