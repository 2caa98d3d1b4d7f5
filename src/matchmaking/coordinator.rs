//! Formation coordinator
//!
//! One global lock covers the read-pool/form/lock-players sequence, so two
//! concurrent triggers (a join racing the sweep, or two queues sharing
//! players) can never book the same player into two matches.

use crate::error::Result;
use crate::lifecycle::MatchSupervisor;
use crate::matchmaking::MatchEngine;
use crate::queue::{PlayerPool, QueueRegistry};
use crate::types::{MatchId, QueueId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Serializes match formation across every queue
pub struct MatchCoordinator {
    formation_lock: Mutex<()>,
    pool: Arc<PlayerPool>,
    registry: Arc<QueueRegistry>,
    engine: MatchEngine,
    supervisor: Arc<MatchSupervisor>,
}

impl MatchCoordinator {
    pub fn new(
        pool: Arc<PlayerPool>,
        registry: Arc<QueueRegistry>,
        engine: MatchEngine,
        supervisor: Arc<MatchSupervisor>,
    ) -> Self {
        Self {
            formation_lock: Mutex::new(()),
            pool,
            registry,
            engine,
            supervisor,
        }
    }

    /// Try to form one match from a queue's current pool. Holding the
    /// formation lock from pool read through player lock-in is what makes
    /// the no-double-booking guarantee.
    pub async fn check_queue(&self, queue_id: &QueueId) -> Result<Option<MatchId>> {
        let guard = self.formation_lock.lock().await;

        let config = self.registry.get(queue_id)?;
        if !config.enabled {
            return Ok(None);
        }
        let members = self.pool.members(queue_id)?;

        let plan = {
            let mut rng = rand::thread_rng();
            self.engine.try_form_match(&config, members, &mut rng)
        };
        let plan = match plan {
            Some(plan) => plan,
            None => return Ok(None),
        };

        let match_id = plan.id;
        self.pool.assign_match(&plan.players(), match_id)?;
        drop(guard);

        info!(
            "Match {} formed on queue {} with {} players",
            match_id,
            queue_id,
            plan.players().len()
        );
        self.supervisor.launch(plan)?;
        Ok(Some(match_id))
    }

    /// One pass over every queue, draining each until it can no longer form
    /// a match. Per-queue failures are isolated.
    pub async fn sweep(self: &Arc<Self>) -> usize {
        let queue_ids = match self.registry.queue_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!("Sweep could not list queues: {}", e);
                return 0;
            }
        };

        let mut tasks = JoinSet::new();
        for queue_id in queue_ids {
            let coordinator = Arc::clone(self);
            tasks.spawn(async move {
                let mut formed = 0;
                loop {
                    match coordinator.check_queue(&queue_id).await {
                        Ok(Some(_)) => formed += 1,
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Sweep failed for queue {}: {}", queue_id, e);
                            break;
                        }
                    }
                }
                formed
            });
        }

        let mut formed = 0;
        while let Some(joined) = tasks.join_next().await {
            formed += joined.unwrap_or(0);
        }
        formed
    }

    /// Periodic sweep: catches pools that filled without a join trigger
    /// (requeues, re-enabled queues)
    pub fn start_sweep_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let formed = self.sweep().await;
                if formed > 0 {
                    debug!("Sweep formed {} matches", formed);
                }
            }
        })
    }
}
