//! Queue configuration and registry
//!
//! The registry owns every queue definition: display metadata, map pool,
//! target size, team algorithm, and the enabled flag. Map-pool edits enforce
//! the duplicate and last-map guards.

use crate::error::{MatchmakingError, Result};
use crate::types::{MapName, ModeId, QueueId, TeamAlgorithm};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Definition of one matchmaking queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub id: QueueId,
    pub mode_id: ModeId,
    pub display_name: String,
    /// Ordered, non-empty map pool
    pub maps: Vec<MapName>,
    /// Total players per match; even for the 2-team split, or 1 for solo testing
    pub team_size: usize,
    pub algorithm: TeamAlgorithm,
    pub enabled: bool,
}

impl QueueConfig {
    pub fn new(
        id: impl Into<QueueId>,
        mode_id: impl Into<ModeId>,
        display_name: impl Into<String>,
        maps: Vec<MapName>,
        team_size: usize,
    ) -> Self {
        Self {
            id: id.into(),
            mode_id: mode_id.into(),
            display_name: display_name.into(),
            maps,
            team_size,
            algorithm: TeamAlgorithm::Random,
            enabled: true,
        }
    }

    pub fn with_algorithm(mut self, algorithm: TeamAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.maps.is_empty() {
            return Err(MatchmakingError::ConfigurationError {
                message: format!("Queue {} must have at least one map", self.id),
            }
            .into());
        }
        // Size 1 is allowed for solo testing, everything else must split evenly
        if self.team_size == 0 || (self.team_size != 1 && self.team_size % 2 != 0) {
            return Err(MatchmakingError::ConfigurationError {
                message: format!(
                    "Queue {} team size {} must be even (or 1 for solo testing)",
                    self.id, self.team_size
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Thread-safe registry of queue configurations
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<QueueId, QueueConfig>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> MatchmakingError {
        MatchmakingError::InternalError {
            message: "Failed to acquire queue registry lock".to_string(),
        }
    }

    /// Register or replace a queue definition
    pub fn register(&self, config: QueueConfig) -> Result<()> {
        config.validate()?;
        let mut queues = self.queues.write().map_err(|_| Self::lock_err())?;
        queues.insert(config.id.clone(), config);
        Ok(())
    }

    pub fn get(&self, queue_id: &QueueId) -> Result<QueueConfig> {
        let queues = self.queues.read().map_err(|_| Self::lock_err())?;
        queues
            .get(queue_id)
            .cloned()
            .ok_or_else(|| {
                MatchmakingError::QueueNotFound {
                    queue_id: queue_id.clone(),
                }
                .into()
            })
    }

    /// All registered queue ids
    pub fn queue_ids(&self) -> Result<Vec<QueueId>> {
        let queues = self.queues.read().map_err(|_| Self::lock_err())?;
        Ok(queues.keys().cloned().collect())
    }

    pub fn set_algorithm(&self, queue_id: &QueueId, algorithm: TeamAlgorithm) -> Result<()> {
        self.update(queue_id, |config| {
            config.algorithm = algorithm;
            Ok(())
        })
    }

    /// Flip the enabled flag; returns the previous value
    pub fn set_enabled(&self, queue_id: &QueueId, enabled: bool) -> Result<bool> {
        let mut previous = false;
        self.update(queue_id, |config| {
            previous = config.enabled;
            config.enabled = enabled;
            Ok(())
        })?;
        Ok(previous)
    }

    pub fn add_map(&self, queue_id: &QueueId, map: &MapName) -> Result<()> {
        self.update(queue_id, |config| {
            if config.maps.contains(map) {
                return Err(MatchmakingError::DuplicateMap {
                    queue_id: queue_id.clone(),
                    map: map.clone(),
                }
                .into());
            }
            config.maps.push(map.clone());
            Ok(())
        })
    }

    pub fn remove_map(&self, queue_id: &QueueId, map: &MapName) -> Result<()> {
        self.update(queue_id, |config| {
            if !config.maps.contains(map) {
                return Err(MatchmakingError::MapNotFound {
                    queue_id: queue_id.clone(),
                    map: map.clone(),
                }
                .into());
            }
            if config.maps.len() == 1 {
                return Err(MatchmakingError::LastMapProtected {
                    queue_id: queue_id.clone(),
                }
                .into());
            }
            config.maps.retain(|m| m != map);
            Ok(())
        })
    }

    fn update<F>(&self, queue_id: &QueueId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut QueueConfig) -> Result<()>,
    {
        let mut queues = self.queues.write().map_err(|_| Self::lock_err())?;
        let config = queues.get_mut(queue_id).ok_or_else(|| {
            anyhow::Error::from(MatchmakingError::QueueNotFound {
                queue_id: queue_id.clone(),
            })
        })?;
        mutate(config)
    }
}
