//! Player pool: who is queued where, and who is locked into a match
//!
//! Queue membership and match assignment are mutually exclusive per player.
//! Every mutation bumps a per-queue watch channel so observers can recompute
//! state (at-least-once delivery; the payload is just a change counter).

use crate::error::{MatchmakingError, Result};
use crate::types::{MatchId, PlayerId, QueueId};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct PlayerState {
    queues: HashSet<QueueId>,
    match_id: Option<MatchId>,
}

#[derive(Debug, Default)]
struct PoolInner {
    players: HashMap<PlayerId, PlayerState>,
    feeds: HashMap<QueueId, watch::Sender<u64>>,
}

impl PoolInner {
    fn bump(&mut self, queue_id: &QueueId) {
        let sender = self
            .feeds
            .entry(queue_id.clone())
            .or_insert_with(|| watch::channel(0).0);
        let next = *sender.borrow() + 1;
        sender.send_replace(next);
    }
}

/// In-memory index of participants
#[derive(Debug, Default)]
pub struct PlayerPool {
    inner: RwLock<PoolInner>,
}

impl PlayerPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> MatchmakingError {
        MatchmakingError::InternalError {
            message: "Failed to acquire player pool lock".to_string(),
        }
    }

    /// Add a player to a queue. Returns false (no-op) if already a member;
    /// fails if the player is locked into an active match.
    pub fn join(&self, player_id: &PlayerId, queue_id: &QueueId) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        let state = inner.players.entry(player_id.clone()).or_default();

        if state.match_id.is_some() {
            return Err(MatchmakingError::AlreadyInMatch {
                player_id: player_id.clone(),
            }
            .into());
        }
        if !state.queues.insert(queue_id.clone()) {
            return Ok(false);
        }

        inner.bump(queue_id);
        Ok(true)
    }

    /// Remove a player from a queue. Returns false (no-op) if not a member.
    pub fn leave(&self, player_id: &PlayerId, queue_id: &QueueId) -> Result<bool> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        let removed = inner
            .players
            .get_mut(player_id)
            .map(|state| state.queues.remove(queue_id))
            .unwrap_or(false);

        if removed {
            inner.bump(queue_id);
        }
        Ok(removed)
    }

    /// Current members of a queue (order is not meaningful)
    pub fn members(&self, queue_id: &QueueId) -> Result<Vec<PlayerId>> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        Ok(inner
            .players
            .iter()
            .filter(|(_, state)| state.queues.contains(queue_id))
            .map(|(id, _)| id.clone())
            .collect())
    }

    /// Lock a set of players into a match: clears every queue membership and
    /// sets the match id, atomically per player. Used once per formation.
    pub fn assign_match(&self, player_ids: &[PlayerId], match_id: MatchId) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        let mut affected: HashSet<QueueId> = HashSet::new();

        for player_id in player_ids {
            let state = inner.players.entry(player_id.clone()).or_default();
            affected.extend(state.queues.drain());
            state.match_id = Some(match_id);
        }
        for queue_id in &affected {
            inner.bump(queue_id);
        }
        Ok(())
    }

    /// Release a player from their active match (no-op if unknown)
    pub fn clear_match(&self, player_id: &PlayerId) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        if let Some(state) = inner.players.get_mut(player_id) {
            state.match_id = None;
        }
        Ok(())
    }

    /// The match a player is currently locked into, if any
    pub fn active_match(&self, player_id: &PlayerId) -> Result<Option<MatchId>> {
        let inner = self.inner.read().map_err(|_| Self::lock_err())?;
        Ok(inner
            .players
            .get(player_id)
            .and_then(|state| state.match_id))
    }

    /// Remove every member of a queue (queue disable); returns who was evicted
    pub fn evict_all(&self, queue_id: &QueueId) -> Result<Vec<PlayerId>> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        let mut evicted = Vec::new();
        for (player_id, state) in inner.players.iter_mut() {
            if state.queues.remove(queue_id) {
                evicted.push(player_id.clone());
            }
        }
        if !evicted.is_empty() {
            inner.bump(queue_id);
        }
        Ok(evicted)
    }

    /// Subscribe to a queue's change feed; the value is a change counter and
    /// carries no state, observers recompute via `members`
    pub fn subscribe(&self, queue_id: &QueueId) -> Result<watch::Receiver<u64>> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_err())?;
        let sender = inner
            .feeds
            .entry(queue_id.clone())
            .or_insert_with(|| watch::channel(0).0);
        Ok(sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_match_id;

    fn ids(raw: &[&str]) -> Vec<PlayerId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_join_and_leave() {
        let pool = PlayerPool::new();
        let q = "naq".to_string();
        let p = "p1".to_string();

        assert!(pool.join(&p, &q).unwrap());
        assert_eq!(pool.members(&q).unwrap(), vec![p.clone()]);

        // Re-join is a no-op
        assert!(!pool.join(&p, &q).unwrap());

        assert!(pool.leave(&p, &q).unwrap());
        assert!(pool.members(&q).unwrap().is_empty());

        // Leaving when not a member is a no-op
        assert!(!pool.leave(&p, &q).unwrap());
    }

    #[test]
    fn test_join_rejected_while_in_match() {
        let pool = PlayerPool::new();
        let q = "naq".to_string();
        let p = "p1".to_string();

        pool.assign_match(&ids(&["p1"]), generate_match_id()).unwrap();
        assert!(pool.join(&p, &q).is_err());

        pool.clear_match(&p).unwrap();
        assert!(pool.join(&p, &q).unwrap());
    }

    #[test]
    fn test_assign_match_clears_memberships() {
        let pool = PlayerPool::new();
        let q1 = "naq".to_string();
        let q2 = "euq".to_string();
        let players = ids(&["p1", "p2"]);

        for p in &players {
            pool.join(p, &q1).unwrap();
        }
        pool.join(&players[0], &q2).unwrap();

        let match_id = generate_match_id();
        pool.assign_match(&players, match_id).unwrap();

        assert!(pool.members(&q1).unwrap().is_empty());
        assert!(pool.members(&q2).unwrap().is_empty());
        for p in &players {
            assert_eq!(pool.active_match(p).unwrap(), Some(match_id));
        }
    }

    #[test]
    fn test_evict_all() {
        let pool = PlayerPool::new();
        let q = "naq".to_string();
        for p in ids(&["p1", "p2", "p3"]) {
            pool.join(&p, &q).unwrap();
        }

        let mut evicted = pool.evict_all(&q).unwrap();
        evicted.sort();
        assert_eq!(evicted, ids(&["p1", "p2", "p3"]));
        assert!(pool.members(&q).unwrap().is_empty());

        // Second eviction finds nothing
        assert!(pool.evict_all(&q).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_change_feed_bumps_on_mutation() {
        let pool = PlayerPool::new();
        let q = "naq".to_string();
        let mut feed = pool.subscribe(&q).unwrap();
        let initial = *feed.borrow_and_update();

        pool.join(&"p1".to_string(), &q).unwrap();
        feed.changed().await.unwrap();
        assert!(*feed.borrow_and_update() > initial);

        // No-op join does not notify
        pool.join(&"p1".to_string(), &q).unwrap();
        assert!(!feed.has_changed().unwrap());

        pool.leave(&"p1".to_string(), &q).unwrap();
        feed.changed().await.unwrap();
    }

    #[tokio::test]
    async fn test_assign_match_notifies_affected_queues() {
        let pool = PlayerPool::new();
        let q1 = "naq".to_string();
        let q2 = "euq".to_string();
        pool.join(&"p1".to_string(), &q1).unwrap();
        pool.join(&"p1".to_string(), &q2).unwrap();

        let mut feed1 = pool.subscribe(&q1).unwrap();
        let mut feed2 = pool.subscribe(&q2).unwrap();
        feed1.borrow_and_update();
        feed2.borrow_and_update();

        pool.assign_match(&ids(&["p1"]), generate_match_id()).unwrap();

        assert!(feed1.has_changed().unwrap());
        assert!(feed2.has_changed().unwrap());
    }
}
