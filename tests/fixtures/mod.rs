//! Test fixtures for integration testing

use scrim_hall::config::{AppConfig, MatchmakingSettings};
use scrim_hall::events::RecordingEventSink;
use scrim_hall::queue::QueueConfig;
use scrim_hall::service::MatchmakingService;
use scrim_hall::storage::InMemoryRecordStore;
use scrim_hall::types::{MatchId, PlayerId, QueueId, TeamAlgorithm};
use std::sync::Arc;

/// A complete wired system with handles to its observable edges
pub struct TestSystem {
    pub service: Arc<MatchmakingService>,
    pub store: Arc<InMemoryRecordStore>,
    pub events: Arc<RecordingEventSink>,
}

/// Short timers so tests ride out timeouts and grace windows quickly
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.matchmaking = MatchmakingSettings {
        ready_timeout_seconds: 5,
        vote_timeout_seconds: 30,
        completed_grace_seconds: 1,
        cancelled_grace_seconds: 1,
        sweep_interval_seconds: 1,
    };
    config
}

pub fn create_test_system() -> TestSystem {
    let store = Arc::new(InMemoryRecordStore::new());
    let events = Arc::new(RecordingEventSink::new());
    let service = MatchmakingService::new(test_config(), store.clone(), events.clone())
        .expect("service construction");
    TestSystem {
        service: Arc::new(service),
        store,
        events,
    }
}

pub fn ctf_queue(id: &str, team_size: usize, algorithm: TeamAlgorithm) -> QueueConfig {
    QueueConfig::new(
        id,
        "ctf",
        format!("{} CTF", id),
        vec!["dm4".to_string(), "e1m2".to_string()],
        team_size,
    )
    .with_algorithm(algorithm)
}

/// Join `count` players named p0..pN into a queue
pub async fn join_players(
    system: &TestSystem,
    queue_id: &QueueId,
    count: usize,
) -> Vec<PlayerId> {
    let players: Vec<PlayerId> = (0..count).map(|i| format!("p{}", i)).collect();
    for player in &players {
        system
            .service
            .join_queue(player, queue_id)
            .await
            .expect("join");
    }
    players
}

/// The match every listed player ended up in (panics on a split booking)
pub fn shared_match(system: &TestSystem, players: &[PlayerId]) -> MatchId {
    let mut ids = players.iter().map(|p| {
        system
            .service
            .active_match(p)
            .expect("pool lookup")
            .expect("player not in a match")
    });
    let first = ids.next().expect("no players given");
    assert!(ids.all(|id| id == first), "players split across matches");
    first
}

/// Mark every listed player ready
pub async fn ready_all(system: &TestSystem, match_id: &MatchId, players: &[PlayerId]) {
    for player in players {
        system
            .service
            .mark_ready(match_id, player)
            .await
            .expect("mark ready");
    }
}
