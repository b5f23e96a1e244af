use latte_mafia::{
    ChannelId, EventBus, EventKind, Game, GameId, Identity, MafiaError, Phase, SessionRegistry,
    StopOutcome, UserId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn identity(id: u64, name: &str) -> Identity {
    Identity {
        id: UserId(id),
        name: name.to_string(),
        avatar_url: format!("https://cdn.example/avatars/{id}.png"),
        dm_channel: ChannelId(9000 + id),
    }
}

fn registry() -> Arc<SessionRegistry> {
    Arc::new(SessionRegistry::new(EventBus::new()))
}

/// A session id must sit in exactly one of {absent, waiting, running}.
fn assert_partition(registry: &SessionRegistry, id: GameId, expected: Option<Phase>) {
    let waiting = registry.find_waiting(id).is_ok();
    let running = registry.find_running(id).is_ok();
    match expected {
        Some(Phase::Waiting) => assert!(waiting && !running),
        Some(Phase::Running) => assert!(!waiting && running),
        Some(Phase::Stopped) | None => assert!(!waiting && !running),
    }
    match expected {
        None => assert!(registry.find_session(id).is_err()),
        Some(phase) => assert_eq!(registry.find_session(id).unwrap().phase(), phase),
    }
}

#[test]
fn night1_start_scenario() {
    let registry = registry();
    let bus = registry.event_bus();
    let vote_starts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&vote_starts);
    bus.subscribe(EventKind::VoteStart, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let session = registry.create_session("Night1", ChannelId(500));
    assert_eq!(session.id(), GameId(1));
    assert_eq!(session.name(), "Night1");
    assert!(session.is_waiting());

    session.join_player(identity(10, "A")).unwrap();
    session.join_player(identity(11, "B")).unwrap();
    assert_eq!(session.player_count(), 2);

    let failures = session.start(&registry).unwrap();
    assert!(failures.is_empty());
    assert!(session.is_running());
    assert!(registry.find_running(GameId(1)).is_ok());
    assert_eq!(
        registry.find_waiting(GameId(1)).unwrap_err(),
        MafiaError::SessionNotFound {
            id: GameId(1),
            phase: Some(Phase::Running),
        }
    );
    // start() itself must have published exactly one VoteStart
    assert_eq!(vote_starts.load(Ordering::SeqCst), 1);
}

#[test]
fn ids_are_unique_and_names_may_repeat() {
    let registry = registry();
    let a = registry.create_session("village", ChannelId(1));
    let b = registry.create_session("village", ChannelId(1));
    assert_ne!(a.id(), b.id());
    assert_eq!(a.name(), b.name());
}

#[test]
fn session_is_in_exactly_one_partition_through_its_life() {
    let registry = registry();
    let id = GameId(1);
    assert_partition(&registry, id, None);

    let session = registry.create_session("game", ChannelId(1));
    assert_partition(&registry, id, Some(Phase::Waiting));

    // interleave a second session to check isolation
    let other = registry.create_session("other", ChannelId(2));
    session.start(&registry).unwrap();
    assert_partition(&registry, id, Some(Phase::Running));
    assert_partition(&registry, other.id(), Some(Phase::Waiting));

    other.start(&registry).unwrap();
    assert_partition(&registry, other.id(), Some(Phase::Running));

    assert_eq!(session.stop(&registry).unwrap(), StopOutcome::Completed);
    assert_partition(&registry, id, Some(Phase::Stopped));
    assert_partition(&registry, other.id(), Some(Phase::Running));

    assert_eq!(other.stop(&registry).unwrap(), StopOutcome::Completed);
    assert_partition(&registry, other.id(), Some(Phase::Stopped));
}

#[test]
fn start_from_running_or_stopped_fails_without_mutation() {
    let registry = registry();
    let session = registry.create_session("game", ChannelId(1));
    session.start(&registry).unwrap();

    assert_eq!(
        session.start(&registry).unwrap_err(),
        MafiaError::InvalidTransition {
            from: Phase::Running,
            to: Phase::Running,
        }
    );
    assert_partition(&registry, session.id(), Some(Phase::Running));

    session.stop(&registry).unwrap();
    assert_eq!(
        session.start(&registry).unwrap_err(),
        MafiaError::InvalidTransition {
            from: Phase::Stopped,
            to: Phase::Running,
        }
    );
    assert_partition(&registry, session.id(), Some(Phase::Stopped));
}

#[test]
fn stopping_a_waiting_session_aborts_it() {
    let registry = registry();
    let session = registry.create_session("cancelled", ChannelId(1));
    assert_eq!(session.stop(&registry).unwrap(), StopOutcome::Aborted);
    assert_eq!(session.phase(), Phase::Stopped);

    assert_eq!(
        session.stop(&registry).unwrap_err(),
        MafiaError::InvalidTransition {
            from: Phase::Stopped,
            to: Phase::Stopped,
        }
    );
}

#[test]
fn stopped_sessions_stay_findable_for_history() {
    let registry = registry();
    let session = registry.create_session("done", ChannelId(1));
    session.start(&registry).unwrap();
    session.stop(&registry).unwrap();

    let found = registry.find_session(session.id()).unwrap();
    assert_eq!(found.phase(), Phase::Stopped);
    assert!(registry.active_sessions().is_empty());
    assert_eq!(registry.session_count(), 1);
}

#[test]
fn join_then_leave_restores_the_player_mapping() {
    let registry = registry();
    let session = registry.create_session("game", ChannelId(1));
    session.join_player(identity(10, "A")).unwrap();
    let before: Vec<_> = session.players();

    session.join_player(identity(11, "B")).unwrap();
    let left = session.leave_player(UserId(11)).unwrap();
    assert_eq!(left.id(), UserId(11));
    assert_eq!(left.name(), "B");
    assert_eq!(session.players(), before);
}

#[test]
fn duplicate_join_replaces_the_snapshot() {
    let registry = registry();
    let session = registry.create_session("game", ChannelId(1));
    session.join_player(identity(10, "old name")).unwrap();
    session.join_player(identity(10, "new name")).unwrap();

    assert_eq!(session.player_count(), 1);
    assert_eq!(session.player(UserId(10)).unwrap().name(), "new name");
}

#[test]
fn join_is_waiting_only_but_leave_works_mid_game() {
    let registry = registry();
    let session = registry.create_session("game", ChannelId(1));
    session.join_player(identity(10, "A")).unwrap();
    session.start(&registry).unwrap();

    assert!(matches!(
        session.join_player(identity(11, "B")).unwrap_err(),
        MafiaError::InvalidTransition {
            from: Phase::Running,
            ..
        }
    ));
    assert!(session.leave_player(UserId(10)).is_ok());
    assert_eq!(
        session.leave_player(UserId(10)).unwrap_err(),
        MafiaError::PlayerNotFound {
            session: session.id(),
            user: UserId(10),
        }
    );
}

#[test]
fn player_snapshot_keeps_identity_fields() {
    let registry = registry();
    let session = registry.create_session("game", ChannelId(1));
    let player = session.join_player(identity(10, "A")).unwrap();

    assert_eq!(player.session_id(), session.id());
    assert_eq!(player.dm_channel(), ChannelId(9010));
    assert_eq!(player.avatar_url(), "https://cdn.example/avatars/10.png");
    assert_eq!(player.weight(), 1);
    assert!(player.is_alive());
}

#[test]
fn not_found_metadata_distinguishes_missing_from_wrong_phase() {
    let registry = registry();
    assert_eq!(
        registry.find_session(GameId(999)).unwrap_err(),
        MafiaError::SessionNotFound {
            id: GameId(999),
            phase: None,
        }
    );

    let session = registry.create_session("game", ChannelId(1));
    assert_eq!(
        registry.find_running(session.id()).unwrap_err(),
        MafiaError::SessionNotFound {
            id: session.id(),
            phase: Some(Phase::Waiting),
        }
    );
}

#[test]
fn session_debug_output_names_id_and_phase() {
    let registry = registry();
    let session = registry.create_session("game", ChannelId(1));
    // lookups return Result<Arc<GameSession>, _>, so unwrap_err in the
    // tests above relies on this formatting
    let rendered = format!("{:?}", registry.find_session(session.id()).unwrap());
    assert!(rendered.contains("GameSession"));
    assert!(rendered.contains("Waiting"));
}

#[test]
fn find_player_session_scans_active_partitions() {
    let registry = registry();
    let session = registry.create_session("game", ChannelId(1));
    session.join_player(identity(10, "A")).unwrap();

    assert_eq!(registry.find_player_session(UserId(10)), Some(session.id()));
    assert_eq!(registry.find_player_session(UserId(99)), None);

    session.start(&registry).unwrap();
    assert_eq!(registry.find_player_session(UserId(10)), Some(session.id()));

    session.stop(&registry).unwrap();
    assert_eq!(registry.find_player_session(UserId(10)), None);
}
