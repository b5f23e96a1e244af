use crate::chat::TransportError;
use crate::errors::MafiaError;
use crate::player::{ChannelId, UserId};
use crate::session::GameId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A notification raised by a game session or a player inside one.
///
/// Game-scope events (`VoteStart`, `VoteFinish`) are loopable: they may
/// recur many times over a session's life. Player-scope events (`Kill`,
/// `UserVote`) are one-shot per occurrence.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    VoteStart {
        session_id: GameId,
        channel: ChannelId,
    },
    VoteFinish {
        session_id: GameId,
    },
    Kill {
        session_id: GameId,
        by: UserId,
        target: UserId,
    },
    UserVote {
        session_id: GameId,
        voter: UserId,
        target: UserId,
        weight: u32,
    },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::VoteStart { .. } => EventKind::VoteStart,
            GameEvent::VoteFinish { .. } => EventKind::VoteFinish,
            GameEvent::Kill { .. } => EventKind::Kill,
            GameEvent::UserVote { .. } => EventKind::UserVote,
        }
    }

    pub fn loopable(&self) -> bool {
        matches!(self.kind(), EventKind::VoteStart | EventKind::VoteFinish)
    }

    pub fn session_id(&self) -> GameId {
        match self {
            GameEvent::VoteStart { session_id, .. }
            | GameEvent::VoteFinish { session_id }
            | GameEvent::Kill { session_id, .. }
            | GameEvent::UserVote { session_id, .. } => *session_id,
        }
    }
}

/// Routing tag for subscriptions.
///
/// `Any` matches every event, `Game` matches the loopable game-scope
/// events, `User` matches the player-scope events, and the remaining
/// tags match exactly one variant.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EventKind {
    Any,
    Game,
    User,
    VoteStart,
    VoteFinish,
    Kill,
    UserVote,
}

impl EventKind {
    pub fn matches(self, event: &GameEvent) -> bool {
        let exact = event.kind();
        match self {
            EventKind::Any => true,
            EventKind::Game => matches!(exact, EventKind::VoteStart | EventKind::VoteFinish),
            EventKind::User => matches!(exact, EventKind::Kill | EventKind::UserVote),
            kind => kind == exact,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error(transparent)]
    Game(#[from] MafiaError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Other(String),
}

/// One subscriber's failure during a publish. Dispatch to the remaining
/// subscribers is unaffected.
#[derive(Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub error: HandlerError,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionId(usize);

type EventHandler = Arc<dyn Fn(&GameEvent) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: EventHandler,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Default)]
struct EventBusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every published event matching `kind`.
    /// Handlers run in registration order.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&GameEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::AcqRel));
        let mut guard = self
            .inner
            .subscribers
            .write()
            .expect("subscriber lock poisoned");
        guard.push(Subscriber {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Delivers `event` to every matching subscriber. A failing handler
    /// never blocks delivery to the rest; its failure is collected and
    /// returned. Publishing with zero subscribers returns an empty list.
    ///
    /// The subscriber list is snapshotted before any handler runs, so a
    /// handler may publish, subscribe, or unsubscribe re-entrantly.
    pub fn publish(&self, event: &GameEvent) -> Vec<HandlerFailure> {
        let snapshot: Vec<Subscriber> = {
            let guard = self
                .inner
                .subscribers
                .read()
                .expect("subscriber lock poisoned");
            guard
                .iter()
                .filter(|sub| sub.kind.matches(event))
                .cloned()
                .collect()
        };

        let mut failures = Vec::new();
        for sub in snapshot {
            if let Err(error) = (sub.handler)(event) {
                failures.push(HandlerFailure {
                    subscription: sub.id,
                    error,
                });
            }
        }
        failures
    }

    /// Removes a subscription. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .expect("subscriber lock poisoned");
        guard.retain(|sub| sub.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self
            .inner
            .subscribers
            .read()
            .expect("subscriber lock poisoned");
        guard.len()
    }
}
