use crate::errors::MafiaError;
use crate::events::{EventBus, GameEvent, HandlerFailure};
use crate::player::{ChannelId, UserId};
use crate::session::{GameId, GameSession, Phase, StopOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Authoritative catalog of all sessions, partitioned by phase.
///
/// An explicit instance owned by the application, never process-wide
/// state; tests construct isolated registries per case. All partition
/// mutation happens inside one registry-wide critical section.
/// Contention is bounded by human-driven session counts, and a coarse
/// lock is cheaper than racing join/leave/start/stop.
///
/// Lock order is always registry before session state.
pub struct SessionRegistry {
    bus: EventBus,
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    all: HashMap<GameId, Arc<GameSession>>,
    waiting: HashMap<GameId, Arc<GameSession>>,
    running: HashMap<GameId, Arc<GameSession>>,
}

impl SessionRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    pub fn event_bus(&self) -> EventBus {
        self.bus.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().expect("registry lock poisoned")
    }

    /// Allocates a fresh id and creates a `Waiting` session in the
    /// `all` and `waiting` partitions.
    pub fn create_session(&self, name: &str, vote_channel: ChannelId) -> Arc<GameSession> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = GameId(inner.next_id);
        let session = Arc::new(GameSession::new(
            id,
            name.to_string(),
            vote_channel,
            self.bus.clone(),
        ));
        let displaced = inner.all.insert(id, Arc::clone(&session));
        assert!(displaced.is_none(), "session id {id} registered twice");
        inner.waiting.insert(id, Arc::clone(&session));
        session
    }

    /// Looks up a session in any phase, including stopped ones retained
    /// for historical lookup.
    pub fn find_session(&self, id: GameId) -> Result<Arc<GameSession>, MafiaError> {
        self.lock()
            .all
            .get(&id)
            .cloned()
            .ok_or(MafiaError::SessionNotFound { id, phase: None })
    }

    pub fn find_waiting(&self, id: GameId) -> Result<Arc<GameSession>, MafiaError> {
        let inner = self.lock();
        Self::find_in(&inner, id, |inner| &inner.waiting)
    }

    pub fn find_running(&self, id: GameId) -> Result<Arc<GameSession>, MafiaError> {
        let inner = self.lock();
        Self::find_in(&inner, id, |inner| &inner.running)
    }

    /// Partition-scoped lookup. The not-found error distinguishes "no
    /// such session" (`phase: None`) from "exists but in another phase"
    /// (`phase: Some(..)`), so callers can word replies accurately.
    fn find_in(
        inner: &RegistryInner,
        id: GameId,
        partition: impl Fn(&RegistryInner) -> &HashMap<GameId, Arc<GameSession>>,
    ) -> Result<Arc<GameSession>, MafiaError> {
        match partition(inner).get(&id) {
            Some(session) => Ok(Arc::clone(session)),
            None => Err(MafiaError::SessionNotFound {
                id,
                phase: inner.all.get(&id).map(|session| session.phase()),
            }),
        }
    }

    /// Moves a session `waiting` → `running` and flips its phase, all
    /// under the registry lock: no window where the session is absent
    /// from both partitions or present in both. Invoked by the
    /// session's own `start`, never by arbitrary callers.
    pub(crate) fn register_running(&self, session: &GameSession) -> Result<(), MafiaError> {
        let mut inner = self.lock();
        let mut state = session.state();
        if state.phase != Phase::Waiting {
            return Err(MafiaError::InvalidTransition {
                from: state.phase,
                to: Phase::Running,
            });
        }
        let entry = inner
            .waiting
            .remove(&session.id())
            .expect("waiting partition out of sync with session phase");
        inner.running.insert(session.id(), entry);
        state.phase = Phase::Running;
        Ok(())
    }

    /// Moves a session out of `waiting`/`running` into `Stopped`,
    /// retaining it in `all`. Invoked by the session's own `stop`.
    pub(crate) fn retire_session(&self, session: &GameSession) -> Result<StopOutcome, MafiaError> {
        let mut inner = self.lock();
        let mut state = session.state();
        let outcome = match state.phase {
            Phase::Waiting => {
                inner
                    .waiting
                    .remove(&session.id())
                    .expect("waiting partition out of sync with session phase");
                StopOutcome::Aborted
            }
            Phase::Running => {
                inner
                    .running
                    .remove(&session.id())
                    .expect("running partition out of sync with session phase");
                StopOutcome::Completed
            }
            Phase::Stopped => {
                return Err(MafiaError::InvalidTransition {
                    from: Phase::Stopped,
                    to: Phase::Stopped,
                })
            }
        };
        state.phase = Phase::Stopped;
        Ok(outcome)
    }

    /// Counts a vote in a running session and publishes a `UserVote`.
    /// Returns the target's new tally total plus handler failures from
    /// the publish.
    pub fn cast_vote(
        &self,
        session_id: GameId,
        voter: UserId,
        target: UserId,
    ) -> Result<(u32, Vec<HandlerFailure>), MafiaError> {
        let session = self.find_running(session_id)?;
        let (weight, total) = session.record_vote(voter, target)?;
        let failures = self.bus.publish(&GameEvent::UserVote {
            session_id,
            voter,
            target,
            weight,
        });
        Ok((total, failures))
    }

    /// Ids of sessions still waiting or running.
    pub fn active_sessions(&self) -> Vec<GameId> {
        let inner = self.lock();
        inner
            .waiting
            .keys()
            .chain(inner.running.keys())
            .copied()
            .collect()
    }

    /// The active session a user has joined, if any.
    pub fn find_player_session(&self, user: UserId) -> Option<GameId> {
        let inner = self.lock();
        inner
            .waiting
            .values()
            .chain(inner.running.values())
            .find(|session| session.player(user).is_some())
            .map(|session| session.id())
    }

    pub fn session_count(&self) -> usize {
        self.lock().all.len()
    }
}
