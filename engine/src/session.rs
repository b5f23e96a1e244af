use crate::errors::MafiaError;
use crate::events::{EventBus, GameEvent, HandlerFailure};
use crate::player::{ChannelId, Identity, Player, UserId};
use crate::registry::SessionRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Running,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Waiting => "waiting",
            Phase::Running => "running",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How a session ended: `Completed` when stopped from `Running`,
/// `Aborted` when cancelled before it ever started.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillOutcome {
    Eliminated,
    /// The target was already dead. Duplicate kill delivery is accepted
    /// as a no-op; the transport layer is at-least-once.
    AlreadyEliminated,
}

/// Closed vote round: the tally snapshot plus any handler failures from
/// the `VoteFinish` publish.
#[derive(Debug)]
pub struct VoteOutcome {
    pub tally: HashMap<UserId, u32>,
    pub failures: Vec<HandlerFailure>,
}

impl VoteOutcome {
    /// Target with the highest received weight; ties break toward the
    /// lowest user id so the result is deterministic.
    pub fn leader(&self) -> Option<UserId> {
        self.tally
            .iter()
            .max_by_key(|(user, weight)| (**weight, std::cmp::Reverse(**user)))
            .map(|(user, _)| *user)
    }
}

/// Capability contract for one game instance. `GameSession` is the only
/// implementation today; future game types plug in here.
pub trait Game: Send + Sync {
    fn id(&self) -> GameId;
    fn name(&self) -> &str;
    fn is_waiting(&self) -> bool;
    fn is_running(&self) -> bool;
    fn join_player(&self, identity: Identity) -> Result<Player, MafiaError>;
    fn leave_player(&self, user: UserId) -> Result<Player, MafiaError>;
    fn start(&self, registry: &SessionRegistry) -> Result<Vec<HandlerFailure>, MafiaError>;
    fn stop(&self, registry: &SessionRegistry) -> Result<StopOutcome, MafiaError>;
}

pub(crate) struct SessionState {
    pub(crate) phase: Phase,
    pub(crate) players: HashMap<UserId, Player>,
    pub(crate) tally: HashMap<UserId, u32>,
}

/// One running or waiting game instance.
///
/// The player mapping and tally are owned exclusively by the session
/// and mutated only through its operations; phase flips that move the
/// session between registry partitions happen under the registry's
/// lock so no interleaved task observes a half-moved session.
pub struct GameSession {
    id: GameId,
    name: String,
    vote_channel: ChannelId,
    bus: EventBus,
    state: Mutex<SessionState>,
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl GameSession {
    pub(crate) fn new(id: GameId, name: String, vote_channel: ChannelId, bus: EventBus) -> Self {
        Self {
            id,
            name,
            vote_channel,
            bus,
            state: Mutex::new(SessionState {
                phase: Phase::Waiting,
                players: HashMap::new(),
                tally: HashMap::new(),
            }),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state poisoned")
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn vote_channel(&self) -> ChannelId {
        self.vote_channel
    }

    pub fn player(&self, user: UserId) -> Option<Player> {
        self.state().players.get(&user).cloned()
    }

    pub fn players(&self) -> Vec<Player> {
        self.state().players.values().cloned().collect()
    }

    pub fn player_count(&self) -> usize {
        self.state().players.len()
    }

    pub fn tally(&self) -> HashMap<UserId, u32> {
        self.state().tally.clone()
    }

    /// Raises the vote weight of a joined player.
    pub fn set_player_weight(&self, user: UserId, weight: u32) -> Result<(), MafiaError> {
        let mut state = self.state();
        let player = state.players.get_mut(&user).ok_or(MafiaError::PlayerNotFound {
            session: self.id,
            user,
        })?;
        player.set_weight(weight);
        Ok(())
    }

    /// Counts a vote toward `target`, weighted by the voter. Votes are
    /// not deduplicated; each cast accumulates. Returns `(weight, new
    /// total for target)`.
    pub(crate) fn record_vote(&self, voter: UserId, target: UserId) -> Result<(u32, u32), MafiaError> {
        let mut state = self.state();
        let weight = state
            .players
            .get(&voter)
            .ok_or(MafiaError::PlayerNotFound {
                session: self.id,
                user: voter,
            })?
            .weight();
        if !state.players.contains_key(&target) {
            return Err(MafiaError::PlayerNotFound {
                session: self.id,
                user: target,
            });
        }
        let total = state.tally.entry(target).or_insert(0);
        *total += weight;
        Ok((weight, *total))
    }

    /// Closes the current vote round and publishes one `VoteFinish`.
    ///
    /// Assumes nothing about how many votes arrived; a timer-driven
    /// caller may invoke this to end a round early.
    pub fn finish_vote(&self) -> Result<VoteOutcome, MafiaError> {
        let tally = {
            let mut state = self.state();
            if state.phase != Phase::Running {
                return Err(MafiaError::InvalidTransition {
                    from: state.phase,
                    to: Phase::Running,
                });
            }
            std::mem::take(&mut state.tally)
        };
        let failures = self
            .bus
            .publish(&GameEvent::VoteFinish { session_id: self.id });
        Ok(VoteOutcome { tally, failures })
    }

    /// Marks `target` eliminated and publishes one `Kill`. Killing an
    /// already-eliminated target is a no-op with no event.
    pub fn apply_kill(
        &self,
        by: UserId,
        target: UserId,
    ) -> Result<(KillOutcome, Vec<HandlerFailure>), MafiaError> {
        {
            let mut state = self.state();
            if state.phase != Phase::Running {
                return Err(MafiaError::InvalidTransition {
                    from: state.phase,
                    to: Phase::Running,
                });
            }
            if !state.players.contains_key(&by) {
                return Err(MafiaError::PlayerNotFound {
                    session: self.id,
                    user: by,
                });
            }
            let victim = state.players.get_mut(&target).ok_or(MafiaError::PlayerNotFound {
                session: self.id,
                user: target,
            })?;
            if !victim.is_alive() {
                return Ok((KillOutcome::AlreadyEliminated, Vec::new()));
            }
            victim.eliminate();
        }
        let failures = self.bus.publish(&GameEvent::Kill {
            session_id: self.id,
            by,
            target,
        });
        Ok((KillOutcome::Eliminated, failures))
    }
}

impl Game for GameSession {
    fn id(&self) -> GameId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_waiting(&self) -> bool {
        self.phase() == Phase::Waiting
    }

    fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// Snapshots the chat identity into a `Player`. Re-joining with the
    /// same id replaces the earlier snapshot (last join wins).
    fn join_player(&self, identity: Identity) -> Result<Player, MafiaError> {
        let mut state = self.state();
        if state.phase != Phase::Waiting {
            return Err(MafiaError::InvalidTransition {
                from: state.phase,
                to: Phase::Waiting,
            });
        }
        let player = Player::from_identity(self.id, identity);
        state.players.insert(player.id(), player.clone());
        Ok(player)
    }

    /// Removes and returns the player. Leaving mid-game is allowed.
    fn leave_player(&self, user: UserId) -> Result<Player, MafiaError> {
        let mut state = self.state();
        if state.phase == Phase::Stopped {
            return Err(MafiaError::InvalidTransition {
                from: Phase::Stopped,
                to: Phase::Running,
            });
        }
        state.players.remove(&user).ok_or(MafiaError::PlayerNotFound {
            session: self.id,
            user,
        })
    }

    /// Transitions `Waiting` → `Running` (atomically with the registry
    /// partition move) and publishes exactly one `VoteStart` carrying
    /// the session's vote channel. Handler failures are returned, not
    /// raised; the transition stands even if a notification failed.
    fn start(&self, registry: &SessionRegistry) -> Result<Vec<HandlerFailure>, MafiaError> {
        registry.register_running(self)?;
        Ok(self.bus.publish(&GameEvent::VoteStart {
            session_id: self.id,
            channel: self.vote_channel,
        }))
    }

    /// Transitions to `Stopped`. Permitted from `Waiting` (cancelling
    /// an unstarted session) or `Running`; safe with no round active.
    fn stop(&self, registry: &SessionRegistry) -> Result<StopOutcome, MafiaError> {
        registry.retire_session(self)
    }
}
