use crate::player::UserId;
use crate::session::{GameId, Phase};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MafiaError {
    /// Lookup found nothing in the targeted partition. `phase` is `None`
    /// when no session with this id exists at all, and `Some` when the
    /// session exists but sits in another phase than the one queried.
    #[error("session {id} not found")]
    SessionNotFound { id: GameId, phase: Option<Phase> },
    /// A phase-gated operation was invoked from a state that does not
    /// permit it. `to` is the phase the operation targets or requires.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },
    #[error("player {user} not found in session {session}")]
    PlayerNotFound { session: GameId, user: UserId },
}
