//! Collaborator contracts toward the chat platform.
//!
//! The game core never talks to the platform directly; it resolves
//! identities through [`IdentityLookup`] and emits messages through
//! [`ChatTransport`]. Both are implemented by the excluded transport
//! layer (and by in-process fakes in tests).

use crate::player::{ChannelId, Identity, UserId};
use crate::session::GameId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Resolves an opaque chat identity id to a snapshot of its profile.
pub trait IdentityLookup: Send + Sync {
    /// Returns `None` when the identity is unknown to the platform.
    fn lookup(&self, id: UserId) -> Option<Identity>;
}

/// Message payloads the core emits. Rendering them into user-facing
/// text is the transport layer's job.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    VotePrompt { session_id: GameId, voter: UserId },
    VoteClosed { session_id: GameId },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("channel {0} is closed")]
    ChannelClosed(ChannelId),
    #[error("rate limited on channel {0}")]
    RateLimited(ChannelId),
}

/// Delivers a message to a channel. Failures are transient and
/// reportable; they never abort a session transition.
pub trait ChatTransport: Send + Sync {
    fn send(&self, channel: ChannelId, message: OutboundMessage) -> Result<(), TransportError>;
}

pub type OutboundReceiver = mpsc::UnboundedReceiver<(ChannelId, OutboundMessage)>;

/// Transport backed by an in-process queue. Sends only enqueue, so
/// event handlers reacting to a publish never block dispatch; the
/// consumer drains the receiver on its own schedule.
#[derive(Clone)]
pub struct QueuedTransport {
    tx: mpsc::UnboundedSender<(ChannelId, OutboundMessage)>,
}

impl QueuedTransport {
    pub fn new() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChatTransport for QueuedTransport {
    fn send(&self, channel: ChannelId, message: OutboundMessage) -> Result<(), TransportError> {
        self.tx
            .send((channel, message))
            .map_err(|_| TransportError::ChannelClosed(channel))
    }
}
