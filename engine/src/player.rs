use crate::chat::{ChatTransport, OutboundMessage};
use crate::events::{EventBus, EventKind, GameEvent, SubscriptionId};
use crate::registry::SessionRegistry;
use crate::session::GameId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Profile snapshot returned by the chat identity lookup.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub avatar_url: String,
    pub dm_channel: ChannelId,
}

pub const DEFAULT_VOTE_WEIGHT: u32 = 1;

/// A user's participation in exactly one session.
///
/// Name, avatar and DM channel are snapshotted from the chat identity
/// at join time; the record does not refresh if the identity changes
/// mid-game. `session_id` is a plain back-reference, never ownership.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Player {
    id: UserId,
    session_id: GameId,
    name: String,
    avatar_url: String,
    dm_channel: ChannelId,
    weight: u32,
    alive: bool,
}

impl Player {
    pub(crate) fn from_identity(session_id: GameId, identity: Identity) -> Self {
        Self {
            id: identity.id,
            session_id,
            name: identity.name,
            avatar_url: identity.avatar_url,
            dm_channel: identity.dm_channel,
            weight: DEFAULT_VOTE_WEIGHT,
            alive: true,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn session_id(&self) -> GameId {
        self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }

    pub fn dm_channel(&self) -> ChannelId {
        self.dm_channel
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Role-dependent vote weight. A politician counts double.
    pub fn set_weight(&mut self, weight: u32) {
        self.weight = weight;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub(crate) fn eliminate(&mut self) {
        self.alive = false;
    }

    /// Reacts to `VoteStart` for this player's session by sending a
    /// vote solicitation to the event's channel. A session that is not
    /// running at delivery time surfaces as a failure in the publish
    /// result instead of aborting dispatch.
    pub fn subscribe_vote_prompts(
        &self,
        bus: &EventBus,
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn ChatTransport>,
    ) -> SubscriptionId {
        let session_id = self.session_id;
        let voter = self.id;
        bus.subscribe(EventKind::VoteStart, move |event| {
            if let GameEvent::VoteStart {
                session_id: event_session,
                channel,
            } = event
            {
                if *event_session != session_id {
                    return Ok(());
                }
                registry.find_running(session_id)?;
                transport.send(*channel, OutboundMessage::VotePrompt { session_id, voter })?;
            }
            Ok(())
        })
    }
}
