//! latte-mafia: Mafia game core modules for the Latte bot

pub mod chat;
pub mod errors;
pub mod events;
pub mod logger;
pub mod player;
pub mod registry;
pub mod session;

pub use chat::{
    ChatTransport, IdentityLookup, OutboundMessage, OutboundReceiver, QueuedTransport,
    TransportError,
};
pub use errors::MafiaError;
pub use events::{EventBus, EventKind, GameEvent, HandlerError, HandlerFailure, SubscriptionId};
pub use player::{ChannelId, Identity, Player, UserId};
pub use registry::SessionRegistry;
pub use session::{Game, GameId, GameSession, KillOutcome, Phase, StopOutcome, VoteOutcome};
