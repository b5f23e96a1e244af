pub mod commands;
pub mod config;

use latte_mafia::{
    ChatTransport, EventBus, GameId, OutboundReceiver, QueuedTransport, SessionRegistry,
    SubscriptionId, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::BotConfig;

pub use commands::{dispatch, error_reply, Command, CommandError, ErrorReply, Reply};

/// Shared application state: one bus, one registry, one transport,
/// handed to every command invocation.
pub struct BotContext {
    config: BotConfig,
    bus: EventBus,
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn ChatTransport>,
    /// Vote-prompt subscriptions per joined player, so leave/stop can
    /// detach their handlers again.
    subscriptions: Mutex<HashMap<(GameId, UserId), SubscriptionId>>,
}

impl BotContext {
    pub fn new(config: BotConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let bus = EventBus::new();
        let registry = Arc::new(SessionRegistry::new(bus.clone()));
        Self {
            config,
            bus,
            registry,
            transport,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Context wired to an in-process transport; the returned receiver
    /// is the drained side of everything the bot "sends".
    pub fn new_for_tests() -> (Self, OutboundReceiver) {
        let (transport, rx) = QueuedTransport::new();
        (
            Self::new(BotConfig::default(), Arc::new(transport)),
            rx,
        )
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn transport(&self) -> Arc<dyn ChatTransport> {
        Arc::clone(&self.transport)
    }

    pub(crate) fn remember_subscription(
        &self,
        game: GameId,
        user: UserId,
        subscription: SubscriptionId,
    ) {
        let mut guard = self.subscriptions.lock().expect("subscription map poisoned");
        guard.insert((game, user), subscription);
    }

    pub(crate) fn take_subscription(&self, game: GameId, user: UserId) -> Option<SubscriptionId> {
        let mut guard = self.subscriptions.lock().expect("subscription map poisoned");
        guard.remove(&(game, user))
    }
}
