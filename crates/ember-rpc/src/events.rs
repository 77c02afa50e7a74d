//! The internal signal bus the rule engine and auth core publish onto, and
//! the RPC core subscribes to in order to build notifications. A thin
//! `tokio::sync::broadcast` wrapper, same shape as the teacher's
//! `EventBus` — renamed to `CoreEvent` since these are ember's own
//! notification-shaped signals, not a generic pub/sub payload.

use ember_types::{PairingTransactionId, RuleId};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum CoreEvent {
    RuleAdded { rule_id: RuleId },
    RuleRemoved { rule_id: RuleId },
    RuleConfigurationChanged { rule_id: RuleId },
    RuleActiveChanged { rule_id: RuleId, active: bool },
    PushButtonAuthFinished { transaction_id: PairingTransactionId, requester_client_id: String, success: bool, token: Option<String> },
    CloudConnectedChanged { connected: bool },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. A channel with no subscribers simply drops it —
    /// this is normal during startup before the core's fanout task has
    /// subscribed.
    pub fn publish(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }
}
