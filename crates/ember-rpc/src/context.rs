//! Per-request context threaded through every handler call, and the
//! shared per-client connection table both the dispatch core and the
//! `SetNotificationStatus` handler need to read/write.

use dashmap::DashMap;

pub type ClientId = String;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client_id: ClientId,
    pub token: Option<String>,
    /// Set by the auth gate once `token` has been verified against the
    /// `UserStore`. `None` for exempt methods called without a token.
    pub authenticated_username: Option<String>,
}

struct ClientEntry {
    auth_required: bool,
    enabled: bool,
}

/// Connected clients and their per-transport `authRequired` flag and
/// notification-enabled state. Shared (via `Arc`) between [`crate::core::RpcCore`]
/// and the `JSONRPC` namespace handler, since `SetNotificationStatus`
/// mutates it from inside a handler call rather than through the core
/// directly.
#[derive(Default)]
pub struct ClientTable {
    entries: DashMap<ClientId, ClientEntry>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client_id: ClientId, auth_required: bool) {
        self.entries.insert(client_id, ClientEntry { auth_required, enabled: !auth_required });
    }

    pub fn remove(&self, client_id: &str) {
        self.entries.remove(client_id);
    }

    /// `false` (no gate) if the client is unknown — a request arriving
    /// for a client the core never saw `client_connected` for is treated
    /// the same as an open transport rather than panicking.
    pub fn auth_required(&self, client_id: &str) -> bool {
        self.entries.get(client_id).map(|e| e.auth_required).unwrap_or(false)
    }

    pub fn set_enabled(&self, client_id: &str, enabled: bool) {
        if let Some(mut entry) = self.entries.get_mut(client_id) {
            entry.enabled = enabled;
        }
    }

    pub fn enabled_clients(&self) -> Vec<ClientId> {
        self.entries.iter().filter(|e| e.value().enabled).map(|e| e.key().clone()).collect()
    }
}
