//! The JSON-RPC dispatch core: request lifecycle, authentication gate,
//! and notification fanout. Everything else in this crate (handlers,
//! transports) exists to feed or be fed by this one struct.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ember_auth::{PushButtonAuth, UserStore};
use ember_types::{EmberError, Result};
use serde_json::{json, Value as Json};
use tokio::sync::mpsc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::context::{ClientId, ClientTable, RequestContext};
use crate::envelope::{split_method, RpcMessage, RpcRequest};
use crate::events::{CoreEvent, EventBus};
use crate::metrics;
use crate::registry::HandlerRegistry;
use crate::reply::{ReplyOutcome, RpcOutcome};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub uuid: Uuid,
    pub version: String,
    pub locale: String,
}

/// Outbound items the core hands to the transport multiplexer: a target
/// client and the message to deliver to it.
pub type Outbound = (ClientId, RpcMessage);

pub struct RpcCore {
    registry: HandlerRegistry,
    users: Arc<UserStore>,
    push_button: Arc<PushButtonAuth>,
    events: EventBus,
    clients: Arc<ClientTable>,
    notification_counter: AtomicI64,
    server_info: ServerInfo,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
}

impl RpcCore {
    /// `clients` is constructed by the caller *before* the handler
    /// registry, since the `JSONRPC` handler's `SetNotificationStatus`
    /// method needs the same table — see `ember-server`'s wiring.
    pub fn new(
        registry: HandlerRegistry,
        users: Arc<UserStore>,
        push_button: Arc<PushButtonAuth>,
        events: EventBus,
        clients: Arc<ClientTable>,
        server_info: ServerInfo,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let core = Arc::new(Self {
            registry,
            users,
            push_button,
            events,
            clients,
            notification_counter: AtomicI64::new(0),
            server_info,
            outbound_tx,
        });
        core.clone().spawn_notification_fanout();
        (core, outbound_rx)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn push_button(&self) -> &Arc<PushButtonAuth> {
        &self.push_button
    }

    /// Register a newly-connected client and return the unsolicited
    /// welcome message to send it. `auth_required` is the transport's own
    /// flag (spec.md §4.I); a client on a transport that doesn't require
    /// auth starts out fully enabled.
    pub fn client_connected(&self, client_id: ClientId, auth_required: bool) -> Result<RpcMessage> {
        self.clients.insert(client_id.clone(), auth_required);
        info!(client_id = %client_id, auth_required, "client connected");
        self.hello_message()
    }

    /// Remove a client and, if it was the requester of a still-pending
    /// push-button transaction, cancel that transaction (spec.md §4.G).
    pub fn client_disconnected(&self, client_id: &str) {
        self.clients.remove(client_id);
        if self.push_button.pending_requester().as_deref() == Some(client_id) {
            if let Some(outcome) = self.push_button.cancel_pending() {
                self.events.publish(CoreEvent::PushButtonAuthFinished {
                    transaction_id: outcome.transaction_id,
                    requester_client_id: outcome.requester_client_id,
                    success: outcome.success,
                    token: None,
                });
            }
        }
        info!(client_id, "client disconnected");
    }

    fn hello_message(&self) -> Result<RpcMessage> {
        let initial_setup_required = !self.users.has_any_user()?;
        Ok(RpcMessage::Hello {
            server_name: self.server_info.name.clone(),
            server_uuid: self.server_info.uuid.to_string(),
            version: self.server_info.version.clone(),
            protocol_version: PROTOCOL_VERSION,
            locale: self.server_info.locale.clone(),
            initial_setup_required,
            authentication_required: !initial_setup_required,
            push_button_auth_available: true,
        })
    }

    /// Enable or disable notification delivery for a client. Exposed so a
    /// transport layer can flip it directly; the `JSONRPC.
    /// SetNotificationStatus` handler mutates the same shared
    /// [`ClientTable`] rather than calling back into the core.
    pub fn set_notifications_enabled(&self, client_id: &str, enabled: bool) {
        self.clients.set_enabled(client_id, enabled);
    }

    /// Run the full request lifecycle for one inbound message on
    /// `client_id`. Never panics on malformed input — every failure mode
    /// becomes a wire-level error reply instead.
    pub async fn handle_request(&self, client_id: &str, raw: &str) -> RpcMessage {
        let started = Instant::now();

        let request: RpcRequest = match serde_json::from_str(raw) {
            Ok(r) => r,
            Err(e) => {
                warn!(client_id, error = %e, "failed to parse request");
                return RpcMessage::error(-1, "invalid JSON");
            }
        };

        let Some((namespace, op)) = split_method(&request.method) else {
            warn!(client_id, method = %request.method, "malformed method");
            return RpcMessage::error(request.id, "malformed method");
        };

        let span = tracing::info_span!("rpc_request", client_id, namespace, method = op);
        let reply = self.handle_request_inner(client_id, namespace, op, request).instrument(span).await;

        let outcome = match &reply {
            RpcMessage::Success { .. } => "success",
            RpcMessage::Unauthorized { .. } => "unauthorized",
            _ => "error",
        };
        let duration = started.elapsed();
        metrics::record_request(namespace, op, outcome, duration.as_secs_f64());
        info!(client_id, namespace, method = op, outcome, duration_ms = duration.as_secs_f64() * 1000.0, "request handled");

        reply
    }

    async fn handle_request_inner(&self, client_id: &str, namespace: &str, op: &str, request: RpcRequest) -> RpcMessage {
        let authenticated_username = match self.check_auth(client_id, op, request.token.as_deref()) {
            Ok(username) => username,
            Err(e) => return self.error_message(request.id, e),
        };

        let Some(handler) = self.registry.get(namespace) else {
            return self.error_message(request.id, EmberError::NotFound(namespace.to_string()));
        };
        let Some(spec) = self.registry.method(namespace, op) else {
            return self.error_message(request.id, EmberError::NotFound(request.method.clone()));
        };
        if let Err(msg) = spec.validate_params(&request.params) {
            return self.error_message(request.id, EmberError::MissingParameter(msg));
        }

        let ctx = RequestContext { client_id: client_id.to_string(), token: request.token.clone(), authenticated_username };

        match handler.call(op, request.params, &ctx).await {
            RpcOutcome::Ready(Ok(params)) => RpcMessage::success(request.id, params),
            RpcOutcome::Ready(Err(e)) => self.error_message(request.id, e),
            RpcOutcome::Deferred(reply) => match reply.resolve().await {
                ReplyOutcome::Success(v) => RpcMessage::success(request.id, v),
                ReplyOutcome::Business(e) => self.error_message(request.id, e),
                ReplyOutcome::TimedOut => RpcMessage::error(request.id, "Command timed out"),
            },
        }
    }

    fn error_message(&self, id: i32, e: EmberError) -> RpcMessage {
        if e.is_auth_failure() {
            RpcMessage::unauthorized(id, e.variant_name())
        } else {
            RpcMessage::error(id, e.variant_name())
        }
    }

    /// The authentication gate from spec.md §4.H. Returns the
    /// authenticated username, if any, for exempt methods called with a
    /// valid token and `None` for exempt methods called without one.
    fn check_auth(&self, client_id: &str, op: &str, token: Option<&str>) -> Result<Option<String>> {
        let transport_requires_auth = self.clients.auth_required(client_id);
        if !transport_requires_auth {
            return Ok(None);
        }

        let has_users = self.users.has_any_user()?;
        let exempt: &[&str] =
            if has_users { &["Introspect", "Hello", "Authenticate", "RequestPushButtonAuth"] } else { &["Introspect", "Hello", "CreateUser", "RequestPushButtonAuth"] };

        if exempt.contains(&op) {
            return Ok(None);
        }

        let Some(token) = token else {
            let reason = if has_users { "invalid token" } else { "Initial setup required" };
            return Err(EmberError::Unauthorized(reason.to_string()));
        };
        match self.users.verify_token(token)? {
            Some(username) => Ok(Some(username)),
            None => Err(EmberError::Unauthorized("invalid token".to_string())),
        }
    }

    fn spawn_notification_fanout(self: Arc<Self>) {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                self.fanout(event);
            }
        });
    }

    fn fanout(&self, event: CoreEvent) {
        let id = self.notification_counter.fetch_add(1, Ordering::Relaxed);
        let (name, params, only_client): (&str, Json, Option<String>) = match &event {
            CoreEvent::RuleAdded { rule_id } => ("Rules.RuleAdded", json!({ "ruleId": rule_id }), None),
            CoreEvent::RuleRemoved { rule_id } => ("Rules.RuleRemoved", json!({ "ruleId": rule_id }), None),
            CoreEvent::RuleConfigurationChanged { rule_id } => ("Rules.RuleConfigurationChanged", json!({ "ruleId": rule_id }), None),
            CoreEvent::RuleActiveChanged { rule_id, active } => {
                ("Rules.RuleActiveChanged", json!({ "ruleId": rule_id, "active": active }), None)
            }
            CoreEvent::PushButtonAuthFinished { transaction_id, requester_client_id, success, token } => (
                "JSONRPC.PushButtonAuthFinished",
                json!({
                    "transactionId": transaction_id,
                    "status": if *success { "success" } else { "failure" },
                    "token": token,
                }),
                Some(requester_client_id.clone()),
            ),
            CoreEvent::CloudConnectedChanged { connected } => ("JSONRPC.CloudConnectedChanged", json!({ "connected": connected }), None),
        };

        let message = RpcMessage::notification(id, name, params);
        match only_client {
            // PushButtonAuthFinished bypasses the enabled flag (spec.md §4.G) and
            // goes only to the requester, whether or not it's still connected.
            Some(client_id) => self.send_to(&client_id, message),
            None => {
                for client_id in self.clients.enabled_clients() {
                    self.send_to(&client_id, message.clone());
                }
            }
        }
    }

    fn send_to(&self, client_id: &str, message: RpcMessage) {
        let _ = self.outbound_tx.send((client_id.to_string(), message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MethodSpec;
    use crate::registry::RpcHandler;
    use async_trait::async_trait;
    use ember_storage::RedbStore;

    struct EchoHandler;

    #[async_trait]
    impl RpcHandler for EchoHandler {
        fn namespace(&self) -> &'static str {
            "Echo"
        }
        fn methods(&self) -> &[MethodSpec] {
            &[MethodSpec { name: "Say", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null }]
        }
        async fn call(&self, _op: &str, params: Json, _ctx: &RequestContext) -> RpcOutcome {
            RpcOutcome::ok(params)
        }
    }

    fn core_with_echo(auth_required: bool) -> (Arc<RpcCore>, mpsc::UnboundedReceiver<Outbound>) {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(RedbStore::open(":memory:").unwrap());
        let users = Arc::new(UserStore::new(backend));
        let push_button = Arc::new(PushButtonAuth::new());
        let events = EventBus::new();
        let clients = Arc::new(crate::context::ClientTable::new());
        let info = ServerInfo { name: "ember".into(), uuid: Uuid::new_v4(), version: "0.1.0".into(), locale: "en_US".into() };
        let (core, rx) = RpcCore::new(registry, users, push_button, events, clients, info);
        core.client_connected("client-1".into(), auth_required).unwrap();
        (core, rx)
    }

    #[tokio::test]
    async fn non_exempt_method_is_unauthorized_without_a_token_before_any_user_exists() {
        let (core, _rx) = core_with_echo(true);
        let reply = core.handle_request("client-1", r#"{"id":1,"method":"Echo.Say","params":{}}"#).await;
        assert!(matches!(reply, RpcMessage::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn introspect_like_call_is_exempt_even_with_no_token() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        // Reuse the JSONRPC namespace name "Introspect" on our echo handler under a
        // differently-named namespace wouldn't be exempt; exemptions are by bare op
        // name per spec.md, independent of namespace, so this still demonstrates it.
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(RedbStore::open(":memory:").unwrap());
        let users = Arc::new(UserStore::new(backend));
        let push_button = Arc::new(PushButtonAuth::new());
        let events = EventBus::new();
        let clients = Arc::new(crate::context::ClientTable::new());
        let info = ServerInfo { name: "ember".into(), uuid: Uuid::new_v4(), version: "0.1.0".into(), locale: "en_US".into() };
        let (core, _rx) = RpcCore::new(registry, users, push_button, events, clients, info);
        core.client_connected("client-1".into(), true).unwrap();
        let reply = core.handle_request("client-1", r#"{"id":1,"method":"Echo.Introspect","params":{}}"#).await;
        assert!(matches!(reply, RpcMessage::Success { .. }));
    }

    #[tokio::test]
    async fn malformed_method_is_a_plain_error() {
        let (core, _rx) = core_with_echo(true);
        let reply = core.handle_request("client-1", r#"{"id":2,"method":"NoDot","params":{}}"#).await;
        assert!(matches!(reply, RpcMessage::Error { .. }));
    }

    #[tokio::test]
    async fn invalid_json_replies_with_id_negative_one() {
        let (core, _rx) = core_with_echo(true);
        let reply = core.handle_request("client-1", "not json").await;
        match reply {
            RpcMessage::Error { id, .. } => assert_eq!(id, -1),
            _ => panic!("expected error"),
        }
    }

    #[tokio::test]
    async fn transport_without_auth_required_allows_any_call() {
        let (core, _rx) = core_with_echo(false);
        let reply = core.handle_request("client-1", r#"{"id":3,"method":"Echo.Say","params":{}}"#).await;
        assert!(matches!(reply, RpcMessage::Success { .. }));
    }

    #[tokio::test]
    async fn token_gate_scenario_unauthorized_then_authorized_after_create_and_login() {
        use crate::handlers::{JsonRpcHandler, RulesHandler};
        use ember_devices::{DeviceTypeCatalog, InMemoryDeviceRegistry};
        use ember_rules::{RuleEngine, RuleStore};
        use once_cell::sync::OnceCell;

        let mut registry = HandlerRegistry::new();
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(RedbStore::open(":memory:").unwrap());
        let users = Arc::new(UserStore::new(backend.clone()));
        let push_button = Arc::new(PushButtonAuth::new());
        let events = EventBus::new();
        let clients = Arc::new(crate::context::ClientTable::new());
        let info = ServerInfo { name: "ember".into(), uuid: Uuid::new_v4(), version: "0.1.0".into(), locale: "en_US".into() };
        let introspection: crate::handlers::IntrospectionCell = Arc::new(OnceCell::new());

        let device_registry = Arc::new(InMemoryDeviceRegistry::new(Arc::new(DeviceTypeCatalog::new())));
        let engine = Arc::new(RuleEngine::load(RuleStore::new(backend), device_registry, chrono_tz::UTC).unwrap());

        registry.register(Arc::new(JsonRpcHandler::new(
            users.clone(),
            push_button.clone(),
            events.clone(),
            clients.clone(),
            info.clone(),
            introspection.clone(),
        )));
        registry.register(Arc::new(RulesHandler::new(engine, events.clone())));
        let _ = introspection.set(registry.introspect());

        let (core, _rx) = RpcCore::new(registry, users, push_button, events, clients, info);
        core.client_connected("client-1".into(), true).unwrap();

        let unauthorized = core.handle_request("client-1", r#"{"id":1,"method":"Rules.GetRules","params":{}}"#).await;
        assert!(matches!(unauthorized, RpcMessage::Unauthorized { .. }));

        let create = r#"{"id":2,"method":"JSONRPC.CreateUser","params":{"username":"alice@example.com","password":"Abcdef1!"}}"#;
        assert!(matches!(core.handle_request("client-1", create).await, RpcMessage::Success { .. }));

        let auth = r#"{"id":3,"method":"JSONRPC.Authenticate","params":{"username":"alice@example.com","password":"Abcdef1!","deviceName":"phone"}}"#;
        let RpcMessage::Success { params: result, .. } = core.handle_request("client-1", auth).await else {
            panic!("expected successful authentication")
        };
        let token = result["token"].as_str().unwrap().to_string();

        let get_rules = format!(r#"{{"id":4,"method":"Rules.GetRules","params":{{}},"token":"{token}"}}"#);
        let RpcMessage::Success { params: result, .. } = core.handle_request("client-1", &get_rules).await else {
            panic!("expected success once authenticated")
        };
        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn pushbutton_preemption_scenario_delivers_failure_to_loser_and_token_to_winner() {
        use crate::handlers::JsonRpcHandler;
        use once_cell::sync::OnceCell;

        let mut registry = HandlerRegistry::new();
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(RedbStore::open(":memory:").unwrap());
        let users = Arc::new(UserStore::new(backend));
        users.create_user("alice@example.com", "Abcdef1!").unwrap();
        let push_button = Arc::new(PushButtonAuth::new());
        let events = EventBus::new();
        let clients = Arc::new(crate::context::ClientTable::new());
        let info = ServerInfo { name: "ember".into(), uuid: Uuid::new_v4(), version: "0.1.0".into(), locale: "en_US".into() };
        let introspection: crate::handlers::IntrospectionCell = Arc::new(OnceCell::new());
        registry.register(Arc::new(JsonRpcHandler::new(
            users.clone(),
            push_button.clone(),
            events.clone(),
            clients.clone(),
            info.clone(),
            introspection.clone(),
        )));
        let _ = introspection.set(registry.introspect());

        let (core, mut rx) = RpcCore::new(registry, users, push_button.clone(), events, clients, info);
        core.client_connected("client-1".into(), false).unwrap();
        core.client_connected("client-2".into(), false).unwrap();

        let req_a = core.handle_request("client-1", r#"{"id":1,"method":"JSONRPC.RequestPushButtonAuth","params":{"deviceName":"phoneA"}}"#).await;
        let RpcMessage::Success { params: result_a, .. } = req_a else { panic!("expected success") };
        let tx_a = result_a["transactionId"].as_str().unwrap().to_string();

        let req_b = core.handle_request("client-2", r#"{"id":2,"method":"JSONRPC.RequestPushButtonAuth","params":{"deviceName":"phoneB"}}"#).await;
        assert!(matches!(req_b, RpcMessage::Success { .. }));

        let (loser_client, loser_message) = rx.recv().await.unwrap();
        assert_eq!(loser_client, "client-1");
        let RpcMessage::Notification { notification, params, .. } = loser_message else { panic!("expected notification") };
        assert_eq!(notification, "JSONRPC.PushButtonAuthFinished");
        assert_eq!(params["transactionId"], json!(tx_a));
        assert_eq!(params["status"], json!("failure"));

        let outcome = push_button.press(&core.users, "alice@example.com").unwrap();
        core.events.publish(CoreEvent::PushButtonAuthFinished {
            transaction_id: outcome.transaction_id,
            requester_client_id: outcome.requester_client_id,
            success: outcome.success,
            token: outcome.token.as_ref().map(|(_, plaintext)| plaintext.clone()),
        });

        let (winner_client, winner_message) = rx.recv().await.unwrap();
        assert_eq!(winner_client, "client-2");
        let RpcMessage::Notification { notification, params, .. } = winner_message else { panic!("expected notification") };
        assert_eq!(notification, "JSONRPC.PushButtonAuthFinished");
        assert_eq!(params["status"], json!("success"));
        let token = params["token"].as_str().unwrap();
        assert_eq!(core.users.verify_token(token).unwrap(), Some("alice@example.com".to_string()));
    }

    #[tokio::test]
    async fn disconnecting_the_pending_pushbutton_requester_cancels_it() {
        let (core, mut rx) = core_with_echo(false);
        let (_tx, _preempted) = core.push_button().request("panel", "client-1");
        core.client_disconnected("client-1");
        let (client_id, message) = rx.recv().await.unwrap();
        assert_eq!(client_id, "client-1");
        assert!(matches!(message, RpcMessage::Notification { notification, .. } if notification == "JSONRPC.PushButtonAuthFinished"));
    }
}
