//! Wires the independently-testable `ember-*` crates into one running
//! process: opens storage, builds the rule engine and user store, registers
//! every JSON-RPC namespace handler, and hands the result to whichever
//! transports `main` decides to open.

pub mod config;
pub mod logging;
pub mod startup;

use std::sync::Arc;

use ember_auth::{PushButtonAuth, UserStore};
use ember_devices::{DeviceRegistry, DeviceTypeCatalog, InMemoryDeviceRegistry};
use ember_rpc::config::ServerConfig;
use ember_rpc::handlers::{ConfigurationHandler, IntrospectionCell, JsonRpcHandler, RulesHandler};
use ember_rpc::{ClientTable, EventBus, HandlerRegistry, Multiplexer, RpcCore, ServerInfo};
use ember_rules::{RuleEngine, RuleStore};
use ember_storage::{KeyValueStore, RedbStore, SettingsFile};
use once_cell::sync::OnceCell;
use uuid::Uuid;

use crate::config::StartupConfig;

/// Every long-lived collaborator `main` needs a handle to, once bootstrap
/// has finished: the dispatch core to feed transports, the multiplexer
/// those transports register connected clients into, and the rule engine
/// for the background event/time drivers.
pub struct Core {
    pub rpc: Arc<RpcCore>,
    pub multiplexer: Arc<Multiplexer>,
    pub rule_engine: Arc<RuleEngine>,
    pub users: Arc<UserStore>,
    pub introspection: IntrospectionCell,
    events: EventBus,
    outbound_rx: Option<tokio::sync::mpsc::UnboundedReceiver<ember_rpc::Outbound>>,
}

/// Open storage, build every collaborator, register the three JSON-RPC
/// namespaces, and fill in the introspection document — in that order,
/// since `Introspect` can't be answered until every other namespace has
/// registered its methods (see `ember_rpc::handlers::jsonrpc`'s
/// `IntrospectionCell` doc comment).
pub fn bootstrap(startup: &StartupConfig) -> anyhow::Result<Core> {
    std::fs::create_dir_all(&startup.data_dir)?;

    let backend: Arc<dyn KeyValueStore> = Arc::new(RedbStore::open(startup.db_path().display().to_string())?);
    let users = Arc::new(UserStore::new(backend.clone()));
    let push_button = Arc::new(PushButtonAuth::new());

    let device_registry: Arc<dyn DeviceRegistry> = Arc::new(InMemoryDeviceRegistry::new(Arc::new(DeviceTypeCatalog::new())));
    let rule_store = RuleStore::new(backend.clone());

    let settings = SettingsFile::new(startup.settings_path());
    let server_config = settings.load::<ServerConfig>()?.unwrap_or_default();
    let zone: chrono_tz::Tz = server_config.time_zone.parse().unwrap_or(chrono_tz::UTC);

    let rule_engine = Arc::new(RuleEngine::load(rule_store, device_registry, zone)?);
    let events = EventBus::new();
    let clients = Arc::new(ClientTable::new());
    let introspection: IntrospectionCell = Arc::new(OnceCell::new());
    let server_info =
        ServerInfo { name: server_config.server_name.clone(), uuid: Uuid::new_v4(), version: env!("CARGO_PKG_VERSION").into(), locale: server_config.language.clone() };

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(JsonRpcHandler::new(
        users.clone(),
        push_button.clone(),
        events.clone(),
        clients.clone(),
        server_info.clone(),
        introspection.clone(),
    )));
    registry.register(Arc::new(RulesHandler::new(rule_engine.clone(), events.clone())));
    registry.register(Arc::new(ConfigurationHandler::load(SettingsFile::new(startup.settings_path()))?));

    let doc = registry.introspect();
    let _ = introspection.set(doc);

    let (rpc, outbound_rx) = RpcCore::new(registry, users.clone(), push_button, events.clone(), clients, server_info);
    let multiplexer = Multiplexer::new();

    Ok(Core { rpc, multiplexer, rule_engine, users, introspection, events, outbound_rx: Some(outbound_rx) })
}

impl Core {
    /// Start the outbound-message pump. Must be called exactly once, after
    /// bootstrap and before any transport is opened, or notifications have
    /// nowhere to go.
    pub fn spawn_outbound_pump(&mut self) {
        if let Some(rx) = self.outbound_rx.take() {
            self.multiplexer.clone().spawn_outbound_pump(rx);
        }
    }

    /// Start the device-event consumer that drives `RuleEngine::evaluate_event`.
    /// Returns the sender a device-plugin transport feeds inbound events into,
    /// and the task handle so the caller can abort it on shutdown.
    pub fn spawn_event_driver(&self) -> (tokio::sync::mpsc::UnboundedSender<ember_rules::DeviceEvent>, tokio::task::JoinHandle<()>) {
        ember_rpc::spawn_event_driver(self.rule_engine.clone(), self.events.clone())
    }

    /// Start the clock ticker that drives `RuleEngine::evaluate_time` on a
    /// fixed interval, for calendar- and time-event-triggered rules.
    pub fn spawn_time_driver(&self, tick: std::time::Duration) -> tokio::task::JoinHandle<()> {
        ember_rpc::spawn_time_driver(self.rule_engine.clone(), self.events.clone(), tick)
    }
}
