//! The `Configuration` namespace: server name/time zone/language plus
//! per-transport endpoint CRUD, all persisted through a single
//! `ember_storage::SettingsFile`-backed TOML file — there is exactly one
//! config store, not a separate writer per concern.

use ember_storage::SettingsFile;
use ember_types::EmberError;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value as Json};

use crate::config::{ServerConfig, TransportConfig, TransportKind};
use crate::context::RequestContext;
use crate::params::parse_params;
use crate::registry::{MethodSpec, RpcHandler};
use crate::reply::RpcOutcome;

use async_trait::async_trait;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetServerNameParams {
    server_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetTimeZoneParams {
    time_zone: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetLanguageParams {
    language: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTransportParams {
    kind: TransportKind,
    address: String,
    port: u16,
    tls: bool,
    auth_required: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditTransportParams {
    transport_id: uuid::Uuid,
    address: String,
    port: u16,
    tls: bool,
    auth_required: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveTransportParams {
    transport_id: uuid::Uuid,
}

pub struct ConfigurationHandler {
    settings: SettingsFile,
    state: Mutex<ServerConfig>,
}

impl ConfigurationHandler {
    /// Load the persisted config, or fall back to defaults on first run.
    pub fn load(settings: SettingsFile) -> Result<Self, EmberError> {
        let config = settings.load::<ServerConfig>().map_err(|e| EmberError::BackendError(e.to_string()))?.unwrap_or_default();
        Ok(Self { settings, state: Mutex::new(config) })
    }

    fn persist(&self, config: &ServerConfig) -> Result<(), EmberError> {
        self.settings.save(config).map_err(|e| EmberError::BackendError(e.to_string()))
    }

    fn config_json(config: &ServerConfig) -> Json {
        json!(config)
    }
}

fn valid_port(port: u16) -> bool {
    port != 0
}

#[async_trait]
impl RpcHandler for ConfigurationHandler {
    fn namespace(&self) -> &'static str {
        "Configuration"
    }

    fn methods(&self) -> &[MethodSpec] {
        &[
            MethodSpec { name: "GetConfiguration", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec {
                name: "SetServerName",
                required_params: &["serverName"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec { name: "SetTimeZone", required_params: &["timeZone"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "SetLanguage", required_params: &["language"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "GetTimeZones", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec {
                name: "AddTransportConfiguration",
                required_params: &["kind", "address", "port", "tls", "authRequired"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec {
                name: "EditTransportConfiguration",
                required_params: &["transportId", "address", "port", "tls", "authRequired"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec {
                name: "RemoveTransportConfiguration",
                required_params: &["transportId"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
        ]
    }

    async fn call(&self, op: &str, params: Json, _ctx: &RequestContext) -> RpcOutcome {
        match op {
            "GetConfiguration" => RpcOutcome::ok(Self::config_json(&self.state.lock())),

            "GetTimeZones" => {
                let zones: Vec<&str> = chrono_tz::TZ_VARIANTS.iter().map(|tz| tz.name()).collect();
                RpcOutcome::ok(json!({ "timeZones": zones }))
            }

            "SetServerName" => match parse_params::<SetServerNameParams>(params) {
                Ok(p) => {
                    if p.server_name.trim().is_empty() {
                        return RpcOutcome::err(EmberError::InvalidParameter("serverName must not be empty".into()));
                    }
                    let mut config = self.state.lock();
                    config.server_name = p.server_name;
                    match self.persist(&config) {
                        Ok(()) => RpcOutcome::ok(json!({})),
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            "SetTimeZone" => match parse_params::<SetTimeZoneParams>(params) {
                Ok(p) => {
                    if p.time_zone.parse::<chrono_tz::Tz>().is_err() {
                        return RpcOutcome::err(EmberError::InvalidParameter(format!("unknown time zone: {}", p.time_zone)));
                    }
                    let mut config = self.state.lock();
                    config.time_zone = p.time_zone;
                    match self.persist(&config) {
                        Ok(()) => RpcOutcome::ok(json!({})),
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            "SetLanguage" => match parse_params::<SetLanguageParams>(params) {
                Ok(p) => {
                    let mut config = self.state.lock();
                    config.language = p.language;
                    match self.persist(&config) {
                        Ok(()) => RpcOutcome::ok(json!({})),
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            "AddTransportConfiguration" => match parse_params::<AddTransportParams>(params) {
                Ok(p) => {
                    if !valid_port(p.port) {
                        return RpcOutcome::err(EmberError::InvalidParameter("port must be in 1..=65535".into()));
                    }
                    let transport = TransportConfig {
                        id: uuid::Uuid::new_v4(),
                        kind: p.kind,
                        address: p.address,
                        port: p.port,
                        tls: p.tls,
                        auth_required: p.auth_required,
                    };
                    let id = transport.id;
                    let mut config = self.state.lock();
                    config.transports.push(transport);
                    match self.persist(&config) {
                        Ok(()) => RpcOutcome::ok(json!({ "transportId": id })),
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            "EditTransportConfiguration" => match parse_params::<EditTransportParams>(params) {
                Ok(p) => {
                    if !valid_port(p.port) {
                        return RpcOutcome::err(EmberError::InvalidParameter("port must be in 1..=65535".into()));
                    }
                    let mut config = self.state.lock();
                    let Some(transport) = config.transports.iter_mut().find(|t| t.id == p.transport_id) else {
                        return RpcOutcome::err(EmberError::NotFound(p.transport_id.to_string()));
                    };
                    transport.address = p.address;
                    transport.port = p.port;
                    transport.tls = p.tls;
                    transport.auth_required = p.auth_required;
                    match self.persist(&config) {
                        Ok(()) => RpcOutcome::ok(json!({})),
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            "RemoveTransportConfiguration" => match parse_params::<RemoveTransportParams>(params) {
                Ok(p) => {
                    let mut config = self.state.lock();
                    let before = config.transports.len();
                    config.transports.retain(|t| t.id != p.transport_id);
                    if config.transports.len() == before {
                        return RpcOutcome::err(EmberError::NotFound(p.transport_id.to_string()));
                    }
                    match self.persist(&config) {
                        Ok(()) => RpcOutcome::ok(json!({})),
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            _ => RpcOutcome::err(EmberError::NotFound(op.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext { client_id: "c".into(), token: None, authenticated_username: Some("alice@example.com".into()) }
    }

    fn handler() -> (ConfigurationHandler, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsFile::new(dir.path().join("ember.toml"));
        (ConfigurationHandler::load(settings).unwrap(), dir)
    }

    #[tokio::test]
    async fn get_configuration_defaults_to_utc() {
        let (handler, _dir) = handler();
        let RpcOutcome::Ready(Ok(payload)) = handler.call("GetConfiguration", Json::Null, &ctx()).await else { panic!() };
        assert_eq!(payload["timeZone"], json!("UTC"));
    }

    #[tokio::test]
    async fn set_time_zone_rejects_an_unknown_zone() {
        let (handler, _dir) = handler();
        let params = json!({ "timeZone": "Not/AZone" });
        assert!(matches!(handler.call("SetTimeZone", params, &ctx()).await, RpcOutcome::Ready(Err(EmberError::InvalidParameter(_)))));
    }

    #[tokio::test]
    async fn set_time_zone_accepts_a_known_zone_and_persists_it() {
        let (handler, _dir) = handler();
        let params = json!({ "timeZone": "Europe/Berlin" });
        assert!(matches!(handler.call("SetTimeZone", params, &ctx()).await, RpcOutcome::Ready(Ok(_))));
        let RpcOutcome::Ready(Ok(payload)) = handler.call("GetConfiguration", Json::Null, &ctx()).await else { panic!() };
        assert_eq!(payload["timeZone"], json!("Europe/Berlin"));
    }

    #[tokio::test]
    async fn add_then_remove_transport_configuration() {
        let (handler, _dir) = handler();
        let add = json!({ "kind": "tcp", "address": "0.0.0.0", "port": 7777, "tls": false, "authRequired": true });
        let RpcOutcome::Ready(Ok(payload)) = handler.call("AddTransportConfiguration", add, &ctx()).await else { panic!() };
        let transport_id = payload["transportId"].clone();

        let remove = json!({ "transportId": transport_id });
        assert!(matches!(handler.call("RemoveTransportConfiguration", remove, &ctx()).await, RpcOutcome::Ready(Ok(_))));
    }

    #[tokio::test]
    async fn add_transport_configuration_rejects_port_zero() {
        let (handler, _dir) = handler();
        let add = json!({ "kind": "tcp", "address": "0.0.0.0", "port": 0, "tls": false, "authRequired": true });
        assert!(matches!(
            handler.call("AddTransportConfiguration", add, &ctx()).await,
            RpcOutcome::Ready(Err(EmberError::InvalidParameter(_)))
        ));
    }
}
