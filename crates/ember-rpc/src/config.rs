//! Server-wide configuration: name, time zone, language, and the list of
//! transport endpoints the `Multiplexer` should open. One flat struct,
//! persisted wholesale through [`ember_storage::SettingsFile`] — there is
//! exactly one persistence substrate for this data, not a separate
//! config-file writer living outside `ember-storage`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportKind {
    Tcp,
    WebSocket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    pub id: Uuid,
    pub kind: TransportKind,
    pub address: String,
    pub port: u16,
    pub tls: bool,
    pub auth_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub server_name: String,
    pub time_zone: String,
    pub language: String,
    #[serde(default)]
    pub transports: Vec<TransportConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { server_name: "ember".into(), time_zone: "UTC".into(), language: "en".into(), transports: Vec::new() }
    }
}
