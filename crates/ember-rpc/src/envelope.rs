//! The wire format: one JSON object per message, exactly four shapes in
//! each direction. `id` travels as a 32-bit signed integer; `token` is an
//! opaque ASCII string no longer than 256 characters.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// An inbound request, as received from a transport. `method` is still
/// the raw `"Namespace.Method"` string — splitting it happens in the
/// core, not here, so a malformed method string surfaces as a normal
/// dispatch error rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub id: i32,
    pub method: String,
    #[serde(default)]
    pub params: Json,
    #[serde(default)]
    pub token: Option<String>,
}

/// Outbound replies and notifications. `#[serde(untagged)]` lets each
/// variant declare its own field shape instead of sharing one struct with
/// a bunch of `Option`s — matching the wire format's four distinct shapes
/// instead of inventing a fifth, internal-only one.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RpcMessage {
    Success { id: i32, status: &'static str, params: Json },
    Error { id: i32, status: &'static str, error: String },
    Unauthorized { id: i32, status: &'static str, error: String },
    Notification { id: i64, notification: String, params: Json },
    /// The unsolicited welcome sent on every new connection, and the
    /// identical payload returned by an explicit `Hello` call. Its own
    /// shape — not a request reply, not a notification.
    Hello {
        #[serde(rename = "serverName")]
        server_name: String,
        #[serde(rename = "serverUuid")]
        server_uuid: String,
        version: String,
        #[serde(rename = "protocolVersion")]
        protocol_version: u32,
        locale: String,
        #[serde(rename = "initialSetupRequired")]
        initial_setup_required: bool,
        #[serde(rename = "authenticationRequired")]
        authentication_required: bool,
        #[serde(rename = "pushButtonAuthAvailable")]
        push_button_auth_available: bool,
    },
}

impl RpcMessage {
    pub fn success(id: i32, params: Json) -> Self {
        RpcMessage::Success { id, status: "success", params }
    }

    pub fn error(id: i32, error: impl Into<String>) -> Self {
        RpcMessage::Error { id, status: "error", error: error.into() }
    }

    pub fn unauthorized(id: i32, error: impl Into<String>) -> Self {
        RpcMessage::Unauthorized { id, status: "unauthorized", error: error.into() }
    }

    pub fn notification(id: i64, notification: impl Into<String>, params: Json) -> Self {
        RpcMessage::Notification { id, notification: notification.into(), params }
    }
}

/// Split `"Namespace.Method"` into its two parts. Anything without
/// exactly one `.` is malformed.
pub fn split_method(method: &str) -> Option<(&str, &str)> {
    let mut parts = method.splitn(2, '.');
    let namespace = parts.next()?;
    let op = parts.next()?;
    if namespace.is_empty() || op.is_empty() || op.contains('.') {
        return None;
    }
    Some((namespace, op))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_well_formed_method() {
        assert_eq!(split_method("Rules.AddRule"), Some(("Rules", "AddRule")));
    }

    #[test]
    fn rejects_method_without_namespace() {
        assert_eq!(split_method("AddRule"), None);
    }

    #[test]
    fn rejects_method_with_extra_dots() {
        assert_eq!(split_method("Rules.Add.Rule"), None);
    }

    #[test]
    fn request_deserializes_with_defaulted_params_and_token() {
        let req: RpcRequest = serde_json::from_str(r#"{"id":1,"method":"JSONRPC.Hello"}"#).unwrap();
        assert_eq!(req.id, 1);
        assert!(req.token.is_none());
        assert!(req.params.is_null());
    }
}
