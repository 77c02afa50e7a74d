//! The `JSONRPC` namespace: connection handshake, introspection, session
//! bookkeeping, and the user/token/push-button surface of spec.md §4.G —
//! grounded in `neomind-api::handlers::auth_users`'s handler-per-concern
//! shape, generalized from axum extractors to the `RpcHandler` trait.

use std::sync::Arc;

use async_trait::async_trait;
use ember_auth::{PushButtonAuth, UserStore};
use ember_types::EmberError;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::{json, Value as Json};

use crate::context::{ClientTable, RequestContext};
use crate::core::{ServerInfo, PROTOCOL_VERSION};
use crate::events::{CoreEvent, EventBus};
use crate::params::parse_params;
use crate::registry::{IntrospectionDocument, MethodSpec, RpcHandler};
use crate::reply::RpcOutcome;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetNotificationStatusParams {
    enabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserParams {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateParams {
    username: String,
    password: String,
    device_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestPushButtonAuthParams {
    device_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveTokenParams {
    token_id: String,
}

/// Filled in once by the caller after every namespace has been registered
/// into the `HandlerRegistry` — `Introspect` needs to see the whole
/// registry, including this handler's own methods, which don't exist yet
/// at the point this handler itself is constructed.
pub type IntrospectionCell = Arc<OnceCell<IntrospectionDocument>>;

pub struct JsonRpcHandler {
    users: Arc<UserStore>,
    push_button: Arc<PushButtonAuth>,
    events: EventBus,
    clients: Arc<ClientTable>,
    server_info: ServerInfo,
    introspection: IntrospectionCell,
}

impl JsonRpcHandler {
    pub fn new(
        users: Arc<UserStore>,
        push_button: Arc<PushButtonAuth>,
        events: EventBus,
        clients: Arc<ClientTable>,
        server_info: ServerInfo,
        introspection: IntrospectionCell,
    ) -> Self {
        Self { users, push_button, events, clients, server_info, introspection }
    }

    fn hello_payload(&self) -> Result<Json, EmberError> {
        let initial_setup_required = !self.users.has_any_user()?;
        Ok(json!({
            "serverName": self.server_info.name,
            "serverUuid": self.server_info.uuid.to_string(),
            "version": self.server_info.version,
            "protocolVersion": PROTOCOL_VERSION,
            "locale": self.server_info.locale,
            "initialSetupRequired": initial_setup_required,
            "authenticationRequired": !initial_setup_required,
            "pushButtonAuthAvailable": true,
        }))
    }
}

#[async_trait]
impl RpcHandler for JsonRpcHandler {
    fn namespace(&self) -> &'static str {
        "JSONRPC"
    }

    fn methods(&self) -> &[MethodSpec] {
        &[
            MethodSpec { name: "Hello", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "Introspect", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "Version", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec {
                name: "SetNotificationStatus",
                required_params: &["enabled"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec {
                name: "CreateUser",
                required_params: &["username", "password"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec {
                name: "Authenticate",
                required_params: &["username", "password", "deviceName"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec {
                name: "RequestPushButtonAuth",
                required_params: &["deviceName"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec { name: "Tokens", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec {
                name: "RemoveToken",
                required_params: &["tokenId"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
        ]
    }

    async fn call(&self, op: &str, params: Json, ctx: &RequestContext) -> RpcOutcome {
        match op {
            "Hello" => match self.hello_payload() {
                Ok(payload) => RpcOutcome::ok(payload),
                Err(e) => RpcOutcome::err(e),
            },

            "Introspect" => match self.introspection.get() {
                Some(doc) => RpcOutcome::ok(serde_json::to_value(doc).unwrap_or(Json::Null)),
                None => RpcOutcome::err(EmberError::BackendError("introspection document not yet built".into())),
            },

            "Version" => RpcOutcome::ok(json!({
                "version": self.server_info.version,
                "protocolVersion": PROTOCOL_VERSION,
            })),

            "SetNotificationStatus" => match parse_params::<SetNotificationStatusParams>(params) {
                Ok(p) => {
                    self.clients.set_enabled(&ctx.client_id, p.enabled);
                    RpcOutcome::ok(json!({}))
                }
                Err(e) => RpcOutcome::err(e),
            },

            "CreateUser" => match parse_params::<CreateUserParams>(params) {
                Ok(p) => match self.users.create_user(&p.username, &p.password) {
                    Ok(()) => RpcOutcome::ok(json!({})),
                    Err(e) => RpcOutcome::err(e),
                },
                Err(e) => RpcOutcome::err(e),
            },

            "Authenticate" => match parse_params::<AuthenticateParams>(params) {
                Ok(p) => match self.users.authenticate(&p.username, &p.password, &p.device_name) {
                    Ok((_, token)) => RpcOutcome::ok(json!({ "success": true, "token": token })),
                    Err(e) => RpcOutcome::err(e),
                },
                Err(e) => RpcOutcome::err(e),
            },

            "RequestPushButtonAuth" => match parse_params::<RequestPushButtonAuthParams>(params) {
                Ok(p) => {
                    let (transaction_id, preempted) = self.push_button.request(&p.device_name, &ctx.client_id);
                    if let Some(outcome) = preempted {
                        self.events.publish(CoreEvent::PushButtonAuthFinished {
                            transaction_id: outcome.transaction_id,
                            requester_client_id: outcome.requester_client_id,
                            success: false,
                            token: None,
                        });
                    }
                    RpcOutcome::ok(json!({ "success": true, "transactionId": transaction_id.to_string() }))
                }
                Err(e) => RpcOutcome::err(e),
            },

            "Tokens" => {
                let Some(username) = &ctx.authenticated_username else {
                    return RpcOutcome::err(EmberError::Unauthorized("token required".into()));
                };
                match self.users.list_tokens(username) {
                    Ok(tokens) => {
                        let listed: Vec<Json> = tokens
                            .into_iter()
                            .map(|t| json!({ "tokenId": t.id.to_string(), "deviceName": t.device_name, "createdAt": t.created_at }))
                            .collect();
                        RpcOutcome::ok(json!({ "tokens": listed }))
                    }
                    Err(e) => RpcOutcome::err(e),
                }
            }

            "RemoveToken" => match parse_params::<RemoveTokenParams>(params) {
                Ok(p) => self.remove_token(&p.token_id, ctx),
                Err(e) => RpcOutcome::err(e),
            },

            _ => RpcOutcome::err(EmberError::NotFound(op.to_string())),
        }
    }
}

impl JsonRpcHandler {
    fn remove_token(&self, token_id: &str, ctx: &RequestContext) -> RpcOutcome {
        let Some(username) = &ctx.authenticated_username else {
            return RpcOutcome::err(EmberError::Unauthorized("token required".into()));
        };
        let id = match token_id.parse() {
            Ok(id) => id,
            Err(_) => return RpcOutcome::err(EmberError::InvalidParameter("tokenId is not a valid identifier".into())),
        };
        match self.users.token_owner(id) {
            Ok(Some(owner)) if owner.eq_ignore_ascii_case(username) => match self.users.remove_token(id) {
                Ok(()) => RpcOutcome::ok(json!({})),
                Err(e) => RpcOutcome::err(e),
            },
            Ok(Some(_)) => RpcOutcome::err(EmberError::PermissionDenied),
            Ok(None) => RpcOutcome::err(EmberError::NotFound(token_id.to_string())),
            Err(e) => RpcOutcome::err(e),
        }
    }
}
