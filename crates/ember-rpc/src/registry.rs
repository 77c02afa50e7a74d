//! Namespace handler registration and the introspection document built
//! from it. Grounded in the teacher's axum-handler-module-per-namespace
//! convention (`neomind-api::handlers::{auth_users, events, ...}`,
//! one file per concern) generalized from axum `Router` routes keyed by
//! HTTP path to a method-name registry keyed by `"Namespace.Method"`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as Json;

use crate::context::RequestContext;
use crate::reply::RpcOutcome;

/// One method's declared param/return shape (JSON-type-level, per
/// spec.md §4.H — not a full JSON Schema validator, just enough
/// structure for the introspection document and for
/// `MethodSpec::validate_params`'s required-key check).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSpec {
    pub name: &'static str,
    pub required_params: &'static [&'static str],
    pub params_schema: Json,
    pub returns_schema: Json,
}

impl MethodSpec {
    /// Every name in `required_params` must be present in `params` as a
    /// non-null field. This is the "validate params against the
    /// registered schema" step of the request lifecycle — intentionally
    /// shallow (presence, not type-checking), since each handler still
    /// validates its own argument types when it deserializes them.
    pub fn validate_params(&self, params: &Json) -> Result<(), String> {
        let obj = params.as_object();
        for required in self.required_params {
            let present = obj.and_then(|o| o.get(*required)).is_some_and(|v| !v.is_null());
            if !present {
                return Err(format!("missing parameter: {required}"));
            }
        }
        Ok(())
    }
}

/// One JSON-RPC namespace (`JSONRPC`, `Rules`, `Configuration`, ...).
#[async_trait]
pub trait RpcHandler: Send + Sync {
    fn namespace(&self) -> &'static str;
    fn methods(&self) -> &[MethodSpec];
    async fn call(&self, op: &str, params: Json, ctx: &RequestContext) -> RpcOutcome;
}

#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionDocument {
    pub namespaces: HashMap<String, Vec<MethodSpec>>,
}

/// Every registered namespace handler, keyed by name, plus the
/// introspection document built once at registration time.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn RpcHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn RpcHandler>) {
        self.handlers.insert(handler.namespace(), handler);
    }

    pub fn get(&self, namespace: &str) -> Option<&Arc<dyn RpcHandler>> {
        self.handlers.get(namespace)
    }

    pub fn method(&self, namespace: &str, op: &str) -> Option<MethodSpec> {
        self.handlers.get(namespace)?.methods().iter().find(|m| m.name == op).cloned()
    }

    pub fn introspect(&self) -> IntrospectionDocument {
        let namespaces = self
            .handlers
            .iter()
            .map(|(name, handler)| (name.to_string(), handler.methods().to_vec()))
            .collect();
        IntrospectionDocument { namespaces }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl RpcHandler for EchoHandler {
        fn namespace(&self) -> &'static str {
            "Echo"
        }

        fn methods(&self) -> &[MethodSpec] {
            &[MethodSpec {
                name: "Say",
                required_params: &["text"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            }]
        }

        async fn call(&self, _op: &str, params: Json, _ctx: &RequestContext) -> RpcOutcome {
            RpcOutcome::ok(params)
        }
    }

    #[test]
    fn registered_namespace_is_reachable_and_introspectable() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));

        assert!(registry.get("Echo").is_some());
        let method = registry.method("Echo", "Say").unwrap();
        assert_eq!(method.required_params, &["text"]);

        let doc = registry.introspect();
        assert!(doc.namespaces.contains_key("Echo"));
    }

    #[test]
    fn validate_params_rejects_missing_required_field() {
        let spec = MethodSpec { name: "Say", required_params: &["text"], params_schema: Json::Null, returns_schema: Json::Null };
        assert!(spec.validate_params(&serde_json::json!({})).is_err());
        assert!(spec.validate_params(&serde_json::json!({"text": "hi"})).is_ok());
    }
}
