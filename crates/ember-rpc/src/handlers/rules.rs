//! The `Rules` namespace: a thin `RpcHandler` skin over `ember_rules::
//! RuleEngine`, translating JSON-RPC calls into engine calls and engine
//! outcomes into `Rules.*` notifications on the shared [`EventBus`].

use std::sync::Arc;

use async_trait::async_trait;
use ember_rules::{Rule, RuleEngine};
use ember_types::{EmberError, RuleId};
use serde::Deserialize;
use serde_json::{json, Value as Json};

use crate::context::RequestContext;
use crate::events::{CoreEvent, EventBus};
use crate::params::parse_params;
use crate::registry::{MethodSpec, RpcHandler};
use crate::reply::RpcOutcome;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleIdParams {
    rule_id: RuleId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddRuleParams {
    rule: Rule,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditRuleParams {
    rule: Rule,
}

pub struct RulesHandler {
    engine: Arc<RuleEngine>,
    events: EventBus,
}

impl RulesHandler {
    pub fn new(engine: Arc<RuleEngine>, events: EventBus) -> Self {
        Self { engine, events }
    }
}

#[async_trait]
impl RpcHandler for RulesHandler {
    fn namespace(&self) -> &'static str {
        "Rules"
    }

    fn methods(&self) -> &[MethodSpec] {
        &[
            MethodSpec { name: "GetRules", required_params: &[], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "GetRuleDetails", required_params: &["ruleId"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "AddRule", required_params: &["rule"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "EditRule", required_params: &["rule"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "RemoveRule", required_params: &["ruleId"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "EnableRule", required_params: &["ruleId"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec { name: "DisableRule", required_params: &["ruleId"], params_schema: Json::Null, returns_schema: Json::Null },
            MethodSpec {
                name: "ExecuteActions",
                required_params: &["ruleId"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
            MethodSpec {
                name: "ExecuteExitActions",
                required_params: &["ruleId"],
                params_schema: Json::Null,
                returns_schema: Json::Null,
            },
        ]
    }

    async fn call(&self, op: &str, params: Json, _ctx: &RequestContext) -> RpcOutcome {
        match op {
            "GetRules" => RpcOutcome::ok(json!(self.engine.list_rules())),

            "GetRuleDetails" => match parse_params::<RuleIdParams>(params) {
                Ok(p) => match self.engine.get_rule(p.rule_id) {
                    Some(rule) => RpcOutcome::ok(json!(rule)),
                    None => RpcOutcome::err(EmberError::NotFound(p.rule_id.to_string())),
                },
                Err(e) => RpcOutcome::err(e),
            },

            "AddRule" => match parse_params::<AddRuleParams>(params) {
                Ok(p) => {
                    let rule_id = p.rule.id;
                    match self.engine.add_rule(p.rule, false) {
                        Ok(emit) => {
                            if emit {
                                self.events.publish(CoreEvent::RuleAdded { rule_id });
                            }
                            RpcOutcome::ok(json!({ "ruleId": rule_id }))
                        }
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            "EditRule" => match parse_params::<EditRuleParams>(params) {
                Ok(p) => {
                    let rule_id = p.rule.id;
                    match self.engine.edit_rule(p.rule) {
                        Ok(()) => {
                            self.events.publish(CoreEvent::RuleConfigurationChanged { rule_id });
                            RpcOutcome::ok(json!({}))
                        }
                        Err(e) => RpcOutcome::err(e),
                    }
                }
                Err(e) => RpcOutcome::err(e),
            },

            "RemoveRule" => match parse_params::<RuleIdParams>(params) {
                Ok(p) => match self.engine.remove_rule(p.rule_id, false) {
                    Ok(emit) => {
                        if emit {
                            self.events.publish(CoreEvent::RuleRemoved { rule_id: p.rule_id });
                        }
                        RpcOutcome::ok(json!({}))
                    }
                    Err(e) => RpcOutcome::err(e),
                },
                Err(e) => RpcOutcome::err(e),
            },

            "EnableRule" => self.set_enabled(params, true),
            "DisableRule" => self.set_enabled(params, false),

            "ExecuteActions" => match parse_params::<RuleIdParams>(params) {
                Ok(p) => match self.engine.execute_actions(p.rule_id) {
                    Ok(actions) => RpcOutcome::ok(json!({ "actionsDispatched": actions.len() })),
                    Err(e) => RpcOutcome::err(e),
                },
                Err(e) => RpcOutcome::err(e),
            },

            "ExecuteExitActions" => match parse_params::<RuleIdParams>(params) {
                Ok(p) => match self.engine.execute_exit_actions(p.rule_id) {
                    Ok(actions) => RpcOutcome::ok(json!({ "actionsDispatched": actions.len() })),
                    Err(e) => RpcOutcome::err(e),
                },
                Err(e) => RpcOutcome::err(e),
            },

            _ => RpcOutcome::err(EmberError::NotFound(op.to_string())),
        }
    }
}

impl RulesHandler {
    fn set_enabled(&self, params: Json, enabled: bool) -> RpcOutcome {
        match parse_params::<RuleIdParams>(params) {
            Ok(p) => {
                let result = if enabled { self.engine.enable_rule(p.rule_id) } else { self.engine.disable_rule(p.rule_id) };
                match result {
                    Ok(()) => {
                        self.events.publish(CoreEvent::RuleConfigurationChanged { rule_id: p.rule_id });
                        RpcOutcome::ok(json!({}))
                    }
                    Err(e) => RpcOutcome::err(e),
                }
            }
            Err(e) => RpcOutcome::err(e),
        }
    }
}
