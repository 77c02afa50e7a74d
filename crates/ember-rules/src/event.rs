//! Events, event filters, and the action-parameter binding model.

use std::collections::HashMap;

use ember_types::{ActionTypeId, DeviceId, EventTypeId, ParamTypeId, Value};
use serde::{Deserialize, Serialize};

use crate::param::ParamDescriptor;

/// What kind of source an [`EventDescriptor`] filters on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventSource {
    DeviceBound { device_id: DeviceId, event_type_id: EventTypeId },
    InterfaceBound { interface: String, event_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub source: EventSource,
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
}

impl EventDescriptor {
    /// Matches `event` iff the source identifies the same typeId/deviceId
    /// (or interface/eventName) and every declared param filter matches
    /// the event's actual param value.
    pub fn matches(&self, event: &DeviceEvent) -> bool {
        let source_matches = match (&self.source, &event.source) {
            (
                EventSource::DeviceBound { device_id, event_type_id },
                EventSource::DeviceBound { device_id: ed, event_type_id: et },
            ) => device_id == ed && event_type_id == et,
            (
                EventSource::InterfaceBound { interface, event_name },
                EventSource::InterfaceBound { interface: ei, event_name: en },
            ) => interface == ei && event_name == en,
            _ => false,
        };
        if !source_matches {
            return false;
        }
        self.params.iter().all(|filter| {
            event
                .params
                .get(&filter.param_type_id)
                .map(|actual| filter.matches(actual))
                .unwrap_or(false)
        })
    }
}

/// An event as delivered into `RuleEngine::evaluate_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub source: EventSource,
    pub params: HashMap<ParamTypeId, Value>,
}

impl DeviceEvent {
    /// The state type a device-bound event carries, if this event is
    /// device-bound and should trigger a `StateEvaluator` re-evaluation.
    /// Interface-bound events never affect state evaluation directly.
    pub fn device_id(&self) -> Option<DeviceId> {
        match &self.source {
            EventSource::DeviceBound { device_id, .. } => Some(*device_id),
            EventSource::InterfaceBound { .. } => None,
        }
    }

    pub fn event_type_id(&self) -> Option<EventTypeId> {
        match &self.source {
            EventSource::DeviceBound { event_type_id, .. } => Some(*event_type_id),
            EventSource::InterfaceBound { .. } => None,
        }
    }
}

/// One parameter of a [`RuleAction`]: either a literal target value, or a
/// binding to a parameter of the event that fired the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RuleActionParam {
    Value { param_type_id: ParamTypeId, value: Value },
    EventBinding { param_type_id: ParamTypeId, event_type_id: EventTypeId, event_param_type_id: ParamTypeId },
}

impl RuleActionParam {
    pub fn param_type_id(&self) -> ParamTypeId {
        match self {
            RuleActionParam::Value { param_type_id, .. } => *param_type_id,
            RuleActionParam::EventBinding { param_type_id, .. } => *param_type_id,
        }
    }

    pub fn is_binding(&self) -> bool {
        matches!(self, RuleActionParam::EventBinding { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    pub action_type_id: ActionTypeId,
    pub device_id: DeviceId,
    #[serde(default)]
    pub params: Vec<RuleActionParam>,
}

impl RuleAction {
    /// Event-based iff any param uses the fire-time binding form.
    pub fn is_event_based(&self) -> bool {
        self.params.iter().any(RuleActionParam::is_binding)
    }

    /// Resolve every event-bound param against the triggering event,
    /// producing the concrete `(ParamTypeId, Value)` pairs to dispatch.
    /// A binding whose source event param is absent from `event` is
    /// dropped (the engine does not invent a value).
    pub fn resolve(&self, event: Option<&DeviceEvent>) -> HashMap<ParamTypeId, Value> {
        let mut resolved = HashMap::new();
        for param in &self.params {
            match param {
                RuleActionParam::Value { param_type_id, value } => {
                    resolved.insert(*param_type_id, value.clone());
                }
                RuleActionParam::EventBinding { param_type_id, event_param_type_id, .. } => {
                    if let Some(event) = event {
                        if let Some(v) = event.params.get(event_param_type_id) {
                            resolved.insert(*param_type_id, v.clone());
                        }
                    }
                }
            }
        }
        resolved
    }
}
