//! The `Rule` entity and its consistency invariants.

use chrono::{DateTime, Utc};
use ember_devices::DeviceRegistry;
use ember_types::{EmberError, RuleId};
use serde::{Deserialize, Serialize};

use crate::event::EventDescriptor;
use crate::event::RuleAction;
use crate::state::StateEvaluator;
use crate::time::TimeDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub enabled: bool,
    /// Whether this rule may be triggered directly via `ExecuteActions`/
    /// `ExecuteExitActions`, independent of `enabled`.
    pub executable: bool,
    #[serde(default)]
    pub time_descriptor: TimeDescriptor,
    pub state_evaluator: Option<StateEvaluator>,
    #[serde(default)]
    pub event_descriptors: Vec<EventDescriptor>,
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub exit_actions: Vec<RuleAction>,

    // Derived runtime fields. Persisted so a reload doesn't need to
    // re-evaluate every rule before it can answer `GetRuleDetails`, but
    // always recomputed on the next evaluation tick/event.
    #[serde(default)]
    pub states_active: bool,
    #[serde(default = "default_true")]
    pub time_active: bool,
    #[serde(default)]
    pub active: bool,

    /// Observability-only fields: never read by the evaluation algorithm,
    /// never checked by an invariant.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub trigger_count: u64,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,

    /// Fields present in a stored rule group this version doesn't know
    /// about — preserved verbatim across load/save so an older or newer
    /// `emberd` sharing the same store never silently drops data.
    #[serde(flatten)]
    pub unknown_fields: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    pub fn is_event_triggered(&self) -> bool {
        !self.event_descriptors.is_empty()
    }

    /// Full consistency check per spec.md §3's invariants. Does not check
    /// uniqueness of `id` against an existing store — that's the store's
    /// job, since only it knows what else is persisted.
    pub fn validate(&self, registry: &dyn DeviceRegistry) -> Result<(), EmberError> {
        if self.name.trim().is_empty() {
            return Err(EmberError::InvalidRuleFormat("name must not be empty".into()));
        }
        if self.actions.is_empty() {
            return Err(EmberError::InvalidRuleFormat("actions must not be empty".into()));
        }

        let has_time_events = !self.time_descriptor.time_event_items.is_empty();
        if (self.is_event_triggered() || has_time_events) && !self.exit_actions.is_empty() {
            return Err(EmberError::InvalidRuleFormat(
                "exitActions are unreachable on an event- or timeEvent-triggered rule".into(),
            ));
        }

        if self.exit_actions.iter().any(RuleAction::is_event_based) {
            return Err(EmberError::ContainsEventBasedAction);
        }

        for action in self.actions.iter().chain(self.exit_actions.iter()) {
            if !registry.contains_device(action.device_id) {
                return Err(EmberError::NotFound(format!("device {}", action.device_id)));
            }
        }

        // A device whose declared type isn't in the catalog (no plugin
        // registered it yet) can't be checked further here — that's the
        // dispatch-time `DeviceError::UnsupportedAction` path's job.
        for action in self.actions.iter().chain(self.exit_actions.iter()) {
            if let Some(device_type) = registry.device_type(action.device_id) {
                if device_type.action_type(action.action_type_id).is_none() {
                    return Err(EmberError::TypesNotMatching(format!(
                        "actionTypeId {} not found on device {}",
                        action.action_type_id, action.device_id
                    )));
                }
            }
        }

        for descriptor in &self.event_descriptors {
            if let crate::event::EventSource::DeviceBound { device_id, event_type_id } = &descriptor.source {
                if let Some(device_type) = registry.device_type(*device_id) {
                    if device_type.event_type(*event_type_id).is_none() {
                        return Err(EmberError::TypesNotMatching(format!(
                            "eventTypeId {event_type_id} not found on device {device_id}"
                        )));
                    }
                }
            }
        }

        if let Some(evaluator) = &self.state_evaluator {
            validate_state_evaluator_types(evaluator, registry)?;
        }

        for action in &self.actions {
            for param in &action.params {
                if let crate::event::RuleActionParam::EventBinding { event_type_id, .. } = param {
                    let bound_to_declared_event = self.event_descriptors.iter().any(|d| {
                        matches!(
                            &d.source,
                            crate::event::EventSource::DeviceBound { event_type_id: et, .. }
                                if et == event_type_id
                        )
                    });
                    if !bound_to_declared_event {
                        return Err(EmberError::TypesNotMatching(format!(
                            "action references eventTypeId {event_type_id} not present in eventDescriptors"
                        )));
                    }
                }
            }
        }

        if let Some(evaluator) = &self.state_evaluator {
            validate_state_evaluator(evaluator)?;
        }

        self.time_descriptor
            .validate()
            .map_err(|e| EmberError::InvalidTimeDescriptor(e.to_string()))?;

        Ok(())
    }

    /// `statesActive ∧ timeActive ∧ enabled` — used to decide activation
    /// transitions for state/time-only rules.
    pub fn should_be_active(&self) -> bool {
        self.enabled && self.states_active && self.time_active
    }
}

fn validate_state_evaluator(evaluator: &StateEvaluator) -> Result<(), EmberError> {
    match evaluator {
        StateEvaluator::Leaf(_) => Ok(()),
        StateEvaluator::Node { children, .. } => {
            if children.is_empty() {
                return Err(EmberError::InvalidStateEvaluatorValue(
                    "operator node must have at least one child".into(),
                ));
            }
            children.iter().try_for_each(validate_state_evaluator)
        }
    }
}

/// Every `stateTypeId` a `StateEvaluator` leaf references must exist on its
/// device's catalog entry, mirroring the action/event checks above. Skipped
/// for leaves whose device has no registered catalog type.
fn validate_state_evaluator_types(evaluator: &StateEvaluator, registry: &dyn DeviceRegistry) -> Result<(), EmberError> {
    match evaluator {
        StateEvaluator::Leaf(desc) => {
            if let Some(device_type) = registry.device_type(desc.device_id) {
                if device_type.state_type(desc.state_type_id).is_none() {
                    return Err(EmberError::TypesNotMatching(format!(
                        "stateTypeId {} not found on device {}",
                        desc.state_type_id, desc.device_id
                    )));
                }
            }
            Ok(())
        }
        StateEvaluator::Node { children, .. } => children.iter().try_for_each(|c| validate_state_evaluator_types(c, registry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_devices::{Device, DeviceTypeCatalog, InMemoryDeviceRegistry};
    use ember_types::{ActionTypeId, DeviceId};
    use std::sync::Arc;

    fn registry_with_device(device: DeviceId) -> InMemoryDeviceRegistry {
        let registry = InMemoryDeviceRegistry::new(Arc::new(DeviceTypeCatalog::new()));
        registry.add_device(Device { id: device, name: "d".into(), device_type: "generic".into() });
        registry
    }

    fn base_rule(device: DeviceId) -> Rule {
        Rule {
            id: RuleId::new(),
            name: "test rule".into(),
            enabled: true,
            executable: true,
            time_descriptor: TimeDescriptor::default(),
            state_evaluator: None,
            event_descriptors: vec![],
            actions: vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: device, params: vec![] }],
            exit_actions: vec![],
            states_active: false,
            time_active: true,
            active: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            trigger_count: 0,
            last_triggered: None,
            unknown_fields: Default::default(),
        }
    }

    #[test]
    fn empty_actions_is_invalid() {
        let device = DeviceId::new();
        let registry = registry_with_device(device);
        let mut rule = base_rule(device);
        rule.actions.clear();
        assert!(matches!(rule.validate(&registry), Err(EmberError::InvalidRuleFormat(_))));
    }

    #[test]
    fn exit_actions_on_event_triggered_rule_is_invalid() {
        let device = DeviceId::new();
        let registry = registry_with_device(device);
        let mut rule = base_rule(device);
        rule.event_descriptors.push(EventDescriptor {
            source: crate::event::EventSource::DeviceBound {
                device_id: device,
                event_type_id: ember_types::EventTypeId::new(),
            },
            params: vec![],
        });
        rule.exit_actions.push(RuleAction { action_type_id: ActionTypeId::new(), device_id: device, params: vec![] });
        assert!(matches!(rule.validate(&registry), Err(EmberError::InvalidRuleFormat(_))));
    }

    #[test]
    fn action_referencing_unknown_device_is_invalid() {
        let device = DeviceId::new();
        let registry = registry_with_device(device);
        let mut rule = base_rule(device);
        rule.actions.push(RuleAction { action_type_id: ActionTypeId::new(), device_id: DeviceId::new(), params: vec![] });
        assert!(matches!(rule.validate(&registry), Err(EmberError::NotFound(_))));
    }

    #[test]
    fn valid_rule_passes() {
        let device = DeviceId::new();
        let registry = registry_with_device(device);
        let rule = base_rule(device);
        assert!(rule.validate(&registry).is_ok());
    }

    fn registry_with_switch_device(device: DeviceId, action_id: ActionTypeId) -> InMemoryDeviceRegistry {
        use ember_devices::{ActionTypeDescriptor, DeviceType};
        let mut catalog = DeviceTypeCatalog::new();
        catalog.register(DeviceType {
            name: "switch".into(),
            action_types: vec![ActionTypeDescriptor { id: action_id, name: "turnOn".into(), display_name: "Turn on".into(), params: vec![] }],
            ..Default::default()
        });
        let registry = InMemoryDeviceRegistry::new(Arc::new(catalog));
        registry.add_device(Device { id: device, name: "d".into(), device_type: "switch".into() });
        registry
    }

    #[test]
    fn action_with_unsupported_type_on_a_cataloged_device_is_invalid() {
        let device = DeviceId::new();
        let action_id = ActionTypeId::new();
        let registry = registry_with_switch_device(device, action_id);
        let mut rule = base_rule(device);
        // base_rule's own action uses a fresh, uncataloged ActionTypeId.
        rule.actions = vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: device, params: vec![] }];
        assert!(matches!(rule.validate(&registry), Err(EmberError::TypesNotMatching(_))));
    }

    #[test]
    fn action_with_cataloged_type_passes() {
        let device = DeviceId::new();
        let action_id = ActionTypeId::new();
        let registry = registry_with_switch_device(device, action_id);
        let mut rule = base_rule(device);
        rule.actions = vec![RuleAction { action_type_id: action_id, device_id: device, params: vec![] }];
        assert!(rule.validate(&registry).is_ok());
    }

    #[test]
    fn action_on_a_device_with_no_catalog_entry_is_not_checked() {
        // registry_with_device registers "generic", which has no catalog
        // entry at all — validate() can't tell whether the action type is
        // supported, so it doesn't reject it here.
        let device = DeviceId::new();
        let registry = registry_with_device(device);
        let rule = base_rule(device);
        assert!(rule.validate(&registry).is_ok());
    }

    #[test]
    fn should_be_active_requires_enabled_states_and_time() {
        let device = DeviceId::new();
        let mut rule = base_rule(device);
        rule.states_active = true;
        rule.time_active = true;
        assert!(rule.should_be_active());
        rule.enabled = false;
        assert!(!rule.should_be_active());
    }
}
