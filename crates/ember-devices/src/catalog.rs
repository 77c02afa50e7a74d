//! Type/state/event/action catalogs: the declarative part of a device's
//! capabilities, independent of any particular device *instance*.
//!
//! A `DeviceType` is named by the set of state/event/action types it
//! declares; a `Device` instance then carries a `DeviceTypeId` plus its
//! own id and name. There is no separate vendor/plugin indirection here —
//! spec.md's identifier set has no `DeviceTypeId`... but devices still need
//! to advertise what state/event/action types they support, so `DeviceType`
//! is keyed by an opaque `String` (its declared name) rather than a typed
//! identifier, since it is catalog metadata, not an addressable entity any
//! rule or RPC method ever names directly.

use std::collections::HashMap;

use ember_types::{ActionTypeId, EventTypeId, ParamType, StateTypeId, ValueType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTypeDescriptor {
    pub id: StateTypeId,
    pub name: String,
    pub display_name: String,
    pub value_type: ValueType,
    pub default_value: Option<ember_types::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTypeDescriptor {
    pub id: EventTypeId,
    pub name: String,
    pub display_name: String,
    pub params: Vec<ParamType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTypeDescriptor {
    pub id: ActionTypeId,
    pub name: String,
    pub display_name: String,
    pub params: Vec<ParamType>,
}

/// A device type: the catalog of state/event/action types every device
/// instance of this type supports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceType {
    pub name: String,
    pub state_types: Vec<StateTypeDescriptor>,
    pub event_types: Vec<EventTypeDescriptor>,
    pub action_types: Vec<ActionTypeDescriptor>,
}

impl DeviceType {
    pub fn state_type(&self, id: StateTypeId) -> Option<&StateTypeDescriptor> {
        self.state_types.iter().find(|s| s.id == id)
    }

    pub fn action_type(&self, id: ActionTypeId) -> Option<&ActionTypeDescriptor> {
        self.action_types.iter().find(|a| a.id == id)
    }

    pub fn event_type(&self, id: EventTypeId) -> Option<&EventTypeDescriptor> {
        self.event_types.iter().find(|e| e.id == id)
    }
}

/// Keeps the catalog of registered device types, indexed by name.
#[derive(Debug, Clone, Default)]
pub struct DeviceTypeCatalog {
    types: HashMap<String, DeviceType>,
}

impl DeviceTypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, device_type: DeviceType) {
        self.types.insert(device_type.name.clone(), device_type);
    }

    pub fn get(&self, name: &str) -> Option<&DeviceType> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_looks_up_by_name() {
        let mut catalog = DeviceTypeCatalog::new();
        catalog.register(DeviceType { name: "switch".into(), ..Default::default() });
        assert!(catalog.get("switch").is_some());
        assert!(catalog.get("dimmer").is_none());
    }

    #[test]
    fn device_type_finds_its_own_types_by_id() {
        let state_id = StateTypeId::new();
        let dt = DeviceType {
            name: "switch".into(),
            state_types: vec![StateTypeDescriptor {
                id: state_id,
                name: "power".into(),
                display_name: "Power".into(),
                value_type: ValueType::Bool,
                default_value: Some(ember_types::Value::Bool(false)),
            }],
            ..Default::default()
        };
        assert!(dt.state_type(state_id).is_some());
        assert!(dt.state_type(StateTypeId::new()).is_none());
    }
}
