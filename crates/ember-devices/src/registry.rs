//! The `DeviceRegistry` trait: the only way the rule engine and the RPC
//! core ever touch a device. Every concrete device protocol (MQTT, UDP,
//! D-Bus, Bluetooth, 433 MHz, UPnP, Avahi, the cloud relay) is external to
//! this crate — what ships here is the trait boundary plus one in-memory
//! reference implementation for tests and for a standalone `emberd` that
//! has no plugins loaded yet.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ember_types::{ActionTypeId, DeviceId, EmberError, ParamTypeId, Result, StateTypeId, Value};
use serde::{Deserialize, Serialize};

use crate::catalog::DeviceTypeCatalog;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub device_type: String,
}

/// Error surfaced by `execute_action` — kept distinct from `EmberError` so
/// device plugins don't need a dependency on `ember-types`'s full taxonomy;
/// callers fold it into `EmberError::NotFound`/`BackendError` at the
/// rule-engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("action type not supported by this device: {0}")]
    UnsupportedAction(ActionTypeId),

    #[error("invalid action parameter: {0}")]
    InvalidParameter(String),

    #[error("device backend error: {0}")]
    Backend(String),
}

impl From<DeviceError> for EmberError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::DeviceNotFound(id) => EmberError::NotFound(id.to_string()),
            DeviceError::UnsupportedAction(id) => EmberError::NotFound(id.to_string()),
            DeviceError::InvalidParameter(msg) => EmberError::InvalidParameter(msg),
            DeviceError::Backend(msg) => EmberError::BackendError(msg),
        }
    }
}

/// The abstract collaborator the rule engine and the `Devices` RPC
/// namespace depend on.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// True iff `device` is currently registered.
    fn contains_device(&self, device: DeviceId) -> bool;

    /// The device's current value for `state_type`, or `None` if the
    /// device is absent or doesn't support that state type. A
    /// `StateEvaluator` leaf treats `None` as non-matching, never as an
    /// error.
    fn state_value(&self, device: DeviceId, state_type: StateTypeId) -> Option<Value>;

    /// Dispatch an action. The rule engine never awaits this inline during
    /// evaluation — it spawns the call and logs the result.
    async fn execute_action(
        &self,
        device: DeviceId,
        action_type: ActionTypeId,
        params: HashMap<ParamTypeId, Value>,
    ) -> std::result::Result<(), DeviceError>;

    fn devices(&self) -> Vec<Device>;

    /// The device's catalog entry, or `None` if the device or its declared
    /// `device_type` isn't registered in the catalog. `Rule::validate` uses
    /// this to check that every action/event/state type id a rule
    /// references actually exists on the device it's bound to.
    fn device_type(&self, device: DeviceId) -> Option<crate::catalog::DeviceType>;
}

/// In-memory `DeviceRegistry`: holds registered devices, their current
/// state values, and a catalog of supported types. Good enough for tests
/// and for running `emberd` with no real device plugins attached.
pub struct InMemoryDeviceRegistry {
    devices: DashMap<DeviceId, Device>,
    states: DashMap<(DeviceId, StateTypeId), Value>,
    catalog: Arc<DeviceTypeCatalog>,
}

impl InMemoryDeviceRegistry {
    pub fn new(catalog: Arc<DeviceTypeCatalog>) -> Self {
        Self { devices: DashMap::new(), states: DashMap::new(), catalog }
    }

    pub fn add_device(&self, device: Device) {
        self.devices.insert(device.id, device);
    }

    pub fn remove_device(&self, id: DeviceId) -> bool {
        self.states.retain(|(device_id, _), _| *device_id != id);
        self.devices.remove(&id).is_some()
    }

    pub fn set_state(&self, device: DeviceId, state_type: StateTypeId, value: Value) {
        self.states.insert((device, state_type), value);
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    fn contains_device(&self, device: DeviceId) -> bool {
        self.devices.contains_key(&device)
    }

    fn state_value(&self, device: DeviceId, state_type: StateTypeId) -> Option<Value> {
        self.states.get(&(device, state_type)).map(|v| v.clone())
    }

    async fn execute_action(
        &self,
        device: DeviceId,
        action_type: ActionTypeId,
        _params: HashMap<ParamTypeId, Value>,
    ) -> std::result::Result<(), DeviceError> {
        if !self.devices.contains_key(&device) {
            return Err(DeviceError::DeviceNotFound(device));
        }
        if let Some(device_type) = self.device_type(device) {
            if device_type.action_type(action_type).is_none() {
                return Err(DeviceError::UnsupportedAction(action_type));
            }
        }
        tracing::info!(%device, %action_type, "executed action on in-memory device");
        Ok(())
    }

    fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(|e| e.value().clone()).collect()
    }

    fn device_type(&self, device: DeviceId) -> Option<crate::catalog::DeviceType> {
        let device = self.devices.get(&device)?;
        self.catalog.get(&device.device_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ActionTypeDescriptor, DeviceType};

    fn registry_with_switch() -> (InMemoryDeviceRegistry, DeviceId, ActionTypeId) {
        let action_id = ActionTypeId::new();
        let mut catalog = DeviceTypeCatalog::new();
        catalog.register(DeviceType {
            name: "switch".into(),
            action_types: vec![ActionTypeDescriptor {
                id: action_id,
                name: "turnOn".into(),
                display_name: "Turn on".into(),
                params: vec![],
            }],
            ..Default::default()
        });
        let registry = InMemoryDeviceRegistry::new(Arc::new(catalog));
        let device_id = DeviceId::new();
        registry.add_device(Device { id: device_id, name: "Kitchen switch".into(), device_type: "switch".into() });
        (registry, device_id, action_id)
    }

    #[tokio::test]
    async fn execute_action_on_unknown_device_fails() {
        let (registry, _device_id, action_id) = registry_with_switch();
        let result = registry.execute_action(DeviceId::new(), action_id, HashMap::new()).await;
        assert!(matches!(result, Err(DeviceError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn execute_unsupported_action_fails() {
        let (registry, device_id, _action_id) = registry_with_switch();
        let result = registry.execute_action(device_id, ActionTypeId::new(), HashMap::new()).await;
        assert!(matches!(result, Err(DeviceError::UnsupportedAction(_))));
    }

    #[tokio::test]
    async fn execute_known_action_on_known_device_succeeds() {
        let (registry, device_id, action_id) = registry_with_switch();
        registry.execute_action(device_id, action_id, HashMap::new()).await.unwrap();
    }

    #[test]
    fn state_value_reads_back_what_was_set() {
        let (registry, device_id, _) = registry_with_switch();
        let state_type = StateTypeId::new();
        assert_eq!(registry.state_value(device_id, state_type), None);
        registry.set_state(device_id, state_type, Value::Bool(true));
        assert_eq!(registry.state_value(device_id, state_type), Some(Value::Bool(true)));
    }

    #[test]
    fn remove_device_drops_its_state_too() {
        let (registry, device_id, _) = registry_with_switch();
        let state_type = StateTypeId::new();
        registry.set_state(device_id, state_type, Value::Bool(true));
        assert!(registry.remove_device(device_id));
        assert!(!registry.contains_device(device_id));
        assert_eq!(registry.state_value(device_id, state_type), None);
    }
}
