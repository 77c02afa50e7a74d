//! The recursive boolean tree over device-state comparisons that decides
//! whether a rule's state condition currently holds.

use ember_devices::DeviceRegistry;
use ember_types::{ComparisonOperator, DeviceId, StateTypeId, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDescriptor {
    pub state_type_id: StateTypeId,
    pub device_id: DeviceId,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl StateDescriptor {
    /// A leaf matches iff the named device is present, supports the state
    /// type, and its current value compares true under `operator`.
    /// Absence of the device or the state value is *not* an error — it's
    /// simply a non-match.
    fn matches(&self, registry: &dyn DeviceRegistry) -> bool {
        if !registry.contains_device(self.device_id) {
            return false;
        }
        match registry.state_value(self.device_id, self.state_type_id) {
            Some(current) => current.compare(self.operator, &self.value).unwrap_or(false),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
}

/// A recursive tree: either a single comparison against one device's
/// state, or a boolean combinator over one or more children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StateEvaluator {
    Leaf(StateDescriptor),
    Node { operator: BoolOp, children: Vec<StateEvaluator> },
}

impl StateEvaluator {
    pub fn evaluate(&self, registry: &dyn DeviceRegistry) -> bool {
        match self {
            StateEvaluator::Leaf(desc) => desc.matches(registry),
            StateEvaluator::Node { operator, children } => match operator {
                BoolOp::And => children.iter().all(|c| c.evaluate(registry)),
                BoolOp::Or => children.iter().any(|c| c.evaluate(registry)),
            },
        }
    }

    /// True iff any leaf in this tree references `device`.
    pub fn contains_device(&self, device: DeviceId) -> bool {
        match self {
            StateEvaluator::Leaf(desc) => desc.device_id == device,
            StateEvaluator::Node { children, .. } => children.iter().any(|c| c.contains_device(device)),
        }
    }

    /// Prune every leaf referencing `device`. Operator nodes that become
    /// empty are themselves dropped (represented here as `None`); a leaf
    /// referencing the device is dropped outright.
    pub fn remove_device(self, device: DeviceId) -> Option<StateEvaluator> {
        match self {
            StateEvaluator::Leaf(desc) => {
                if desc.device_id == device {
                    None
                } else {
                    Some(StateEvaluator::Leaf(desc))
                }
            }
            StateEvaluator::Node { operator, children } => {
                let remaining: Vec<StateEvaluator> =
                    children.into_iter().filter_map(|c| c.remove_device(device)).collect();
                if remaining.is_empty() {
                    None
                } else {
                    Some(StateEvaluator::Node { operator, children: remaining })
                }
            }
        }
    }
}
