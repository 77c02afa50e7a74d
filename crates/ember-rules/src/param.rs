//! `ParamDescriptor`: a reference to a [`ember_types::ParamType`] plus an
//! operator and a target value, used inside event and state filters. The
//! declaration itself lives in `ember_types` (see that crate's `param`
//! module for why).

use ember_types::{ComparisonOperator, ParamTypeId, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub param_type_id: ParamTypeId,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl ParamDescriptor {
    pub fn new(param_type_id: ParamTypeId, operator: ComparisonOperator, value: Value) -> Self {
        Self { param_type_id, operator, value }
    }

    /// Does `actual` (the value an event/state instance carries for this
    /// param) satisfy this descriptor?
    pub fn matches(&self, actual: &Value) -> bool {
        actual.compare(self.operator, &self.value).unwrap_or(false)
    }
}
