//! Parameter type declarations shared by device catalogs and rule filters.
//!
//! A [`ParamType`] is the vocabulary: "this action/event/state carries a
//! parameter named `x`, typed `int`, between 0 and 100". Rule filters
//! reference a `ParamType` by id and pair it with an operator and a target
//! value (`ember_rules::param::ParamDescriptor`) — they don't duplicate the
//! declaration.

use serde::{Deserialize, Serialize};

use crate::id::ParamTypeId;
use crate::value::{Value, ValueType};

/// UI hint for how a client should render an input for this parameter.
/// Purely advisory — never affects validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputType {
    TextLine,
    TextArea,
    Password,
    Search,
    Mail,
    Ipv4Address,
    Ipv6Address,
    Url,
    Color,
}

/// The inclusive numeric range a `ParamType`'s values must fall within, if
/// bounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub min: Value,
    pub max: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamType {
    pub id: ParamTypeId,
    pub name: String,
    pub display_name: String,
    /// Display order among sibling params of the same event/action/state
    /// type.
    pub index: u32,
    pub value_type: ValueType,
    pub default_value: Option<Value>,
    pub limits: Option<Limits>,
    pub allowed_values: Option<Vec<Value>>,
    pub input_type: Option<InputType>,
    pub unit: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl ParamType {
    /// `v` is valid for this ParamType iff it type-matches and, when limits
    /// or an enumeration are declared, lies within them.
    pub fn validate(&self, v: &Value) -> bool {
        if v.value_type() != self.value_type {
            return false;
        }
        if let Some(limits) = &self.limits {
            let above_min = v
                .compare(crate::value::ComparisonOperator::Ge, &limits.min)
                .unwrap_or(false);
            let below_max = v
                .compare(crate::value::ComparisonOperator::Le, &limits.max)
                .unwrap_or(false);
            if !(above_min && below_max) {
                return false;
            }
        }
        if let Some(allowed) = &self.allowed_values {
            if !allowed.iter().any(|a| a == v) {
                return false;
            }
        }
        true
    }
}
