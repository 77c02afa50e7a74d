//! Typed values and comparison.
//!
//! A [`Value`] carries its own type tag and compares against another value
//! using a declared [`ComparisonOperator`]. String comparison is
//! case-sensitive; the only implicit widening permitted is Int <-> Double.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The declared type of a [`Value`] or a [`crate::param::ParamType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
    Bytes,
    Uuid,
    Timestamp,
}

/// A tagged value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl Value {
    /// The declared type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Uuid(_) => ValueType::Uuid,
            Value::Timestamp(_) => ValueType::Timestamp,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Compare `self` to `other` using `op`.
    ///
    /// Returns `None` if the two values are not comparable (different
    /// types outside the int/double widening rule).
    pub fn compare(&self, op: ComparisonOperator, other: &Value) -> Option<bool> {
        use std::cmp::Ordering;

        let ordering = match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => {
                if op == ComparisonOperator::Eq {
                    return Some(a == b);
                } else if op == ComparisonOperator::Ne {
                    return Some(a != b);
                } else {
                    return None;
                }
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => {
                if op == ComparisonOperator::Eq {
                    return Some(a == b);
                } else if op == ComparisonOperator::Ne {
                    return Some(a != b);
                } else {
                    return None;
                }
            }
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => {
                if op == ComparisonOperator::Eq {
                    return Some(a == b);
                } else if op == ComparisonOperator::Ne {
                    return Some(a != b);
                } else {
                    return None;
                }
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                match (a, b) {
                    (Some(a), Some(b)) => a.partial_cmp(&b)?,
                    _ => return None,
                }
            }
        };

        Some(match op {
            ComparisonOperator::Eq => ordering == Ordering::Equal,
            ComparisonOperator::Ne => ordering != Ordering::Equal,
            ComparisonOperator::Lt => ordering == Ordering::Less,
            ComparisonOperator::Le => ordering != Ordering::Greater,
            ComparisonOperator::Gt => ordering == Ordering::Greater,
            ComparisonOperator::Ge => ordering != Ordering::Less,
        })
    }
}

/// Comparison operator used by [`crate::param::ParamDescriptor`] and
/// state descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "\u{2260}",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "\u{2264}",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => "\u{2265}",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_double_widening_compares() {
        let a = Value::Int(5);
        let b = Value::Double(5.0);
        assert_eq!(a.compare(ComparisonOperator::Eq, &b), Some(true));
        assert_eq!(a.compare(ComparisonOperator::Lt, &Value::Double(5.5)), Some(true));
    }

    #[test]
    fn string_comparison_is_case_sensitive() {
        let a = Value::String("Abc".into());
        let b = Value::String("abc".into());
        assert_eq!(a.compare(ComparisonOperator::Eq, &b), Some(false));
        assert_eq!(a.compare(ComparisonOperator::Ne, &b), Some(true));
    }

    #[test]
    fn incompatible_types_do_not_compare() {
        let a = Value::Bool(true);
        let b = Value::Int(1);
        assert_eq!(a.compare(ComparisonOperator::Eq, &b), None);
    }

    #[test]
    fn bool_only_supports_eq_ne() {
        let a = Value::Bool(true);
        let b = Value::Bool(false);
        assert_eq!(a.compare(ComparisonOperator::Lt, &b), None);
        assert_eq!(a.compare(ComparisonOperator::Ne, &b), Some(true));
    }

    #[test]
    fn ordering_operators_on_numbers() {
        let a = Value::Int(10);
        let b = Value::Int(20);
        assert_eq!(a.compare(ComparisonOperator::Lt, &b), Some(true));
        assert_eq!(a.compare(ComparisonOperator::Ge, &b), Some(false));
        assert_eq!(b.compare(ComparisonOperator::Ge, &a), Some(true));
    }
}
