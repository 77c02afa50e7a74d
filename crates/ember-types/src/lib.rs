//! Shared identifier, value, and error types for the ember IoT automation
//! core.
//!
//! This crate has no knowledge of rules, devices, or RPC — it is the
//! foundation every other `ember-*` crate builds on.

pub mod error;
pub mod id;
pub mod param;
pub mod value;

pub use error::{EmberError, Result};
pub use id::{
    ActionTypeId, DeviceId, EventTypeId, Identifier, PairingTransactionId, ParamTypeId, RuleId,
    StateTypeId, TokenId,
};
pub use param::{InputType, Limits, ParamType};
pub use value::{ComparisonOperator, Value, ValueType};
