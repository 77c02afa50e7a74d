//! The rule engine: declarative event/state/time -> action evaluation with
//! persistent configuration, consistency validation, and an active/inactive
//! lifecycle per rule.
//!
//! Layout mirrors spec.md's component breakdown:
//! - [`param`] / [`event`] / [`state`] / [`time`]: the descriptor model a
//!   rule is built from.
//! - [`rule`]: the `Rule` entity and its consistency invariants.
//! - [`store`]: persistence (one JSON group per rule) plus trigger history.
//! - [`engine`]: the `RuleEngine` itself — evaluation, active-set tracking,
//!   and action dispatch.

pub mod engine;
pub mod event;
pub mod param;
pub mod rule;
pub mod state;
pub mod store;
pub mod time;

pub use engine::{EvaluationResult, RuleEngine, RuleOutcome};
pub use event::{DeviceEvent, EventDescriptor, EventSource, RuleAction, RuleActionParam};
pub use param::ParamDescriptor;
pub use rule::Rule;
pub use state::{BoolOp, StateDescriptor, StateEvaluator};
pub use store::{HistoryEventKind, ImportResult, RuleHistory, RuleHistoryEntry, RuleHistoryFilter, RuleHistoryStats, RuleStore, RulesExport};
pub use time::{CalendarItem, RepeatMode, RepeatingOption, TimeAnchor, TimeDescriptor, TimeEventItem};
