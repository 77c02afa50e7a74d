//! The `RuleEngine`: event/time-driven evaluation, active-set tracking,
//! and action dispatch. This is the component that actually makes the
//! declarative rule set in `RuleStore` *do* something.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use ember_devices::DeviceRegistry;
use ember_types::{DeviceId, EmberError, ParamTypeId, RuleId, Value};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::event::{DeviceEvent, RuleAction};
use crate::rule::Rule;
use crate::store::{HistoryEventKind, RuleHistoryEntry, RuleStore};

/// What changed about a rule during one evaluation pass, and which action
/// list the engine dispatched as a result. Returned to the caller so it can
/// (e.g.) emit `Rules.RuleActiveChanged` notifications without the engine
/// itself depending on the RPC layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// A state/time-only rule transitioned from inactive to active;
    /// `actions` were dispatched.
    EnteredActive,
    /// A state/time-only rule transitioned from active to inactive;
    /// `exitActions` were dispatched.
    ExitedActive,
    /// An event-triggered (or time-event-triggered) rule fired once;
    /// `actions` were dispatched. No activity state is tracked.
    Fired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub rule_id: RuleId,
    pub outcome: RuleOutcome,
}

/// Owns the in-memory rule index exclusively. All mutation happens through
/// `&self` with interior locking rather than `&mut self`, because the
/// engine is shared across the RPC dispatch loop and the event/time
/// drivers on the single core serialization thread (see spec.md §5) — the
/// lock is never contended across threads in practice, just a convenient
/// way to hand out `Arc<RuleEngine>` everywhere.
pub struct RuleEngine {
    rules: RwLock<HashMap<RuleId, Rule>>,
    /// Insertion order, for the tie-break spec.md requires ("rules are
    /// returned in insertion order of the rule index").
    order: RwLock<Vec<RuleId>>,
    store: RuleStore,
    registry: Arc<dyn DeviceRegistry>,
    last_eval_time: RwLock<Option<DateTime<Utc>>>,
    zone: Tz,
}

impl RuleEngine {
    /// Load every persisted rule and build the in-memory index. Does not
    /// recompute `states_active`/`time_active` — those are whatever was
    /// last persisted, refreshed on the next event/tick.
    pub fn load(store: RuleStore, registry: Arc<dyn DeviceRegistry>, zone: Tz) -> Result<Self, EmberError> {
        let loaded = store.load_all()?;
        let mut order = Vec::with_capacity(loaded.len());
        let mut rules = HashMap::with_capacity(loaded.len());
        for rule in loaded {
            order.push(rule.id);
            rules.insert(rule.id, rule);
        }
        Ok(Self {
            rules: RwLock::new(rules),
            order: RwLock::new(order),
            store,
            registry,
            last_eval_time: RwLock::new(None),
            zone,
        })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    pub fn get_rule(&self, id: RuleId) -> Option<Rule> {
        self.rules.read().get(&id).cloned()
    }

    /// All rules, in insertion order.
    pub fn list_rules(&self) -> Vec<Rule> {
        let rules = self.rules.read();
        let order = self.order.read();
        order.iter().filter_map(|id| rules.get(id).cloned()).collect()
    }

    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.zone)
    }

    // ---- AddRule / EditRule / RemoveRule -------------------------------

    /// Validate, persist, compute initial `statesActive`/`timeActive`, and
    /// insert. Emits `ruleAdded` to the caller via the returned bool unless
    /// `from_edit` (the caller is responsible for actually sending the
    /// notification; the engine itself has no RPC dependency).
    pub fn add_rule(&self, mut rule: Rule, from_edit: bool) -> Result<bool, EmberError> {
        if self.rules.read().contains_key(&rule.id) {
            return Err(EmberError::DuplicateId(rule.id.to_string()));
        }
        rule.validate(self.registry.as_ref())?;

        rule.states_active = match &rule.state_evaluator {
            Some(evaluator) => evaluator.evaluate(self.registry.as_ref()),
            None => true,
        };
        rule.time_active = rule.time_descriptor.is_time_active(self.now());
        rule.active = rule.should_be_active();

        self.store.put(&rule).map_err(|_| EmberError::BackendError("failed to persist rule".into()))?;

        self.rules.write().insert(rule.id, rule.clone());
        self.order.write().push(rule.id);

        info!(rule_id = %rule.id, from_edit, "rule added");
        Ok(!from_edit)
    }

    /// Atomic replace: remove old without emitting `ruleRemoved`, add new;
    /// on add failure, re-append the verbatim old rule and return the
    /// add's error. Per spec.md's design note, the rule is genuinely
    /// absent from the active-set index for the duration of this call —
    /// but since the whole core runs on one serialization thread, no other
    /// operation interleaves inside the borrow that would let a client
    /// observe it.
    pub fn edit_rule(&self, new_rule: Rule) -> Result<(), EmberError> {
        let id = new_rule.id;
        let old = self.rules.read().get(&id).cloned().ok_or_else(|| EmberError::NotFound(id.to_string()))?;

        self.remove_rule(id, true)?;

        match self.add_rule(new_rule, true) {
            Ok(_) => Ok(()),
            Err(e) => {
                // Roll back: restore the old rule verbatim.
                self.store.put(&old).map_err(|_| EmberError::BackendError("failed to roll back rule edit".into()))?;
                self.rules.write().insert(old.id, old.clone());
                self.order.write().push(old.id);
                Err(e)
            }
        }
    }

    pub fn remove_rule(&self, id: RuleId, from_edit: bool) -> Result<bool, EmberError> {
        let existed = self.rules.write().remove(&id).is_some();
        if !existed {
            return Err(EmberError::NotFound(id.to_string()));
        }
        self.order.write().retain(|r| *r != id);
        self.store.remove(id).map_err(|_| EmberError::BackendError("failed to remove rule".into()))?;
        info!(rule_id = %id, from_edit, "rule removed");
        Ok(!from_edit)
    }

    pub fn enable_rule(&self, id: RuleId) -> Result<(), EmberError> {
        self.set_enabled(id, true)
    }

    pub fn disable_rule(&self, id: RuleId) -> Result<(), EmberError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: RuleId, enabled: bool) -> Result<(), EmberError> {
        let mut rule = {
            let mut rules = self.rules.write();
            let rule = rules.get_mut(&id).ok_or_else(|| EmberError::NotFound(id.to_string()))?;
            rule.enabled = enabled;
            rule.updated_at = Utc::now();
            rule.clone()
        };
        if let Err(e) = self.store.put(&rule) {
            // Roll back the in-memory flip so the persisted and in-memory
            // views never disagree.
            rule.enabled = !enabled;
            self.rules.write().insert(id, rule);
            return Err(EmberError::BackendError(e.to_string()));
        }
        Ok(())
    }

    /// Every device currently vanished from the registry that some rule
    /// still references, used by the owning host to decide prune/remove
    /// policy (spec.md leaves the exact policy external — this just
    /// surfaces the dangling references).
    pub fn rules_referencing_device(&self, device: DeviceId) -> Vec<RuleId> {
        self.rules
            .read()
            .values()
            .filter(|r| rule_references_device(r, device))
            .map(|r| r.id)
            .collect()
    }

    // ---- ExecuteActions / ExecuteExitActions ---------------------------

    pub fn execute_actions(&self, id: RuleId) -> Result<Vec<RuleAction>, EmberError> {
        let rule = self.rules.read().get(&id).cloned().ok_or_else(|| EmberError::NotFound(id.to_string()))?;
        if !rule.executable {
            return Err(EmberError::NotExecutable);
        }
        if rule.actions.iter().any(RuleAction::is_event_based) {
            return Err(EmberError::ContainsEventBasedAction);
        }
        self.dispatch(&rule.actions, None);
        self.store.history.record(RuleHistoryEntry {
            rule_id: id,
            timestamp: Utc::now(),
            kind: HistoryEventKind::Triggered,
            actions_dispatched: rule.actions.len(),
        });
        Ok(rule.actions)
    }

    pub fn execute_exit_actions(&self, id: RuleId) -> Result<Vec<RuleAction>, EmberError> {
        let rule = self.rules.read().get(&id).cloned().ok_or_else(|| EmberError::NotFound(id.to_string()))?;
        if !rule.executable {
            return Err(EmberError::NotExecutable);
        }
        if rule.exit_actions.is_empty() {
            return Err(EmberError::NoExitActions);
        }
        // exitActions are never event-based (enforced at validate time),
        // but double-check rather than trust a stale persisted rule.
        if rule.exit_actions.iter().any(RuleAction::is_event_based) {
            return Err(EmberError::ContainsEventBasedAction);
        }
        self.dispatch(&rule.exit_actions, None);
        self.store.history.record(RuleHistoryEntry {
            rule_id: id,
            timestamp: Utc::now(),
            kind: HistoryEventKind::Triggered,
            actions_dispatched: rule.exit_actions.len(),
        });
        Ok(rule.exit_actions)
    }

    // ---- EvaluateEvent --------------------------------------------------

    /// Per spec.md §4.F's event evaluation algorithm. Rules are visited in
    /// insertion order; the returned list preserves that order, which is
    /// also the dispatch order for actions produced in this pass.
    pub fn evaluate_event(&self, event: &DeviceEvent) -> Vec<EvaluationResult> {
        let order = self.order.read().clone();
        let mut results = Vec::new();

        for id in order {
            let mut rules = self.rules.write();
            let Some(rule) = rules.get_mut(&id) else { continue };
            if !rule.enabled {
                continue;
            }

            // Step 1: re-evaluate statesActive if any leaf references the
            // event's state type. Since a StateEvaluator leaf compares
            // *device state*, not event params directly, the trigger is
            // "this event came from a device this evaluator mentions" —
            // the event may have just changed that device's state.
            if let (Some(evaluator), Some(device_id)) = (&rule.state_evaluator, event.device_id()) {
                if evaluator.contains_device(device_id) {
                    rule.states_active = evaluator.evaluate(self.registry.as_ref());
                }
            }

            let outcome = if rule.is_event_triggered() {
                let matched = rule.event_descriptors.iter().any(|d| d.matches(event));
                if matched && rule.states_active && rule.time_active {
                    rule.trigger_count += 1;
                    rule.last_triggered = Some(Utc::now());
                    let resolved = resolve_actions(&rule.actions, Some(event));
                    Some((RuleOutcome::Fired, resolved, Vec::new()))
                } else {
                    None
                }
            } else {
                let should = rule.should_be_active();
                if should && !rule.active {
                    rule.active = true;
                    rule.trigger_count += 1;
                    rule.last_triggered = Some(Utc::now());
                    let resolved = resolve_actions(&rule.actions, None);
                    Some((RuleOutcome::EnteredActive, resolved, Vec::new()))
                } else if !should && rule.active {
                    rule.active = false;
                    let resolved = resolve_actions(&rule.exit_actions, None);
                    Some((RuleOutcome::ExitedActive, Vec::new(), resolved))
                } else {
                    None
                }
            };

            let Some((outcome, enter_actions, exit_actions)) = outcome else {
                drop(rules);
                continue;
            };

            let rule_snapshot = rule.clone();
            drop(rules);

            let _ = self.store.put(&rule_snapshot);

            match outcome {
                RuleOutcome::Fired | RuleOutcome::EnteredActive => {
                    self.dispatch_resolved(&enter_actions);
                    self.store.history.record(RuleHistoryEntry {
                        rule_id: id,
                        timestamp: Utc::now(),
                        kind: if outcome == RuleOutcome::Fired {
                            HistoryEventKind::Triggered
                        } else {
                            HistoryEventKind::EnteredActive
                        },
                        actions_dispatched: enter_actions.len(),
                    });
                }
                RuleOutcome::ExitedActive => {
                    self.dispatch_resolved(&exit_actions);
                    self.store.history.record(RuleHistoryEntry {
                        rule_id: id,
                        timestamp: Utc::now(),
                        kind: HistoryEventKind::ExitedActive,
                        actions_dispatched: exit_actions.len(),
                    });
                }
            }

            results.push(EvaluationResult { rule_id: id, outcome });
        }

        results
    }

    // ---- EvaluateTime ---------------------------------------------------

    /// Per spec.md §4.F's time evaluation algorithm, driven by an external
    /// clock tick. `lastEvalTime` is tracked internally; on first call it
    /// initializes to `now - 1s`.
    pub fn evaluate_time(&self, now: DateTime<Utc>) -> Vec<EvaluationResult> {
        let now_zoned = now.with_timezone(&self.zone);
        let last = {
            let mut last = self.last_eval_time.write();
            let previous = last.unwrap_or(now - Duration::seconds(1));
            *last = Some(now);
            previous
        };
        let last_zoned = last.with_timezone(&self.zone);

        let order = self.order.read().clone();
        let mut results = Vec::new();

        for id in order {
            let mut rules = self.rules.write();
            let Some(rule) = rules.get_mut(&id) else { continue };
            if !rule.enabled || rule.time_descriptor.is_empty() {
                continue;
            }

            if !rule.time_descriptor.calendar_items.is_empty() {
                rule.time_active = rule.time_descriptor.is_time_active(now_zoned);
            }

            let has_time_events = !rule.time_descriptor.time_event_items.is_empty();

            let outcome = if !has_time_events {
                // Calendar-only rule: same active-set transition as a
                // state/time-only rule.
                let should = rule.should_be_active();
                if should && !rule.active {
                    rule.active = true;
                    rule.trigger_count += 1;
                    rule.last_triggered = Some(Utc::now());
                    Some((RuleOutcome::EnteredActive, resolve_actions(&rule.actions, None), Vec::new()))
                } else if !should && rule.active {
                    rule.active = false;
                    Some((RuleOutcome::ExitedActive, Vec::new(), resolve_actions(&rule.exit_actions, None)))
                } else {
                    None
                }
            } else {
                let fired = rule.time_descriptor.time_event_items.iter().any(|item| item.fired_between(last_zoned, now_zoned));
                if fired && rule.states_active && rule.time_active {
                    rule.trigger_count += 1;
                    rule.last_triggered = Some(Utc::now());
                    Some((RuleOutcome::Fired, resolve_actions(&rule.actions, None), Vec::new()))
                } else {
                    None
                }
            };

            let Some((outcome, enter_actions, exit_actions)) = outcome else {
                drop(rules);
                continue;
            };

            let rule_snapshot = rule.clone();
            drop(rules);

            let _ = self.store.put(&rule_snapshot);

            match outcome {
                RuleOutcome::Fired | RuleOutcome::EnteredActive => {
                    self.dispatch_resolved(&enter_actions);
                    self.store.history.record(RuleHistoryEntry {
                        rule_id: id,
                        timestamp: Utc::now(),
                        kind: if outcome == RuleOutcome::Fired {
                            HistoryEventKind::Triggered
                        } else {
                            HistoryEventKind::EnteredActive
                        },
                        actions_dispatched: enter_actions.len(),
                    });
                }
                RuleOutcome::ExitedActive => {
                    self.dispatch_resolved(&exit_actions);
                    self.store.history.record(RuleHistoryEntry {
                        rule_id: id,
                        timestamp: Utc::now(),
                        kind: HistoryEventKind::ExitedActive,
                        actions_dispatched: exit_actions.len(),
                    });
                }
            }

            results.push(EvaluationResult { rule_id: id, outcome });
        }

        results
    }

    // ---- dispatch --------------------------------------------------------

    /// Resolve event bindings and dispatch. The engine never awaits the
    /// device call inline — fire-and-forget with per-action logging, per
    /// spec.md's "the engine does not wait for completion" note.
    fn dispatch(&self, actions: &[RuleAction], event: Option<&DeviceEvent>) {
        let resolved: Vec<(DeviceId, ember_types::ActionTypeId, HashMap<ParamTypeId, Value>)> = actions
            .iter()
            .map(|a| (a.device_id, a.action_type_id, a.resolve(event)))
            .collect();
        self.dispatch_resolved(&resolved);
    }

    fn dispatch_resolved(&self, resolved: &[(DeviceId, ember_types::ActionTypeId, HashMap<ParamTypeId, Value>)]) {
        for (device_id, action_type_id, params) in resolved.iter().cloned() {
            let registry = self.registry.clone();
            tokio::spawn(async move {
                match registry.execute_action(device_id, action_type_id, params).await {
                    Ok(()) => info!(%device_id, %action_type_id, "rule action dispatched"),
                    Err(e) => warn!(%device_id, %action_type_id, error = %e, "rule action failed"),
                }
            });
        }
    }
}

fn resolve_actions(
    actions: &[RuleAction],
    event: Option<&DeviceEvent>,
) -> Vec<(DeviceId, ember_types::ActionTypeId, HashMap<ParamTypeId, Value>)> {
    actions.iter().map(|a| (a.device_id, a.action_type_id, a.resolve(event))).collect()
}

fn rule_references_device(rule: &Rule, device: DeviceId) -> bool {
    rule.actions.iter().any(|a| a.device_id == device)
        || rule.exit_actions.iter().any(|a| a.device_id == device)
        || rule.event_descriptors.iter().any(|d| matches!(&d.source, crate::event::EventSource::DeviceBound { device_id, .. } if *device_id == device))
        || rule.state_evaluator.as_ref().is_some_and(|e| e.contains_device(device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, RuleActionParam};
    use crate::state::{BoolOp, StateDescriptor, StateEvaluator};
    use crate::time::TimeDescriptor;
    use ember_devices::{Device, DeviceTypeCatalog, InMemoryDeviceRegistry};
    use ember_types::{ActionTypeId, ComparisonOperator, EventTypeId, StateTypeId};
    use std::sync::Arc;

    fn fresh_engine() -> (RuleEngine, Arc<InMemoryDeviceRegistry>, DeviceId) {
        let device = DeviceId::new();
        let registry = Arc::new(InMemoryDeviceRegistry::new(Arc::new(DeviceTypeCatalog::new())));
        registry.add_device(Device { id: device, name: "d1".into(), device_type: "generic".into() });
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(ember_storage::RedbStore::open(":memory:").unwrap());
        let store = RuleStore::new(backend);
        let engine = RuleEngine::load(store, registry.clone(), chrono_tz::UTC).unwrap();
        (engine, registry, device)
    }

    fn state_only_rule(device: DeviceId, state_type: StateTypeId, action_device: DeviceId) -> Rule {
        Rule {
            id: RuleId::new(),
            name: "temp rule".into(),
            enabled: true,
            executable: true,
            time_descriptor: TimeDescriptor::default(),
            state_evaluator: Some(StateEvaluator::Leaf(StateDescriptor {
                state_type_id: state_type,
                device_id: device,
                operator: ComparisonOperator::Gt,
                value: Value::Int(20),
            })),
            event_descriptors: vec![],
            actions: vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: action_device, params: vec![] }],
            exit_actions: vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: action_device, params: vec![] }],
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

    #[tokio::test]
    async fn scenario_state_only_rule_lifecycle() {
        // Scenario 1 from spec.md §8: temp 18 -> 22 activates; 22 -> 19 deactivates.
        let (engine, registry, device) = fresh_engine();
        let state_type = StateTypeId::new();
        registry.set_state(device, state_type, Value::Int(18));
        let rule = state_only_rule(device, state_type, device);
        engine.add_rule(rule.clone(), false).unwrap();

        registry.set_state(device, state_type, Value::Int(22));
        let event = DeviceEvent {
            source: EventSource::DeviceBound { device_id: device, event_type_id: EventTypeId::new() },
            params: HashMap::new(),
        };
        let results = engine.evaluate_event(&event);
        assert_eq!(results, vec![EvaluationResult { rule_id: rule.id, outcome: RuleOutcome::EnteredActive }]);
        assert!(engine.get_rule(rule.id).unwrap().active);

        registry.set_state(device, state_type, Value::Int(19));
        let results = engine.evaluate_event(&event);
        assert_eq!(results, vec![EvaluationResult { rule_id: rule.id, outcome: RuleOutcome::ExitedActive }]);
        assert!(!engine.get_rule(rule.id).unwrap().active);
    }

    #[tokio::test]
    async fn scenario_event_triggered_rule_with_binding() {
        // Scenario 2: event-triggered rule with action param bound to the
        // firing event's param.
        let (engine, _registry, device) = fresh_engine();
        let event_type = EventTypeId::new();
        let source_param = ParamTypeId::new();
        let target_param = ParamTypeId::new();

        let rule = Rule {
            id: RuleId::new(),
            name: "event rule".into(),
            enabled: true,
            executable: true,
            time_descriptor: TimeDescriptor::default(),
            state_evaluator: None,
            event_descriptors: vec![crate::event::EventDescriptor {
                source: EventSource::DeviceBound { device_id: device, event_type_id: event_type },
                params: vec![],
            }],
            actions: vec![RuleAction {
                action_type_id: ActionTypeId::new(),
                device_id: device,
                params: vec![RuleActionParam::EventBinding {
                    param_type_id: target_param,
                    event_type_id: event_type,
                    event_param_type_id: source_param,
                }],
            }],
            exit_actions: vec![],
            states_active: true,
            time_active: true,
            active: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            trigger_count: 0,
            last_triggered: None,
            unknown_fields: Default::default(),
        };
        engine.add_rule(rule.clone(), false).unwrap();

        let mut params = HashMap::new();
        params.insert(source_param, Value::Int(7));
        let event = DeviceEvent { source: EventSource::DeviceBound { device_id: device, event_type_id: event_type }, params };

        let results = engine.evaluate_event(&event);
        assert_eq!(results, vec![EvaluationResult { rule_id: rule.id, outcome: RuleOutcome::Fired }]);
        assert_eq!(engine.get_rule(rule.id).unwrap().trigger_count, 1);
    }

    #[test]
    fn add_rule_rejects_duplicate_id() {
        let (engine, _registry, device) = fresh_engine();
        let state_type = StateTypeId::new();
        let rule = state_only_rule(device, state_type, device);
        engine.add_rule(rule.clone(), false).unwrap();
        assert!(matches!(engine.add_rule(rule, false), Err(EmberError::DuplicateId(_))));
    }

    #[test]
    fn edit_rule_restores_old_rule_verbatim_on_add_failure() {
        let (engine, _registry, device) = fresh_engine();
        let state_type = StateTypeId::new();
        let rule = state_only_rule(device, state_type, device);
        engine.add_rule(rule.clone(), false).unwrap();

        let mut broken = rule.clone();
        broken.actions.clear(); // fails validation: actions must be non-empty
        assert!(engine.edit_rule(broken).is_err());

        let restored = engine.get_rule(rule.id).unwrap();
        assert_eq!(restored.actions.len(), rule.actions.len());
    }

    #[test]
    fn execute_actions_requires_executable() {
        let (engine, _registry, device) = fresh_engine();
        let state_type = StateTypeId::new();
        let mut rule = state_only_rule(device, state_type, device);
        rule.executable = false;
        engine.add_rule(rule.clone(), false).unwrap();
        assert!(matches!(engine.execute_actions(rule.id), Err(EmberError::NotExecutable)));
    }

    #[test]
    fn scenario_time_rule_weekly_window() {
        use crate::time::{CalendarItem, RepeatMode, RepeatingOption, TimeAnchor};
        use chrono::TimeZone;

        let (engine, _registry, device) = fresh_engine();
        let calendar = CalendarItem {
            anchor: TimeAnchor::StartTime(chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
            duration_minutes: 60,
            repeating: RepeatingOption { mode: RepeatMode::Weekly, week_days: vec![1], month_days: vec![] },
        };
        let rule = Rule {
            id: RuleId::new(),
            name: "weekly".into(),
            enabled: true,
            executable: true,
            time_descriptor: TimeDescriptor { calendar_items: vec![calendar], time_event_items: vec![] },
            state_evaluator: None,
            event_descriptors: vec![],
            actions: vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: device, params: vec![] }],
            exit_actions: vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: device, params: vec![] }],
            states_active: true,
            time_active: false,
            active: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            trigger_count: 0,
            last_triggered: None,
            unknown_fields: Default::default(),
        };
        engine.add_rule(rule.clone(), false).unwrap();

        // 2026-01-05 is a Monday.
        let before = chrono_tz::UTC.with_ymd_and_hms(2026, 1, 5, 7, 59, 0).unwrap();
        let results = engine.evaluate_time(before.with_timezone(&Utc));
        assert!(results.is_empty());
        assert!(!engine.get_rule(rule.id).unwrap().active);

        let at_start = chrono_tz::UTC.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let results = engine.evaluate_time(at_start.with_timezone(&Utc));
        assert_eq!(results, vec![EvaluationResult { rule_id: rule.id, outcome: RuleOutcome::EnteredActive }]);

        let after_end = chrono_tz::UTC.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let results = engine.evaluate_time(after_end.with_timezone(&Utc));
        assert_eq!(results, vec![EvaluationResult { rule_id: rule.id, outcome: RuleOutcome::ExitedActive }]);
    }
}
