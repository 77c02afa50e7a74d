//! Background tasks that actually drive the rule engine: a device-event
//! consumer (`evaluateEvent`, spec.md §4.F) and a clock ticker
//! (`evaluateTime`). Both exist only to turn [`RuleEngine`] outcomes into
//! [`CoreEvent::RuleActiveChanged`] notifications on the shared
//! [`EventBus`] — the engine itself stays free of any RPC dependency.
//!
//! Feeding real device events into [`spawn_event_driver`]'s channel is a
//! device-plugin concern external to this crate (MQTT, UDP, D-Bus, etc. —
//! see `ember_devices::DeviceRegistry`'s own doc comment); what ships here
//! is the consumer side of that boundary, grounded in the teacher's
//! `neomind_commands::processor::CommandProcessor` poll-loop shape.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ember_rules::{DeviceEvent, EvaluationResult, RuleEngine, RuleOutcome};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::events::{CoreEvent, EventBus};

fn publish_outcomes(events: &EventBus, results: Vec<EvaluationResult>) {
    for result in results {
        let active = match result.outcome {
            RuleOutcome::EnteredActive => Some(true),
            RuleOutcome::ExitedActive => Some(false),
            // A one-shot `Fired` rule has no active/inactive transition to report.
            RuleOutcome::Fired => None,
        };
        if let Some(active) = active {
            events.publish(CoreEvent::RuleActiveChanged { rule_id: result.rule_id, active });
        }
    }
}

/// Spawn the consumer that feeds inbound [`DeviceEvent`]s to
/// `RuleEngine::evaluate_event`. Returns the sender a device-plugin
/// transport hands events to, and the task handle so the caller can abort
/// it on shutdown (matching `ember-server/src/main.rs`'s `tcp_task`/
/// `ws_task` lifecycle).
pub fn spawn_event_driver(engine: Arc<RuleEngine>, events: EventBus) -> (mpsc::UnboundedSender<DeviceEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let results = engine.evaluate_event(&event);
            publish_outcomes(&events, results);
        }
        info!("device event driver stopped: channel closed");
    });
    (tx, handle)
}

/// Spawn the clock ticker that drives `RuleEngine::evaluate_time` on a
/// fixed interval, for calendar- and time-event-triggered rules (spec.md
/// §8 scenario 6).
pub fn spawn_time_driver(engine: Arc<RuleEngine>, events: EventBus, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            let results = engine.evaluate_time(Utc::now());
            publish_outcomes(&events, results);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_devices::{Device, DeviceTypeCatalog, InMemoryDeviceRegistry};
    use ember_rules::{EventSource, RuleAction, RuleStore};
    use ember_types::{ActionTypeId, ComparisonOperator, DeviceId, EventTypeId, RuleId, StateTypeId, Value};
    use std::collections::HashMap;

    fn engine_with_state_rule() -> (Arc<RuleEngine>, Arc<InMemoryDeviceRegistry>, DeviceId, StateTypeId) {
        let device = DeviceId::new();
        let state_type = StateTypeId::new();
        let registry = Arc::new(InMemoryDeviceRegistry::new(Arc::new(DeviceTypeCatalog::new())));
        registry.add_device(Device { id: device, name: "d1".into(), device_type: "generic".into() });
        registry.set_state(device, state_type, Value::Int(18));

        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(ember_storage::RedbStore::open(":memory:").unwrap());
        let store = RuleStore::new(backend);
        let engine = Arc::new(RuleEngine::load(store, registry.clone(), chrono_tz::UTC).unwrap());

        let rule = ember_rules::Rule {
            id: RuleId::new(),
            name: "temp rule".into(),
            enabled: true,
            executable: true,
            time_descriptor: Default::default(),
            state_evaluator: Some(ember_rules::StateEvaluator::Leaf(ember_rules::StateDescriptor {
                state_type_id: state_type,
                device_id: device,
                operator: ComparisonOperator::Gt,
                value: Value::Int(20),
            })),
            event_descriptors: vec![],
            actions: vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: device, params: vec![] }],
            exit_actions: vec![RuleAction { action_type_id: ActionTypeId::new(), device_id: device, params: vec![] }],
            states_active: false,
            time_active: true,
            active: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            trigger_count: 0,
            last_triggered: None,
            unknown_fields: Default::default(),
        };
        engine.add_rule(rule, false).unwrap();
        (engine, registry, device, state_type)
    }

    #[tokio::test]
    async fn event_driver_publishes_rule_active_changed_on_entry() {
        let (engine, registry, device, state_type) = engine_with_state_rule();
        let events = EventBus::new();
        let mut rx = events.subscribe();

        let (tx, handle) = spawn_event_driver(engine, events);

        registry.set_state(device, state_type, Value::Int(22));
        tx.send(DeviceEvent { source: EventSource::DeviceBound { device_id: device, event_type_id: EventTypeId::new() }, params: HashMap::new() }).unwrap();

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, CoreEvent::RuleActiveChanged { active: true, .. }));

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn time_driver_ticks_and_evaluates() {
        use ember_rules::{CalendarItem, RepeatMode, RepeatingOption, TimeAnchor};

        let device = DeviceId::new();
        let registry = Arc::new(InMemoryDeviceRegistry::new(Arc::new(DeviceTypeCatalog::new())));
        registry.add_device(Device { id: device, name: "d1".into(), device_type: "generic".into() });
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(ember_storage::RedbStore::open(":memory:").unwrap());
        let engine = Arc::new(RuleEngine::load(RuleStore::new(backend), registry, chrono_tz::UTC).unwrap());

        // A calendar window spanning the entire day is active no matter
        // what the wall clock reads when this test runs.
        let calendar =
            CalendarItem { anchor: TimeAnchor::StartTime(chrono::NaiveTime::MIN), duration_minutes: 24 * 60, repeating: RepeatingOption { mode: RepeatMode::Daily, week_days: vec![], month_days: vec![] } };
        let rule = ember_rules::Rule {
            id: RuleId::new(),
            name: "always on".into(),
            enabled: true,
            executable: true,
            time_descriptor: ember_rules::TimeDescriptor { calendar_items: vec![calendar], time_event_items: vec![] },
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
        engine.add_rule(rule, false).unwrap();

        let events = EventBus::new();
        let mut rx = events.subscribe();
        let handle = spawn_time_driver(engine, events, Duration::from_millis(5));

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, CoreEvent::RuleActiveChanged { active: true, .. }));

        handle.abort();
    }
}
