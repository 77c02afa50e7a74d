//! Persistence for rules: one JSON group per rule, plus a capped
//! in-memory trigger-history ring buffer and bulk export/import.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ember_storage::GroupStore;
use ember_types::{EmberError, RuleId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::rule::Rule;

const RULES_TABLE: &str = "rules";
/// Keep only the most recent entries per rule — unbounded history would
/// make the store grow forever for a rule that fires every few seconds.
const MAX_HISTORY_PER_RULE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventKind {
    Triggered,
    EnteredActive,
    ExitedActive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleHistoryEntry {
    pub rule_id: RuleId,
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryEventKind,
    pub actions_dispatched: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RuleHistoryFilter {
    pub rule_id: Option<RuleId>,
    pub kind: Option<HistoryEventKind>,
    pub since: Option<DateTime<Utc>>,
}

impl RuleHistoryFilter {
    fn matches(&self, entry: &RuleHistoryEntry) -> bool {
        self.rule_id.is_none_or(|id| id == entry.rule_id)
            && self.kind.is_none_or(|k| k == entry.kind)
            && self.since.is_none_or(|since| entry.timestamp >= since)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleHistoryStats {
    pub total_entries: usize,
    pub triggered: usize,
    pub entered_active: usize,
    pub exited_active: usize,
}

/// Append-only, capped ring of recent trigger/activation events per rule.
/// Additive telemetry only — never consulted by evaluation.
#[derive(Default)]
pub struct RuleHistory {
    entries: RwLock<HashMap<RuleId, Vec<RuleHistoryEntry>>>,
}

impl RuleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: RuleHistoryEntry) {
        let mut entries = self.entries.write();
        let bucket = entries.entry(entry.rule_id).or_default();
        bucket.push(entry);
        if bucket.len() > MAX_HISTORY_PER_RULE {
            let excess = bucket.len() - MAX_HISTORY_PER_RULE;
            bucket.drain(0..excess);
        }
    }

    pub fn query(&self, filter: &RuleHistoryFilter) -> Vec<RuleHistoryEntry> {
        let entries = self.entries.read();
        entries
            .values()
            .flatten()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn stats(&self, rule_id: RuleId) -> RuleHistoryStats {
        let entries = self.entries.read();
        let bucket = entries.get(&rule_id);
        let mut stats = RuleHistoryStats::default();
        let Some(bucket) = bucket else { return stats };
        stats.total_entries = bucket.len();
        for entry in bucket {
            match entry.kind {
                HistoryEventKind::Triggered => stats.triggered += 1,
                HistoryEventKind::EnteredActive => stats.entered_active += 1,
                HistoryEventKind::ExitedActive => stats.exited_active += 1,
            }
        }
        stats
    }

    pub fn forget(&self, rule_id: RuleId) {
        self.entries.write().remove(&rule_id);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RulesExport {
    pub exported_at: DateTime<Utc>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub imported: Vec<RuleId>,
    pub failed: Vec<(String, String)>,
}

/// Persistence for the rule set. Validation and in-memory indexing live in
/// `RuleEngine`; this is purely the group-store wrapper plus history.
pub struct RuleStore {
    groups: GroupStore,
    pub history: Arc<RuleHistory>,
}

impl RuleStore {
    pub fn new(backend: Arc<dyn ember_storage::KeyValueStore>) -> Self {
        Self { groups: GroupStore::new(backend, RULES_TABLE), history: Arc::new(RuleHistory::new()) }
    }

    pub fn put(&self, rule: &Rule) -> Result<(), EmberError> {
        self.groups.put(&rule.id.to_string(), rule).map_err(EmberError::from)
    }

    pub fn get(&self, id: RuleId) -> Result<Option<Rule>, EmberError> {
        self.groups.get(&id.to_string()).map_err(EmberError::from)
    }

    pub fn remove(&self, id: RuleId) -> Result<bool, EmberError> {
        self.history.forget(id);
        self.groups.remove(&id.to_string()).map_err(EmberError::from)
    }

    /// Every persisted rule. Malformed groups are logged and skipped —
    /// loading tolerates missing/additional keys but not outright garbage.
    pub fn load_all(&self) -> Result<Vec<Rule>, EmberError> {
        Ok(self.groups.load_all::<Rule>().map_err(EmberError::from)?.into_iter().map(|(_, r)| r).collect())
    }

    pub fn export(&self) -> Result<RulesExport, EmberError> {
        Ok(RulesExport { exported_at: Utc::now(), rules: self.load_all()? })
    }

    /// Persist every rule in `export`. Does not run `Rule::validate` —
    /// callers (the engine's `import` entry point) are expected to route
    /// each rule through `AddRule` so validation failures are collected
    /// per-rule rather than aborting the whole import.
    pub fn import_raw(&self, export: RulesExport) -> Result<(), EmberError> {
        for rule in &export.rules {
            self.put(rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_storage::RedbStore;

    fn store() -> RuleStore {
        let backend: Arc<dyn ember_storage::KeyValueStore> = Arc::new(RedbStore::open(":memory:").unwrap());
        RuleStore::new(backend)
    }

    fn sample_rule() -> Rule {
        Rule {
            id: RuleId::new(),
            name: "r".into(),
            enabled: true,
            executable: true,
            time_descriptor: Default::default(),
            state_evaluator: None,
            event_descriptors: vec![],
            actions: vec![],
            exit_actions: vec![],
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

    #[test]
    fn put_then_get_round_trips() {
        let store = store();
        let rule = sample_rule();
        store.put(&rule).unwrap();
        let back = store.get(rule.id).unwrap().unwrap();
        assert_eq!(back.id, rule.id);
    }

    #[test]
    fn history_caps_at_max_entries_per_rule() {
        let history = RuleHistory::new();
        let rule_id = RuleId::new();
        for _ in 0..(MAX_HISTORY_PER_RULE + 50) {
            history.record(RuleHistoryEntry {
                rule_id,
                timestamp: Utc::now(),
                kind: HistoryEventKind::Triggered,
                actions_dispatched: 1,
            });
        }
        let stats = history.stats(rule_id);
        assert_eq!(stats.total_entries, MAX_HISTORY_PER_RULE);
    }

    #[test]
    fn export_then_import_round_trips_all_rules() {
        let store = store();
        let r1 = sample_rule();
        let r2 = sample_rule();
        store.put(&r1).unwrap();
        store.put(&r2).unwrap();

        let export = store.export().unwrap();
        assert_eq!(export.rules.len(), 2);

        let fresh = self::store();
        fresh.import_raw(export).unwrap();
        assert!(fresh.get(r1.id).unwrap().is_some());
        assert!(fresh.get(r2.id).unwrap().is_some());
    }

    #[test]
    fn remove_drops_both_the_rule_and_its_history() {
        let store = store();
        let rule = sample_rule();
        store.put(&rule).unwrap();
        store.history.record(RuleHistoryEntry {
            rule_id: rule.id,
            timestamp: Utc::now(),
            kind: HistoryEventKind::Triggered,
            actions_dispatched: 1,
        });
        assert!(store.remove(rule.id).unwrap());
        assert!(store.get(rule.id).unwrap().is_none());
        assert_eq!(store.history.stats(rule.id).total_entries, 0);
    }
}
