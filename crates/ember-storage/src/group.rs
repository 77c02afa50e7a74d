//! The keyed-hierarchical "one group per entity" layout used for rules and
//! users: each entity is a JSON object keyed by its own UUID string within
//! a named table (`"rules"`, `"users"`, ...). Loading tolerates missing or
//! additional keys because `serde_json` deserializes structurally, not
//! field-by-field; unknown keys round-trip untouched via
//! `#[serde(flatten)]` on the types that need it (see `ember-rules::rule`).
//!
//! Durability is inherited from the backing [`crate::backend::RedbStore`]:
//! every `put`/`remove` is one redb transaction, so a kill mid-write either
//! lands before or after the commit, never in between.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::backend::KeyValueStore;
use crate::error::{Result, StorageError};

/// A table of JSON-serialized groups, each addressed by a UUID-shaped
/// string key.
pub struct GroupStore {
    backend: Arc<dyn KeyValueStore>,
    table: &'static str,
}

impl GroupStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, table: &'static str) -> Self {
        Self { backend, table }
    }

    /// Serialize `value` and write it under `id`, replacing any existing
    /// group with the same id.
    pub fn put<T: Serialize>(&self, id: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.write(self.table, id, &bytes)
    }

    /// Deserialize the group stored under `id`, if any.
    pub fn get<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        match self.backend.read(self.table, id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like [`GroupStore::get`], but returns [`StorageError::NotFound`] for
    /// a missing id instead of `Ok(None)` — convenient at call sites that
    /// always expect the group to exist.
    pub fn require<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        self.get(id)?.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        self.backend.delete(self.table, id)
    }

    /// Every id currently stored in this table, in no particular order.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .scan(self.table, "")?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Deserialize every group in the table. A group that fails to
    /// deserialize is logged and skipped rather than aborting the whole
    /// load, matching spec.md's "tolerant load" requirement for the rule
    /// store.
    pub fn load_all<T: DeserializeOwned>(&self) -> Result<Vec<(String, T)>> {
        let mut out = Vec::new();
        for (id, bytes) in self.backend.scan(self.table, "")? {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => out.push((id, value)),
                Err(e) => {
                    tracing::warn!(table = self.table, id = %id, error = %e, "skipping unreadable group");
                }
            }
        }
        Ok(out)
    }
}
