//! Persistence substrate for the rule engine and the user store.
//!
//! Two layouts, one backend:
//! - [`group`]: one JSON group per rule/user, keyed by UUID, inside a
//!   redb-backed [`backend::RedbStore`] — atomic per write via redb's own
//!   transactions.
//! - [`settings`]: the flat server `Configuration`, as a TOML file written
//!   with the conventional tmp-then-rename dance.

pub mod backend;
pub mod error;
pub mod group;
pub mod settings;

pub use backend::{KeyValueStore, RedbStore};
pub use error::{Result, StorageError};
pub use group::GroupStore;
pub use settings::SettingsFile;
