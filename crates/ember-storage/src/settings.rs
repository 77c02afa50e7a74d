//! Atomic flat-file persistence for server configuration.
//!
//! Unlike rule/user groups (redb, transactional by construction), the
//! top-level `Configuration` — server name, time zone, language, and the
//! list of transport server configs — lives in a single TOML file that
//! tools outside the core can reasonably read by hand. Durability against
//! a kill between writes is provided the conventional way: serialize to a
//! sibling `.tmp` file, `fsync`, then rename over the real path. Rename
//! within the same directory is atomic on every platform this crate
//! targets.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load and deserialize the settings file. Returns `None` if it
    /// doesn't exist yet (first run).
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(Some(toml::from_str(&raw)?))
    }

    /// Serialize `value` and atomically replace the settings file.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        let raw = toml::to_string_pretty(value)?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".ember-settings-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(raw.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
