//! The growing legacy-to-new identifier map
//!
//! The map is owned by the migration controller and written from exactly
//! one place: the feedback-handling step, as the importer reports each
//! freshly issued identifier. Both engines only read it. On successful
//! completion it can be persisted as a flat JSON object holding the
//! forward entries plus reverse entries keyed `"new:" + newId`.

use crate::record::scalar_key;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Mutable mapping from legacy identifier to freshly issued identifier.
#[derive(Debug, Default)]
pub struct IdMap {
    entries: HashMap<String, String>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a mapping by raw key (forward or reverse).
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Record one issued identifier: the forward entry and the reverse
    /// `"new:" + newId` entry.
    pub fn record_issue(&mut self, legacy_id: &str, new_id: &str) {
        self.entries
            .insert(legacy_id.to_string(), new_id.to_string());
        self.entries
            .insert(format!("new:{}", new_id), legacy_id.to_string());
    }

    /// Substitute a scalar value in place when a mapping exists.
    ///
    /// Returns `Some((from, to))` only when the value actually changed;
    /// unmapped values are left untouched.
    pub fn substitute(&self, value: &mut Value) -> Option<(String, String)> {
        let key = scalar_key(value)?;
        let mapped = self.entries.get(&key)?;
        if *mapped == key {
            return None;
        }
        let change = (key, mapped.clone());
        *value = Value::String(mapped.clone());
        Some(change)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist as a flat JSON object. Called only after a successful run.
    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = serde_json::to_string(&self.entries)
            .context("Failed to serialize identifier map")?;
        std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write identifier map to {}", path.display()))?;
        Ok(())
    }
}
