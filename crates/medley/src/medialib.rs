//! Media library access.
//!
//! The library maps integer media ids to property dicts. Collection
//! evaluation, playlist operations and projections only ever reach it through
//! the [`MediaLibrary`] trait.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{CoreError, Result};
use crate::model::{Dict, Value};
use crate::signal::{Signal, SignalBus};

/// Property holding an entry's location.
pub const PROP_URL: &str = "url";

/// Read/write access to media entries and their properties.
pub trait MediaLibrary: Send + Sync {
    /// Returns every media id in ascending order.
    fn ids(&self) -> Vec<i64>;

    fn contains(&self, id: i64) -> bool;

    /// Returns the property `key` of entry `id`.
    fn get(&self, id: i64, key: &str) -> Option<Value>;

    /// Returns every property of entry `id`.
    fn properties(&self, id: i64) -> Result<Dict>;

    /// Sets a property on an existing entry.
    fn set(&self, id: i64, key: &str, value: Value) -> Result<()>;

    /// Removes an entry and announces the removal.
    fn remove(&self, id: i64) -> Result<()>;

    /// Returns the id of the entry at `url`, creating the entry if needed.
    fn entry_for_url(&self, url: &str) -> Result<i64>;
}

#[derive(Debug, Default)]
struct LibraryState {
    entries: BTreeMap<i64, Dict>,
    next_id: i64,
}

/// A media library held in memory.
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    state: RwLock<LibraryState>,
    signals: Option<SignalBus>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a library that announces removals on `signals`.
    pub fn with_signals(signals: SignalBus) -> Self {
        Self {
            state: RwLock::default(),
            signals: Some(signals),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LibraryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LibraryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds an entry with the given properties and returns its id.
    pub fn insert(&self, properties: Dict) -> i64 {
        let mut state = self.write();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.insert(id, properties);
        id
    }

    /// Adds an entry from `(key, value)` pairs and returns its id.
    pub fn insert_with<K, V, I>(&self, properties: I) -> i64
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let dict = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<Dict>();
        self.insert(dict)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }
}

impl MediaLibrary for MemoryLibrary {
    fn ids(&self) -> Vec<i64> {
        self.read().entries.keys().copied().collect()
    }

    fn contains(&self, id: i64) -> bool {
        self.read().entries.contains_key(&id)
    }

    fn get(&self, id: i64, key: &str) -> Option<Value> {
        self.read().entries.get(&id)?.get(key).cloned()
    }

    fn properties(&self, id: i64) -> Result<Dict> {
        self.read()
            .entries
            .get(&id)
            .cloned()
            .ok_or(CoreError::EntryNotFound(id))
    }

    fn set(&self, id: i64, key: &str, value: Value) -> Result<()> {
        let mut state = self.write();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(CoreError::EntryNotFound(id))?;
        entry.set(key, value);
        Ok(())
    }

    fn remove(&self, id: i64) -> Result<()> {
        self.write()
            .entries
            .remove(&id)
            .ok_or(CoreError::EntryNotFound(id))?;
        debug!(id, "media entry removed");
        if let Some(signals) = &self.signals {
            signals.emit(Signal::MedialibEntryRemoved { id });
        }
        Ok(())
    }

    fn entry_for_url(&self, url: &str) -> Result<i64> {
        if url.is_empty() {
            return Err(CoreError::invalid_request("empty url"));
        }
        let mut state = self.write();
        let existing = state
            .entries
            .iter()
            .find(|(_, props)| props.get_str(PROP_URL) == Some(url))
            .map(|(id, _)| *id);
        if let Some(id) = existing {
            return Ok(id);
        }
        state.next_id += 1;
        let id = state.next_id;
        let mut props = Dict::new();
        props.set(PROP_URL, url);
        state.entries.insert(id, props);
        debug!(id, url, "media entry created");
        Ok(id)
    }
}
