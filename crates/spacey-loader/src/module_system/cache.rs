// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Partitioned module cache
//!
//! Two committed partitions (`legacy`, `declarative`) hold every module the
//! loader has identified. A third, `discovery`, holds entries whose format is
//! not known yet; they are promoted to a committed partition or rolled back.

use crate::error::{LoaderError, Result};
use crate::module_system::entry::EntryRef;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Cache partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Legacy-format cache (also holds exposed declarative modules)
    Legacy,
    /// Declarative-format cache
    Declarative,
    /// Entries awaiting classification
    Discovery,
}

impl Partition {
    /// Whether failures in this partition poison the slot
    pub fn is_committed(self) -> bool {
        !matches!(self, Partition::Discovery)
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::Legacy => write!(f, "legacy"),
            Partition::Declarative => write!(f, "declarative"),
            Partition::Discovery => write!(f, "discovery"),
        }
    }
}

/// A cache slot
#[derive(Debug, Clone)]
pub enum Slot {
    /// Being compiled; re-entrant requests see the partial entry
    Loading(EntryRef),
    /// Compiled (or parsed, after a discovery pass)
    Ready(EntryRef),
    /// Compilation failed; every read re-raises the error
    Poisoned(LoaderError),
}

impl Slot {
    /// The entry, or the captured error
    pub fn entry(&self) -> Result<EntryRef> {
        match self {
            Slot::Loading(entry) | Slot::Ready(entry) => Ok(EntryRef::clone(entry)),
            Slot::Poisoned(err) => Err(err.clone()),
        }
    }

    /// Whether the slot is an in-progress marker
    pub fn is_loading(&self) -> bool {
        matches!(self, Slot::Loading(_))
    }

    /// Whether the slot holds an error
    pub fn is_poisoned(&self) -> bool {
        matches!(self, Slot::Poisoned(_))
    }
}

/// Build a cache key from a resolved path and the query/fragment suffix
pub fn cache_key(path: &Path, query: Option<&str>) -> String {
    let mut key = path.display().to_string();
    if let Some(query) = query {
        key.push_str(query);
    }
    key
}

/// Split a `?query` / `#fragment` suffix off a specifier
pub fn split_query(request: &str) -> (&str, Option<&str>) {
    match request.find(['?', '#']) {
        Some(idx) => (&request[..idx], Some(&request[idx..])),
        None => (request, None),
    }
}

/// Keys held by each partition at one point in time, sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Legacy partition keys
    pub legacy: Vec<String>,
    /// Declarative partition keys
    pub declarative: Vec<String>,
    /// Discovery partition keys
    pub discovery: Vec<String>,
    /// Keys of poisoned slots, in any partition
    pub poisoned: Vec<String>,
}

/// All mutable loader state
#[derive(Default)]
pub struct LoaderState {
    legacy: FxHashMap<String, Slot>,
    declarative: FxHashMap<String, Slot>,
    discovery: FxHashMap<String, Slot>,
    builtins: FxHashMap<String, EntryRef>,
    /// Main module as seen by the loader
    pub main: Option<EntryRef>,
    /// Main module as seen through the legacy format
    pub legacy_main: Option<EntryRef>,
    /// Set while a parse-only pass runs
    pub parsing: bool,
}

impl LoaderState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, partition: Partition) -> &FxHashMap<String, Slot> {
        match partition {
            Partition::Legacy => &self.legacy,
            Partition::Declarative => &self.declarative,
            Partition::Discovery => &self.discovery,
        }
    }

    fn map_mut(&mut self, partition: Partition) -> &mut FxHashMap<String, Slot> {
        match partition {
            Partition::Legacy => &mut self.legacy,
            Partition::Declarative => &mut self.declarative,
            Partition::Discovery => &mut self.discovery,
        }
    }

    /// Get a slot
    pub fn get(&self, partition: Partition, key: &str) -> Option<&Slot> {
        self.map(partition).get(key)
    }

    /// Check if a key is cached in a partition
    pub fn has(&self, partition: Partition, key: &str) -> bool {
        self.map(partition).contains_key(key)
    }

    /// Store a slot
    pub fn set(&mut self, partition: Partition, key: impl Into<String>, slot: Slot) {
        self.map_mut(partition).insert(key.into(), slot);
    }

    /// Remove a slot
    pub fn delete(&mut self, partition: Partition, key: &str) -> Option<Slot> {
        self.map_mut(partition).remove(key)
    }

    /// Mark an in-progress slot as finished
    pub fn finish(&mut self, partition: Partition, key: &str) {
        if let Some(slot) = self.map_mut(partition).get_mut(key) {
            if let Slot::Loading(entry) = slot {
                let entry = EntryRef::clone(entry);
                *slot = Slot::Ready(entry);
            }
        }
    }

    /// Move a discovery slot into a committed partition
    pub fn commit(&mut self, key: &str, to: Partition) -> Option<EntryRef> {
        debug_assert!(to.is_committed());
        let slot = self.discovery.remove(key)?;
        let entry = slot.entry().ok()?;
        let slot = match slot {
            Slot::Loading(_) => Slot::Loading(EntryRef::clone(&entry)),
            _ => Slot::Ready(EntryRef::clone(&entry)),
        };
        tracing::debug!("commit {} -> {}", key, to);
        self.map_mut(to).insert(key.to_string(), slot);
        Some(entry)
    }

    /// Drop a discovery slot after a failure
    pub fn rollback(&mut self, key: &str) {
        if self.discovery.remove(key).is_some() {
            tracing::debug!("rollback {}", key);
        }
    }

    /// Replace a slot with a poisoned placeholder
    pub fn poison(&mut self, partition: Partition, key: &str, error: LoaderError) {
        tracing::debug!("poison {} in {}", key, partition);
        self.map_mut(partition)
            .insert(key.to_string(), Slot::Poisoned(error));
    }

    /// Remove a key from every partition
    pub fn invalidate(&mut self, key: &str) -> bool {
        let a = self.legacy.remove(key).is_some();
        let b = self.declarative.remove(key).is_some();
        let c = self.discovery.remove(key).is_some();
        a || b || c
    }

    /// Builtin entry by name
    pub fn builtin(&self, name: &str) -> Option<EntryRef> {
        self.builtins.get(name).cloned()
    }

    /// Store a builtin entry
    pub fn set_builtin(&mut self, name: impl Into<String>, entry: EntryRef) {
        self.builtins.insert(name.into(), entry);
    }

    /// Cached keys in a partition, sorted
    pub fn keys(&self, partition: Partition) -> Vec<String> {
        let mut keys: Vec<String> = self.map(partition).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of slots in a partition
    pub fn len(&self, partition: Partition) -> usize {
        self.map(partition).len()
    }

    /// Whether every partition is empty
    pub fn is_empty(&self) -> bool {
        self.legacy.is_empty() && self.declarative.is_empty() && self.discovery.is_empty()
    }

    /// Keys per partition
    pub fn snapshot(&self) -> CacheSnapshot {
        let mut poisoned: Vec<String> = [&self.legacy, &self.declarative, &self.discovery]
            .into_iter()
            .flat_map(|map| map.iter())
            .filter(|(_, slot)| slot.is_poisoned())
            .map(|(key, _)| key.clone())
            .collect();
        poisoned.sort();

        CacheSnapshot {
            legacy: self.keys(Partition::Legacy),
            declarative: self.keys(Partition::Declarative),
            discovery: self.keys(Partition::Discovery),
            poisoned,
        }
    }

    /// Clear every partition and the main markers
    pub fn clear(&mut self) {
        self.legacy.clear();
        self.declarative.clear();
        self.discovery.clear();
        self.main = None;
        self.legacy_main = None;
    }
}
