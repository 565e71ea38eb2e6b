// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `require()`-style helpers over a [`ModuleLoader`]

use crate::error::Result;
use crate::module_system::cache::{Partition, Slot};
use crate::module_system::entry::EntryRef;
use crate::module_system::loader::ModuleLoader;
use serde_json::{Map, Value};

/// require() - load a module and return a snapshot of its exports
pub fn require(loader: &mut ModuleLoader, request: &str, parent: Option<&EntryRef>) -> Result<Value> {
    let entry = loader.load(request, parent, false)?;
    let exports = entry.read().module.exports.clone();
    Ok(exports)
}

/// require.resolve() - get the cache key without loading
pub fn require_resolve(loader: &mut ModuleLoader, request: &str, parent: Option<&EntryRef>) -> Result<String> {
    loader.resolve(request, parent)
}

/// require.cache - exports of every module visible to legacy modules
///
/// Declarative modules appear here only when their package exposes them.
/// Poisoned and in-progress slots are skipped.
pub fn require_cache(loader: &ModuleLoader) -> Value {
    let mut obj = Map::new();

    for key in loader.state().keys(Partition::Legacy) {
        if let Some(Slot::Ready(entry)) = loader.cached(Partition::Legacy, &key) {
            obj.insert(key, entry.read().module.exports.clone());
        }
    }

    Value::Object(obj)
}

/// require.main - the main module as seen by legacy modules
pub fn require_main(loader: &ModuleLoader) -> Option<EntryRef> {
    loader.legacy_main_module()
}
