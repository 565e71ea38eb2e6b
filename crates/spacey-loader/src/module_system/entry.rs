// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module graph entries

use crate::module_system::package::PackageContext;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Shared handle to an entry
pub type EntryRef = Arc<RwLock<Entry>>;

/// Module format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// CommonJS-style `require` / `exports`
    Legacy,
    /// ESM-style static `import` / `export`
    Declarative,
}

impl Format {
    /// Format fixed by a file's extension, if any
    ///
    /// `None` means the format is only known after compiling the file.
    /// Extensionless files are always legacy.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mjs") => Some(Format::Declarative),
            Some("cjs") | Some("json") | None => Some(Format::Legacy),
            Some(_) => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Legacy => write!(f, "legacy"),
            Format::Declarative => write!(f, "declarative"),
        }
    }
}

/// The module object owned by an entry
#[derive(Debug, Clone)]
pub struct Module {
    /// Module id: the cache key, or `"."` for the main module
    pub id: String,
    /// Resolved file name
    pub filename: PathBuf,
    /// Exported values
    pub exports: Value,
    /// Whether evaluation finished
    pub loaded: bool,
    /// Search paths for bare specifiers
    pub paths: Vec<PathBuf>,
}

impl Module {
    fn new(id: String, filename: PathBuf) -> Self {
        Self {
            id,
            filename,
            exports: Value::Object(Default::default()),
            loaded: false,
            paths: Vec::new(),
        }
    }

    /// Set a named export, turning non-object exports into an object
    pub fn set_export(&mut self, name: &str, value: Value) {
        if !self.exports.is_object() {
            self.exports = Value::Object(Default::default());
        }
        if let Value::Object(map) = &mut self.exports {
            map.insert(name.to_string(), value);
        }
    }

    /// Get a named export
    pub fn get_export(&self, name: &str) -> Option<&Value> {
        self.exports.get(name)
    }
}

/// A module plus its place in the graph
#[derive(Debug)]
pub struct Entry {
    key: String,
    format: Format,
    parsed: bool,
    /// The module object
    pub module: Module,
    /// Owning package context
    pub package: Arc<PackageContext>,
    parent: Option<Weak<RwLock<Entry>>>,
    children: FxHashMap<String, EntryRef>,
}

impl Entry {
    /// Create a new, unloaded entry
    pub fn new(
        key: impl Into<String>,
        filename: impl Into<PathBuf>,
        format: Format,
        package: Arc<PackageContext>,
    ) -> Self {
        let key = key.into();
        Self {
            module: Module::new(key.clone(), filename.into()),
            key,
            format,
            parsed: false,
            package,
            parent: None,
            children: FxHashMap::default(),
        }
    }

    /// Wrap into a shared handle
    pub fn into_ref(self) -> EntryRef {
        Arc::new(RwLock::new(self))
    }

    /// Cache key this entry is stored under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current format tag
    pub fn format(&self) -> Format {
        self.format
    }

    /// Reclassify the entry; ignored once the module has loaded
    pub fn set_format(&mut self, format: Format) {
        if self.module.loaded {
            tracing::warn!("format of {} is fixed once loaded", self.key);
            return;
        }
        self.format = format;
    }

    /// Whether evaluation finished
    pub fn is_loaded(&self) -> bool {
        self.module.loaded
    }

    /// Whether the entry was classified by a parse-only pass
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    pub(crate) fn mark_parsed(&mut self) {
        self.parsed = true;
    }

    /// The requesting entry, if still linked
    pub fn parent(&self) -> Option<EntryRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Link to the requesting entry
    pub fn set_parent(&mut self, parent: &EntryRef) {
        self.parent = Some(Arc::downgrade(parent));
    }

    /// Sever the parent link
    pub fn clear_parent(&mut self) {
        self.parent = None;
    }

    /// Child entries keyed by the request string that loaded them
    pub fn children(&self) -> &FxHashMap<String, EntryRef> {
        &self.children
    }

    /// Child loaded by `request`
    pub fn child(&self, request: &str) -> Option<EntryRef> {
        self.children.get(request).cloned()
    }

    /// Record a child edge
    pub fn add_child(&mut self, request: impl Into<String>, child: EntryRef) {
        self.children.insert(request.into(), child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Arc<PackageContext> {
        Arc::new(PackageContext {
            dir: None,
            options: Default::default(),
        })
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a.mjs")), Some(Format::Declarative));
        assert_eq!(Format::from_path(Path::new("a.cjs")), Some(Format::Legacy));
        assert_eq!(Format::from_path(Path::new("a.json")), Some(Format::Legacy));
        assert_eq!(Format::from_path(Path::new("bin/cli")), Some(Format::Legacy));
        assert_eq!(Format::from_path(Path::new("a.js")), None);
        assert_eq!(Format::from_path(Path::new("a.ts")), None);
    }

    #[test]
    fn test_format_fixed_after_load() {
        let mut entry = Entry::new("/a.js", "/a.js", Format::Legacy, ctx());
        entry.set_format(Format::Declarative);
        assert_eq!(entry.format(), Format::Declarative);

        entry.module.loaded = true;
        entry.set_format(Format::Legacy);
        assert_eq!(entry.format(), Format::Declarative);
    }

    #[test]
    fn test_parent_is_weak() {
        let child = Entry::new("/b.js", "/b.js", Format::Legacy, ctx()).into_ref();
        {
            let parent = Entry::new("/a.js", "/a.js", Format::Legacy, ctx()).into_ref();
            child.write().set_parent(&parent);
            assert!(child.read().parent().is_some());
        }
        assert!(child.read().parent().is_none());
    }

    #[test]
    fn test_set_export_replaces_scalar() {
        let mut entry = Entry::new("/a.js", "/a.js", Format::Legacy, ctx());
        entry.module.exports = json!(42);
        entry.module.set_export("x", json!(1));
        assert_eq!(entry.module.exports, json!({ "x": 1 }));
        assert_eq!(entry.module.get_export("x"), Some(&json!(1)));
    }
}
