// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - resolves, classifies, compiles and caches modules
//!
//! Every request moves through
//! `Resolving -> Classifying -> (CacheHit | Compiling) -> Linking -> Done`,
//! dropping into `Failed` from any step. An entry is stored in its cache
//! partition as [`Slot::Loading`] *before* its compiler runs, so a circular
//! request observes the partially loaded entry instead of recursing.

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::module_system::cache::{cache_key, split_query, CacheSnapshot, LoaderState, Partition, Slot};
use crate::module_system::code_cache::{digest, CodeCache, DirCodeCache};
use crate::module_system::compiler::{Compiler, CompilerRegistry};
use crate::module_system::dispatch::dispatch;
use crate::module_system::entry::{Entry, EntryRef, Format};
use crate::module_system::package::{ManifestReader, PackageCache, PackageContext, PackageJsonReader};
use crate::module_system::resolver::{ModuleResolver, ResolveResult};
use crate::module_system::source::{FsSourceReader, SourceReader};
use crate::module_system::syntax::{self, Program};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-request load state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Turning the specifier into a path
    Resolving,
    /// Picking the cache partition
    Classifying,
    /// Reusing a cached entry
    CacheHit,
    /// Running the compiler
    Compiling,
    /// Recording graph edges
    Linking,
    /// Finished
    Done,
    /// Failed; absorbing
    Failed,
}

/// Outcome of partition selection
enum Lookup {
    /// Reuse the cached entry as-is
    Hit(EntryRef),
    /// Entry was only parsed; evaluate it in the given partition
    Evaluate(Partition, EntryRef),
    /// No slot; create one in the given partition
    Miss(Partition),
}

/// What the loader knows about the requesting module
struct Referrer {
    entry: EntryRef,
    filename: PathBuf,
    format: Format,
    package: Arc<PackageContext>,
    paths: Vec<PathBuf>,
}

impl Referrer {
    fn of(entry: &EntryRef) -> Self {
        let e = entry.read();
        Self {
            entry: EntryRef::clone(entry),
            filename: e.module.filename.clone(),
            format: e.format(),
            package: Arc::clone(&e.package),
            paths: e.module.paths.clone(),
        }
    }

    fn is_mjs(&self) -> bool {
        self.filename.extension().is_some_and(|ext| ext == "mjs")
    }
}

/// Module loader
pub struct ModuleLoader {
    resolver: ModuleResolver,
    packages: PackageCache,
    compilers: CompilerRegistry,
    state: LoaderState,
    source_reader: Box<dyn SourceReader>,
    code_cache: Option<Box<dyn CodeCache>>,
    builtin_exports: FxHashMap<String, Value>,
    sources: FxHashMap<PathBuf, Arc<str>>,
    programs: FxHashMap<PathBuf, Arc<Program>>,
}

impl ModuleLoader {
    /// Create a loader with default configuration
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    /// Create a loader from configuration
    pub fn with_config(config: LoaderConfig) -> Self {
        let code_cache = config
            .cache_dir
            .as_ref()
            .map(|dir| Box::new(DirCodeCache::new(dir)) as Box<dyn CodeCache>);

        Self {
            resolver: ModuleResolver::new(&config),
            packages: PackageCache::new(Box::new(PackageJsonReader), config.default_options),
            compilers: CompilerRegistry::new(),
            state: LoaderState::new(),
            source_reader: Box::new(FsSourceReader),
            code_cache,
            builtin_exports: FxHashMap::default(),
            sources: FxHashMap::default(),
            programs: FxHashMap::default(),
        }
    }

    /// Replace the manifest reader
    pub fn with_manifest_reader(mut self, reader: impl ManifestReader + 'static) -> Self {
        let defaults = self.packages.default_context().options;
        self.packages = PackageCache::new(Box::new(reader), defaults);
        self
    }

    /// Replace the source reader
    pub fn with_source_reader(mut self, reader: impl SourceReader + 'static) -> Self {
        self.source_reader = Box::new(reader);
        self
    }

    /// Replace (or remove) the code cache
    pub fn with_code_cache(mut self, cache: Option<Box<dyn CodeCache>>) -> Self {
        self.code_cache = cache;
        self
    }

    /// Register a compiler for an extension (with leading dot)
    pub fn register_compiler(&mut self, extension: &str, compiler: Arc<dyn Compiler>) {
        self.compilers.register(extension, compiler);
    }

    /// Register a builtin module and its exports
    pub fn register_builtin(&mut self, name: &str, exports: Value) {
        self.resolver.add_builtin(name);
        self.builtin_exports.insert(name.to_string(), exports.clone());
        if let Some(entry) = self.state.builtin(name) {
            entry.write().module.exports = exports;
        }
    }

    /// Load a module
    ///
    /// `parent` is the requesting entry (`None` at the graph root). Relative
    /// specifiers without a parent resolve against the working directory.
    pub fn load(&mut self, request: &str, parent: Option<&EntryRef>, is_main: bool) -> Result<EntryRef> {
        tracing::trace!("{} -> {:?}", request, LoadState::Resolving);
        let result = self.load_inner(request, parent, is_main);
        match &result {
            Ok(_) => tracing::trace!("{} -> {:?}", request, LoadState::Done),
            Err(e) => tracing::trace!("{} -> {:?}: {}", request, LoadState::Failed, e),
        }
        result
    }

    /// Parse-only pass: classify the graph reachable from `request` without
    /// evaluating it. Ambiguous files are left in the discovery partition
    /// for a later [`load`](Self::load) to adopt.
    pub fn discover(&mut self, request: &str, parent: Option<&EntryRef>) -> Result<EntryRef> {
        let previous = std::mem::replace(&mut self.state.parsing, true);
        let result = self.load(request, parent, false);
        self.state.parsing = previous;
        result
    }

    /// Resolve a request to its cache key without loading it
    ///
    /// Builtins resolve to their bare name.
    pub fn resolve(&mut self, request: &str, parent: Option<&EntryRef>) -> Result<String> {
        let referrer = parent.map(Referrer::of);
        let (specifier, query) = split_query(request);
        match self.resolve_request(specifier, referrer.as_ref(), false)? {
            ResolveResult::BuiltIn(name) => Ok(name),
            ResolveResult::File(path) => Ok(cache_key(&path, query)),
        }
    }

    fn load_inner(&mut self, request: &str, parent: Option<&EntryRef>, is_main: bool) -> Result<EntryRef> {
        let referrer = parent.map(Referrer::of);
        let (specifier, query) = split_query(request);

        let filename = match self.resolve_request(specifier, referrer.as_ref(), is_main)? {
            ResolveResult::BuiltIn(name) => {
                let entry = self.builtin(&name);
                link(referrer.as_ref(), request, &entry);
                return Ok(entry);
            }
            ResolveResult::File(path) => path,
        };

        let key = cache_key(&filename, query);
        let package = self.packages.context_for_file(&filename);
        let unexposed = package.is_unexposed();
        let fixed = Format::from_path(&filename);
        tracing::trace!("{} -> {:?}", key, LoadState::Classifying);

        let (partition, entry) = match self.classify(&key, fixed, unexposed)? {
            Lookup::Hit(entry) => {
                tracing::trace!("{} -> {:?}", key, LoadState::CacheHit);
                link(referrer.as_ref(), request, &entry);
                return Ok(entry);
            }
            Lookup::Evaluate(partition, entry) => {
                self.state.set(partition, key.as_str(), Slot::Loading(EntryRef::clone(&entry)));
                (partition, entry)
            }
            Lookup::Miss(partition) => {
                let entry = Entry::new(
                    key.as_str(),
                    filename.as_path(),
                    fixed.unwrap_or(Format::Legacy),
                    package,
                )
                .into_ref();
                if let Some(referrer) = &referrer {
                    entry.write().set_parent(&referrer.entry);
                }
                self.state.set(partition, key.as_str(), Slot::Loading(EntryRef::clone(&entry)));
                (partition, entry)
            }
        };

        if is_main {
            entry.write().module.id = ".".to_string();
            self.state.main = Some(EntryRef::clone(&entry));
            self.state.legacy_main = Some(EntryRef::clone(&entry));
        }

        tracing::trace!("{} -> {:?} in {}", key, LoadState::Compiling, partition);
        if let Err(e) = dispatch(self, &entry, &filename) {
            if partition.is_committed() {
                self.state.poison(partition, &key, e.clone());
            } else {
                self.state.rollback(&key);
            }
            return Err(e);
        }

        let format = entry.read().format();
        if partition == Partition::Discovery && !self.state.parsing {
            let to = if unexposed && format == Format::Declarative {
                Partition::Declarative
            } else {
                Partition::Legacy
            };
            self.state.commit(&key, to);
            self.state.finish(to, &key);
        } else {
            self.state.finish(partition, &key);
        }

        tracing::trace!("{} -> {:?}", key, LoadState::Linking);
        link(referrer.as_ref(), request, &entry);

        if !self.state.parsing {
            if is_main && unexposed && format == Format::Declarative {
                tracing::debug!("main module {} is not visible to legacy modules", key);
                self.state.legacy_main = None;
            }
            if let Some(referrer) = &referrer {
                if format == Format::Legacy
                    && referrer.format == Format::Declarative
                    && referrer.package.is_unexposed()
                {
                    entry.write().clear_parent();
                }
            }
        }

        Ok(entry)
    }

    /// Pick the partition governing `key`
    fn classify(&mut self, key: &str, fixed: Option<Format>, unexposed: bool) -> Result<Lookup> {
        if fixed == Some(Format::Declarative) || self.state.has(Partition::Declarative, key) {
            return self.lookup(Partition::Declarative, key);
        }

        if self.state.has(Partition::Legacy, key) {
            return self.lookup(Partition::Legacy, key);
        }

        if let Some(slot) = self.state.get(Partition::Discovery, key) {
            let entry = slot.entry()?;
            if slot.is_loading() || self.state.parsing {
                return Ok(Lookup::Hit(entry));
            }

            // Adopt the parsed entry instead of compiling the file again
            let to = if unexposed && entry.read().format() == Format::Declarative {
                Partition::Declarative
            } else {
                Partition::Legacy
            };
            tracing::debug!("adopting {} from discovery", key);
            self.state.commit(key, to);
            return self.lookup(to, key);
        }

        Ok(Lookup::Miss(match fixed {
            Some(_) => Partition::Legacy,
            None => Partition::Discovery,
        }))
    }

    fn lookup(&self, partition: Partition, key: &str) -> Result<Lookup> {
        match self.state.get(partition, key) {
            None => Ok(Lookup::Miss(partition)),
            Some(Slot::Poisoned(e)) => Err(e.clone()),
            Some(Slot::Loading(entry)) => {
                tracing::debug!("circular request for {} observes a partial module", key);
                Ok(Lookup::Hit(EntryRef::clone(entry)))
            }
            Some(Slot::Ready(entry)) => {
                if !entry.read().is_loaded() && !self.state.parsing {
                    Ok(Lookup::Evaluate(partition, EntryRef::clone(entry)))
                } else {
                    Ok(Lookup::Hit(EntryRef::clone(entry)))
                }
            }
        }
    }

    /// Resolve with the legacy path fallback for referrers whose package enables it
    fn resolve_request(
        &self,
        specifier: &str,
        referrer: Option<&Referrer>,
        is_main: bool,
    ) -> Result<ResolveResult> {
        let filename = referrer.map(|r| r.filename.as_path());
        let format = referrer.map_or(Format::Legacy, |r| r.format);

        let err = match self.resolver.resolve(specifier, filename, format, is_main, &[]) {
            Ok(resolved) => return Ok(resolved),
            Err(e) => e,
        };

        match referrer {
            Some(r) if r.package.options.cjs.paths && !r.is_mjs() => {
                let search = if r.paths.is_empty() {
                    let dir = r.filename.parent().unwrap_or(Path::new("/"));
                    self.resolver.legacy_search_paths(dir)
                } else {
                    r.paths.clone()
                };
                tracing::debug!("retrying '{}' with legacy search paths", specifier);
                self.resolver
                    .resolve(specifier, filename, Format::Legacy, is_main, &search)
                    .map_err(|_| err)
            }
            _ => Err(err),
        }
    }

    fn builtin(&mut self, name: &str) -> EntryRef {
        if let Some(entry) = self.state.builtin(name) {
            return entry;
        }
        let mut entry = Entry::new(name, name, Format::Legacy, self.packages.default_context());
        if let Some(exports) = self.builtin_exports.get(name) {
            entry.module.exports = exports.clone();
        }
        entry.module.loaded = true;
        let entry = entry.into_ref();
        self.state.set_builtin(name, EntryRef::clone(&entry));
        entry
    }

    pub(crate) fn source_for(&mut self, filename: &Path) -> Result<Arc<str>> {
        if let Some(source) = self.sources.get(filename) {
            return Ok(Arc::clone(source));
        }
        let source: Arc<str> = self.source_reader.read_source(filename)?.into();
        self.sources.insert(filename.to_path_buf(), Arc::clone(&source));
        Ok(source)
    }

    pub(crate) fn program_for(&mut self, filename: &Path) -> Result<Arc<Program>> {
        if let Some(program) = self.programs.get(filename) {
            return Ok(Arc::clone(program));
        }

        let source = self.source_for(filename)?;
        let hash = digest(&source);
        let cached = self.code_cache.as_ref().and_then(|c| c.get(filename, &hash));
        let program = match cached {
            Some(program) => program,
            None => {
                let program = syntax::parse(&source)
                    .map_err(|e| LoaderError::compile(filename, e.to_string()))?;
                if let Some(cache) = &self.code_cache {
                    cache.set(filename, &hash, &program);
                }
                program
            }
        };

        let program = Arc::new(program);
        self.programs.insert(filename.to_path_buf(), Arc::clone(&program));
        Ok(program)
    }

    /// Evict a key from every partition and forget the file's source
    pub fn invalidate(&mut self, key: &str) -> bool {
        let (path, _) = split_query(key);
        self.sources.remove(Path::new(path));
        self.programs.remove(Path::new(path));
        self.state.invalidate(key)
    }

    /// Overwrite a slot with a real entry, clearing any poison
    pub fn replace_cached(&mut self, partition: Partition, key: &str, entry: EntryRef) {
        self.state.set(partition, key, Slot::Ready(entry));
    }

    /// Cached slot for a key
    pub fn cached(&self, partition: Partition, key: &str) -> Option<&Slot> {
        self.state.get(partition, key)
    }

    /// Loader state, for inspection
    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    /// Keys held by each cache partition
    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.state.snapshot()
    }

    /// Main module as seen by the loader
    pub fn main_module(&self) -> Option<EntryRef> {
        self.state.main.clone()
    }

    /// Main module as seen by legacy modules
    pub fn legacy_main_module(&self) -> Option<EntryRef> {
        self.state.legacy_main.clone()
    }

    /// Package context for files in `dir`
    pub fn package_context(&mut self, dir: &Path) -> Arc<PackageContext> {
        self.packages.context_for(dir)
    }

    /// Whether a parse-only pass is running
    pub fn is_parsing(&self) -> bool {
        self.state.parsing
    }

    /// The path resolver
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// The compiler registry
    pub fn compilers(&self) -> &CompilerRegistry {
        &self.compilers
    }

    /// Clear every cache partition and the source caches
    pub fn clear_cache(&mut self) {
        self.state.clear();
        self.sources.clear();
        self.programs.clear();
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn link(referrer: Option<&Referrer>, request: &str, child: &EntryRef) {
    if let Some(referrer) = referrer {
        referrer
            .entry
            .write()
            .add_child(request, EntryRef::clone(child));
    }
}
