// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dual-format module system
//!
//! Lets legacy (CommonJS-style) and declarative (ESM-style) modules share
//! one dependency graph.
//!
//! ## Legacy
//! - `require()` / `module.exports` / `exports`
//! - Synchronous, circular requires observe partial exports
//! - `.cjs`, `.json` and extensionless files
//!
//! ## Declarative
//! - `import` / `export` declarations
//! - `.mjs` files, and `.js` files depending on the package `mode`
//! - Separate cache partition unless the package sets `cjs.cache`

mod cache;
pub mod code_cache;
pub mod compiler;
mod dispatch;
mod entry;
mod loader;
pub mod package;
mod require;
pub mod resolver;
mod source;
pub mod syntax;

pub use cache::{cache_key, split_query, CacheSnapshot, LoaderState, Partition, Slot};
pub use code_cache::{CodeCache, DirCodeCache};
pub use compiler::{
    CompileContext, Compiler, CompilerRegistry, DeclarativeCompiler, JsonCompiler, LegacyCompiler,
    NativeCompiler, ScriptCompiler,
};
pub use entry::{Entry, EntryRef, Format, Module};
pub use loader::{LoadState, ModuleLoader};
pub use package::{CjsOptions, ManifestReader, Mode, PackageCache, PackageContext, PackageJsonReader, PackageOptions};
pub use require::{require, require_cache, require_main, require_resolve};
pub use resolver::{ModuleResolver, ResolveResult};
pub use source::{FsSourceReader, SourceReader};
