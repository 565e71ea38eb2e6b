// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-loader
//!
//! Module resolution and loading core for Spacey, letting legacy
//! (CommonJS-style) and declarative (ESM-style) modules live in one
//! dependency graph.
//!
//! The loader:
//!
//! - Resolves specifiers the Node.js way (extensions, directory index files,
//!   `node_modules` walks, symlink realization)
//! - Reads per-package interop options from the nearest `package.json`
//! - Decides per file which format it is and which cache partition owns it
//! - Keeps the `?query` / `#fragment` of a specifier as a distinct cache slot
//! - Survives circular dependencies by caching in-progress modules
//! - Poisons cache slots of modules that failed to load
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_loader::{ModuleLoader, Format};
//!
//! let mut loader = ModuleLoader::new();
//! let entry = loader.load("/app/main.js", None, true)?;
//! assert_eq!(entry.read().format(), Format::Legacy);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod module_system;

// Re-exports
pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use module_system::{Entry, EntryRef, Format, ModuleLoader, Partition, Slot};

/// Version of the loader
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
