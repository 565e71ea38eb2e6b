// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration

use crate::error::{LoaderError, Result};
use crate::module_system::resolver::global_paths;
use crate::module_system::PackageOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Built-in module names served without touching the file system
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "crypto",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "process",
    "stream",
    "url",
    "util",
    "vm",
    "zlib",
];

/// Configuration for a [`ModuleLoader`](crate::ModuleLoader)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Keep symlinked paths instead of realizing them
    pub preserve_symlinks: bool,

    /// Same as `preserve_symlinks`, for the main entry point only
    pub preserve_symlinks_main: bool,

    /// Extensions tried after the exact path for legacy referrers
    pub legacy_extensions: Vec<String>,

    /// Extensions tried after the exact path for declarative referrers
    pub declarative_extensions: Vec<String>,

    /// Builtin module names
    pub builtins: Vec<String>,

    /// Global module folders searched by legacy modules with path searching on
    pub global_paths: Vec<PathBuf>,

    /// Directory for the on-disk code cache
    pub cache_dir: Option<PathBuf>,

    /// Options used when no manifest is found
    pub default_options: PackageOptions,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            preserve_symlinks: false,
            preserve_symlinks_main: false,
            legacy_extensions: vec![".js".to_string(), ".json".to_string(), ".cjs".to_string()],
            declarative_extensions: vec![
                ".mjs".to_string(),
                ".js".to_string(),
                ".json".to_string(),
                ".cjs".to_string(),
            ],
            builtins: BUILTIN_MODULES.iter().map(|s| s.to_string()).collect(),
            global_paths: global_paths(),
            cache_dir: None,
            default_options: PackageOptions::default(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a JSON file, filling unset fields with defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| LoaderError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
