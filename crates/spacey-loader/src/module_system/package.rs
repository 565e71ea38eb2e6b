// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-directory package contexts
//!
//! A file's package context comes from the nearest ancestor directory that
//! holds a manifest. Lookups are memoized for every directory on the walked
//! path, so each directory is inspected at most once per loader.

use crate::error::LoaderError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How `.js` files in a package are classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Only `.mjs` files are declarative
    Strict,
    /// `.js` files with import/export statements are declarative
    #[default]
    Auto,
    /// Every `.js` file is declarative
    All,
}

/// Legacy-format interop toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CjsOptions {
    /// Declarative modules also populate the legacy-visible cache
    pub cache: bool,
    /// Legacy modules may search global module folders
    pub paths: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CjsField {
    All(bool),
    Each(CjsOptions),
}

impl From<CjsField> for CjsOptions {
    fn from(field: CjsField) -> Self {
        match field {
            CjsField::All(on) => CjsOptions { cache: on, paths: on },
            CjsField::Each(options) => options,
        }
    }
}

fn deserialize_cjs<'de, D>(deserializer: D) -> std::result::Result<CjsOptions, D::Error>
where
    D: serde::Deserializer<'de>,
{
    CjsField::deserialize(deserializer).map(Into::into)
}

/// Interop options for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    /// `.js` classification mode
    pub mode: Mode,
    /// Legacy interop toggles
    #[serde(deserialize_with = "deserialize_cjs")]
    pub cjs: CjsOptions,
}

/// Options in effect for every file below a manifest directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContext {
    /// Directory holding the manifest; `None` for the default context
    pub dir: Option<PathBuf>,
    /// Interop options
    pub options: PackageOptions,
}

impl PackageContext {
    /// Whether declarative modules in this package stay out of the legacy cache
    pub fn is_unexposed(&self) -> bool {
        !self.options.cjs.cache
    }
}

/// Reads package options from a directory
pub trait ManifestReader: Send + Sync {
    /// Options for `dir`, or `None` when the directory holds no manifest
    fn read_manifest(&self, dir: &Path) -> Option<PackageOptions>;
}

/// Reads the `"spacey"` field of `package.json`
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageJsonReader;

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    spacey: Option<PackageOptions>,
}

impl PackageJsonReader {
    fn parse(path: &Path) -> Result<Option<PackageOptions>, LoaderError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LoaderError::io(path, e)),
        };
        let pkg: PackageJson =
            serde_json::from_str(&content).map_err(|e| LoaderError::Manifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Some(pkg.spacey.unwrap_or_default()))
    }
}

impl ManifestReader for PackageJsonReader {
    fn read_manifest(&self, dir: &Path) -> Option<PackageOptions> {
        let path = dir.join("package.json");
        match Self::parse(&path) {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!("ignoring manifest: {}", e);
                None
            }
        }
    }
}

/// Memo table of package contexts by directory
pub struct PackageCache {
    reader: Box<dyn ManifestReader>,
    default: Arc<PackageContext>,
    by_dir: FxHashMap<PathBuf, Arc<PackageContext>>,
}

impl PackageCache {
    /// Create a cache over `reader`, falling back to `defaults`
    pub fn new(reader: Box<dyn ManifestReader>, defaults: PackageOptions) -> Self {
        Self {
            reader,
            default: Arc::new(PackageContext {
                dir: None,
                options: defaults,
            }),
            by_dir: FxHashMap::default(),
        }
    }

    /// The context used when no manifest is found
    pub fn default_context(&self) -> Arc<PackageContext> {
        Arc::clone(&self.default)
    }

    /// Context for files in `dir`
    pub fn context_for(&mut self, dir: &Path) -> Arc<PackageContext> {
        if let Some(ctx) = self.by_dir.get(dir) {
            return Arc::clone(ctx);
        }

        let mut walked = Vec::new();
        let mut found = None;
        let mut current = Some(dir);

        while let Some(d) = current {
            if let Some(ctx) = self.by_dir.get(d) {
                found = Some(Arc::clone(ctx));
                break;
            }
            walked.push(d.to_path_buf());
            if let Some(options) = self.reader.read_manifest(d) {
                tracing::debug!("package context at {}", d.display());
                found = Some(Arc::new(PackageContext {
                    dir: Some(d.to_path_buf()),
                    options,
                }));
                break;
            }
            current = d.parent();
        }

        let ctx = found.unwrap_or_else(|| Arc::clone(&self.default));
        for d in walked {
            self.by_dir.insert(d, Arc::clone(&ctx));
        }
        ctx
    }

    /// Context for the directory containing `file`
    pub fn context_for_file(&mut self, file: &Path) -> Arc<PackageContext> {
        match file.parent() {
            Some(dir) => self.context_for(dir),
            None => self.default_context(),
        }
    }
}
