// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! On-disk cache of scanned programs
//!
//! The loader never depends on this cache: a miss or any I/O failure just
//! means the source is scanned again. Write failures are never surfaced.

use crate::module_system::syntax::Program;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Hex SHA-256 of a module's source
pub fn digest(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Persistent program cache
pub trait CodeCache: Send + Sync {
    /// Cached program for `path` whose source hashes to `digest`
    fn get(&self, path: &Path, digest: &str) -> Option<Program>;

    /// Store a program; failures are ignored
    fn set(&self, path: &Path, digest: &str, program: &Program);
}

/// Stores programs as JSON files in a directory
#[derive(Debug, Clone)]
pub struct DirCodeCache {
    dir: PathBuf,
}

impl DirCodeCache {
    /// Cache rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, path: &Path, digest: &str) -> PathBuf {
        let name = digest_path(path);
        self.dir.join(format!("{}-{}.json", &name[..16], &digest[..16]))
    }
}

fn digest_path(path: &Path) -> String {
    hex::encode(Sha256::digest(path.to_string_lossy().as_bytes()))
}

impl CodeCache for DirCodeCache {
    fn get(&self, path: &Path, digest: &str) -> Option<Program> {
        let blob = self.blob_path(path, digest);
        let content = std::fs::read_to_string(&blob).ok()?;
        match serde_json::from_str(&content) {
            Ok(program) => {
                tracing::trace!("code cache hit for {}", path.display());
                Some(program)
            }
            Err(e) => {
                tracing::debug!("discarding code cache blob {}: {}", blob.display(), e);
                let _ = std::fs::remove_file(&blob);
                None
            }
        }
    }

    fn set(&self, path: &Path, digest: &str, program: &Program) {
        let blob = self.blob_path(path, digest);
        let result = std::fs::create_dir_all(&self.dir).and_then(|()| {
            let json = serde_json::to_vec(program).map_err(std::io::Error::other)?;
            std::fs::write(&blob, json)
        });
        if let Err(e) = result {
            tracing::debug!("code cache write failed for {}: {}", path.display(), e);
        }
    }
}
