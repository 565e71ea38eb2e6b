// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source reading

use crate::error::{LoaderError, Result};
use std::path::Path;

/// Reads module source text
pub trait SourceReader: Send + Sync {
    /// Read the file at `path`
    fn read_source(&self, path: &Path) -> Result<String>;
}

/// Reads from the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceReader;

impl SourceReader for FsSourceReader {
    fn read_source(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))
    }
}
