// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module loader

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving or loading modules
///
/// Errors are cheap to clone: a poisoned cache slot hands out a copy of the
/// original error on every read.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// No file matched the request
    #[error("Cannot find module '{request}' imported from {referrer}")]
    ModuleNotFound {
        /// The specifier as written
        request: String,
        /// Path of the requesting module, or `<root>`
        referrer: String,
    },

    /// Syntax or evaluation error raised by a compiler
    #[error("{message}\n    at {}", path.display())]
    Compile {
        /// File being compiled
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Source reader failure
    #[error("File system error reading {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A manifest existed but could not be parsed
    #[error("Invalid manifest {}: {message}", path.display())]
    Manifest {
        /// Manifest path
        path: PathBuf,
        /// Parse error
        message: String,
    },

    /// The file resolved but no compiler can handle it
    #[error("Cannot load '{}': {reason}", path.display())]
    UnsupportedFormat {
        /// Resolved path
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },
}

impl LoaderError {
    /// Create a module not found error
    pub fn module_not_found(request: impl Into<String>, referrer: Option<&Path>) -> Self {
        Self::ModuleNotFound {
            request: request.into(),
            referrer: referrer
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<root>".to_string()),
        }
    }

    /// Create a compile error
    pub fn compile(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Compile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap an I/O error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Whether this error came from resolution
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = LoaderError::module_not_found("./missing", Some(Path::new("/app/main.js")));
        assert_eq!(
            err.to_string(),
            "Cannot find module './missing' imported from /app/main.js"
        );
        assert!(err.is_not_found());

        let root = LoaderError::module_not_found("lodash", None);
        assert!(root.to_string().ends_with("<root>"));
    }

    #[test]
    fn test_clone_keeps_io_source() {
        let err = LoaderError::io(
            "/app/a.js",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
        match (err, copy) {
            (LoaderError::Io { source: a, .. }, LoaderError::Io { source: b, .. }) => {
                assert!(Arc::ptr_eq(&a, &b));
            }
            _ => panic!("expected io errors"),
        }
    }
}
