// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader dispatch - runs the compiler registered for a file

use crate::error::Result;
use crate::module_system::compiler::CompileContext;
use crate::module_system::entry::{EntryRef, Format};
use crate::module_system::loader::ModuleLoader;
use std::path::{Path, PathBuf};

/// Compile `entry` from `filename`
///
/// Sets the module's filename and search paths, runs the compiler picked by
/// extension, then marks the module loaded (or parsed, in a parse-only pass).
pub(crate) fn dispatch(loader: &mut ModuleLoader, entry: &EntryRef, filename: &Path) -> Result<()> {
    let compiler = loader.compilers().for_path(filename);
    let parsing = loader.is_parsing();

    let before = {
        let mut e = entry.write();
        e.module.filename = filename.to_path_buf();
        if e.module.paths.is_empty() {
            let cjs_paths = e.package.options.cjs.paths;
            e.module.paths = search_paths(loader, cjs_paths, e.format(), filename);
        }
        e.format()
    };

    tracing::debug!("compiling {}", filename.display());
    let mut cx = CompileContext::new(loader, EntryRef::clone(entry), filename);
    compiler.compile(&mut cx)?;

    let mut e = entry.write();
    let after = e.format();
    if after != before {
        let cjs_paths = e.package.options.cjs.paths;
        e.module.paths = search_paths(loader, cjs_paths, after, filename);
    }
    if parsing {
        e.mark_parsed();
    } else {
        e.module.loaded = true;
    }
    Ok(())
}

/// Search paths for a module: the legacy walk when the package enables
/// path searching for legacy modules, the declarative walk otherwise
fn search_paths(loader: &ModuleLoader, cjs_paths: bool, format: Format, filename: &Path) -> Vec<PathBuf> {
    let dir = filename.parent().unwrap_or(Path::new("/"));
    if cjs_paths && format == Format::Legacy {
        loader.resolver().legacy_search_paths(dir)
    } else {
        crate::module_system::resolver::node_module_paths(dir)
    }
}
