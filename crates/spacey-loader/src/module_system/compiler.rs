// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-extension compilers
//!
//! A compiler turns a module's source into exports. Compilers call back into
//! the loader through [`CompileContext::require`] for every dependency, so a
//! dependency graph is loaded depth-first on the caller's stack.

use crate::error::{LoaderError, Result};
use crate::module_system::entry::{EntryRef, Format};
use crate::module_system::loader::ModuleLoader;
use crate::module_system::package::Mode;
use crate::module_system::syntax::{Expr, Program, Statement};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a compiler can see while compiling one module
pub struct CompileContext<'a> {
    loader: &'a mut ModuleLoader,
    entry: EntryRef,
    filename: PathBuf,
}

impl<'a> CompileContext<'a> {
    pub(crate) fn new(loader: &'a mut ModuleLoader, entry: EntryRef, filename: &Path) -> Self {
        Self {
            loader,
            entry,
            filename: filename.to_path_buf(),
        }
    }

    /// The entry being compiled
    pub fn entry(&self) -> &EntryRef {
        &self.entry
    }

    /// Resolved file name
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Whether this is a parse-only pass (no evaluation)
    pub fn is_parsing(&self) -> bool {
        self.loader.is_parsing()
    }

    /// Classification mode of the owning package
    pub fn mode(&self) -> Mode {
        self.entry.read().package.options.mode
    }

    /// Source text, read once per file
    pub fn source(&mut self) -> Result<Arc<str>> {
        self.loader.source_for(&self.filename)
    }

    /// Scanned program, shared by every cache key of the file
    pub fn program(&mut self) -> Result<Arc<Program>> {
        self.loader.program_for(&self.filename)
    }

    /// Load a dependency of this module
    pub fn require(&mut self, request: &str) -> Result<EntryRef> {
        let parent = EntryRef::clone(&self.entry);
        self.loader.load(request, Some(&parent), false)
    }

    /// Set the entry's format tag
    pub fn set_format(&self, format: Format) {
        self.entry.write().set_format(format);
    }

    /// Build a compile error for this file
    pub fn error(&self, message: impl Into<String>) -> LoaderError {
        LoaderError::compile(&self.filename, message)
    }
}

/// A module compiler
pub trait Compiler: Send + Sync {
    /// Compile the module behind `cx`, filling its exports
    fn compile(&self, cx: &mut CompileContext<'_>) -> Result<()>;
}

/// Extension -> compiler table
#[derive(Clone)]
pub struct CompilerRegistry {
    by_extension: FxHashMap<String, Arc<dyn Compiler>>,
    fallback: Arc<dyn Compiler>,
}

impl CompilerRegistry {
    /// Registry with the built-in compilers
    pub fn new() -> Self {
        let mut registry = Self {
            by_extension: FxHashMap::default(),
            fallback: Arc::new(LegacyCompiler),
        };
        registry.register(".js", Arc::new(ScriptCompiler));
        registry.register(".cjs", Arc::new(LegacyCompiler));
        registry.register(".mjs", Arc::new(DeclarativeCompiler));
        registry.register(".json", Arc::new(JsonCompiler));
        registry.register(".node", Arc::new(NativeCompiler));
        registry
    }

    /// Register a compiler for an extension (with leading dot)
    pub fn register(&mut self, extension: impl Into<String>, compiler: Arc<dyn Compiler>) {
        self.by_extension.insert(extension.into(), compiler);
    }

    /// Compiler for a file; unregistered and missing extensions use the legacy fallback
    pub fn for_path(&self, path: &Path) -> Arc<dyn Compiler> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.by_extension.get(&format!(".{}", ext)))
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.by_extension.keys().cloned().collect();
        exts.sort();
        exts
    }
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a dependency's exports, optionally one property of them
fn require_value(cx: &mut CompileContext<'_>, request: &str, property: Option<&str>) -> Result<Value> {
    let child = cx.require(request)?;
    let child = child.read();
    let exports = &child.module.exports;
    Ok(match property {
        Some(name) => exports.get(name).cloned().unwrap_or(Value::Null),
        None => exports.clone(),
    })
}

/// CommonJS-style compiler; the fallback for unknown extensions
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyCompiler;

impl LegacyCompiler {
    fn run(cx: &mut CompileContext<'_>, program: &Program) -> Result<()> {
        cx.set_format(Format::Legacy);

        for statement in &program.statements {
            if let Statement::Import(_) | Statement::Export { .. } = statement {
                let keyword = if matches!(statement, Statement::Import(_)) {
                    "import"
                } else {
                    "export"
                };
                return Err(cx.error(format!(
                    "SyntaxError: Cannot use {} statement outside a module",
                    keyword
                )));
            }
        }

        if cx.is_parsing() {
            for request in program.requests() {
                cx.require(request)?;
            }
            return Ok(());
        }

        for statement in &program.statements {
            match statement {
                Statement::Assign { name, value } => {
                    let value = match value {
                        Expr::Literal(v) => v.clone(),
                        Expr::Require { request, property } => {
                            require_value(cx, request, property.as_deref())?
                        }
                    };
                    let mut entry = cx.entry().write();
                    match name {
                        Some(name) => entry.module.set_export(name, value),
                        None => entry.module.exports = value,
                    }
                }
                Statement::Eval(Expr::Require { request, .. }) => {
                    cx.require(request)?;
                }
                Statement::Eval(Expr::Literal(_)) => {}
                Statement::Throw(message) => return Err(cx.error(format!("Error: {}", message))),
                Statement::Import(_) | Statement::Export { .. } => {}
            }
        }
        Ok(())
    }
}

impl Compiler for LegacyCompiler {
    fn compile(&self, cx: &mut CompileContext<'_>) -> Result<()> {
        let program = cx.program()?;
        Self::run(cx, &program)
    }
}

/// ESM-style compiler
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclarativeCompiler;

impl DeclarativeCompiler {
    fn run(cx: &mut CompileContext<'_>, program: &Program) -> Result<()> {
        cx.set_format(Format::Declarative);

        for statement in &program.statements {
            match statement {
                Statement::Assign { .. } => {
                    return Err(cx.error("ReferenceError: exports is not defined in ES module scope"));
                }
                Statement::Export { value: Expr::Require { .. }, .. }
                | Statement::Eval(Expr::Require { .. }) => {
                    return Err(cx.error("ReferenceError: require is not defined in ES module scope"));
                }
                _ => {}
            }
        }

        // Imports are hoisted above the body
        for statement in &program.statements {
            if let Statement::Import(request) = statement {
                cx.require(request)?;
            }
        }

        if cx.is_parsing() {
            return Ok(());
        }

        for statement in &program.statements {
            match statement {
                Statement::Export { name, value: Expr::Literal(value) } => {
                    cx.entry().write().module.set_export(name, value.clone());
                }
                Statement::Throw(message) => return Err(cx.error(format!("Error: {}", message))),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Compiler for DeclarativeCompiler {
    fn compile(&self, cx: &mut CompileContext<'_>) -> Result<()> {
        let program = cx.program()?;
        Self::run(cx, &program)
    }
}

/// `.js` compiler: picks the format from the package mode and the source
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptCompiler;

impl Compiler for ScriptCompiler {
    fn compile(&self, cx: &mut CompileContext<'_>) -> Result<()> {
        let program = cx.program()?;
        let declarative = match cx.mode() {
            Mode::Strict => false,
            Mode::Auto => program.has_module_syntax(),
            Mode::All => true,
        };
        tracing::debug!(
            "{} detected as {}",
            cx.filename().display(),
            if declarative { Format::Declarative } else { Format::Legacy }
        );

        if declarative {
            DeclarativeCompiler::run(cx, &program)
        } else {
            LegacyCompiler::run(cx, &program)
        }
    }
}

/// JSON compiler: the parsed file becomes the exports
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCompiler;

impl Compiler for JsonCompiler {
    fn compile(&self, cx: &mut CompileContext<'_>) -> Result<()> {
        cx.set_format(Format::Legacy);
        let source = cx.source()?;
        let value: Value = serde_json::from_str(&source)
            .map_err(|e| cx.error(format!("SyntaxError: Unexpected token in JSON: {}", e)))?;
        cx.entry().write().module.exports = value;
        Ok(())
    }
}

/// `.node` addons are rejected without reading the file
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCompiler;

impl Compiler for NativeCompiler {
    fn compile(&self, cx: &mut CompileContext<'_>) -> Result<()> {
        Err(LoaderError::UnsupportedFormat {
            path: cx.filename().to_path_buf(),
            reason: "native addons are not supported".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = CompilerRegistry::new();
        assert_eq!(registry.extensions(), vec![".cjs", ".js", ".json", ".mjs", ".node"]);

        // Every lookup yields something; unknown and missing extensions share the fallback
        let unknown = registry.for_path(Path::new("/a.ts"));
        let none = registry.for_path(Path::new("/bin/cli"));
        assert!(Arc::ptr_eq(&unknown, &none));
        assert!(Arc::ptr_eq(&unknown, &registry.fallback));

        let script = registry.for_path(Path::new("/a.js"));
        assert!(!Arc::ptr_eq(&script, &registry.fallback));
    }

    #[test]
    fn test_register_overrides() {
        let mut registry = CompilerRegistry::new();
        let json: Arc<dyn Compiler> = Arc::new(JsonCompiler);
        registry.register(".data", Arc::clone(&json));
        assert!(Arc::ptr_eq(&registry.for_path(Path::new("x.data")), &json));
    }
}
