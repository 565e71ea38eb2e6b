// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (Node.js algorithm)

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::module_system::entry::Format;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Result of module resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// Built-in module (fs, path, ...), returned unresolved
    BuiltIn(String),
    /// Absolute file path
    File(PathBuf),
}

/// Module resolver implementing the Node.js resolution algorithm
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    builtins: Vec<String>,
    legacy_extensions: Vec<String>,
    declarative_extensions: Vec<String>,
    global_paths: Vec<PathBuf>,
    preserve_symlinks: bool,
    preserve_symlinks_main: bool,
}

impl ModuleResolver {
    /// Create a resolver from loader configuration
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            builtins: config.builtins.clone(),
            legacy_extensions: config.legacy_extensions.clone(),
            declarative_extensions: config.declarative_extensions.clone(),
            global_paths: config.global_paths.clone(),
            preserve_symlinks: config.preserve_symlinks,
            preserve_symlinks_main: config.preserve_symlinks_main,
        }
    }

    /// Check if a module is a built-in
    pub fn is_builtin(&self, name: &str) -> bool {
        let name = name.strip_prefix("node:").unwrap_or(name);
        self.builtins.iter().any(|b| b == name)
    }

    /// Register an additional builtin name
    pub fn add_builtin(&mut self, name: &str) {
        if !self.is_builtin(name) {
            self.builtins.push(name.to_string());
        }
    }

    /// Search paths used by legacy modules with path searching enabled:
    /// the `node_modules` walk followed by the global folders
    pub fn legacy_search_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths = node_module_paths(dir);
        paths.extend(self.global_paths.iter().cloned());
        paths
    }

    /// Resolve a specifier (without query/fragment) against a referrer
    ///
    /// `referrer_format` picks the extension list; `search_paths` are extra
    /// folders consulted for bare specifiers after the referrer's own
    /// `node_modules` ancestors.
    pub fn resolve(
        &self,
        specifier: &str,
        referrer: Option<&Path>,
        referrer_format: Format,
        is_main: bool,
        search_paths: &[PathBuf],
    ) -> Result<ResolveResult> {
        if self.is_builtin(specifier) {
            let name = specifier.strip_prefix("node:").unwrap_or(specifier);
            return Ok(ResolveResult::BuiltIn(name.to_string()));
        }

        let base = match referrer.and_then(Path::parent) {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        };
        let extensions = match referrer_format {
            Format::Legacy => &self.legacy_extensions,
            Format::Declarative => &self.declarative_extensions,
        };

        let found = if is_path_specifier(specifier) {
            self.resolve_file(&base.join(specifier), extensions)
        } else {
            node_module_paths(&base)
                .iter()
                .chain(search_paths)
                .find_map(|dir| self.resolve_file(&dir.join(specifier), extensions))
        };

        let path = found.ok_or_else(|| LoaderError::module_not_found(specifier, referrer))?;
        let preserve = if is_main {
            self.preserve_symlinks_main
        } else {
            self.preserve_symlinks
        };
        Ok(ResolveResult::File(realize(&path, preserve)))
    }

    /// Exact file, then appended extensions, then directory
    fn resolve_file(&self, path: &Path, extensions: &[String]) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        if let Some(with_ext) = try_extensions(path, extensions) {
            return Some(with_ext);
        }

        if path.is_dir() {
            return self.resolve_directory(path, extensions);
        }

        None
    }

    /// Resolve a directory (package.json main, then index files)
    fn resolve_directory(&self, dir: &Path, extensions: &[String]) -> Option<PathBuf> {
        if let Some(main) = read_main(dir) {
            let main_path = dir.join(main);
            if main_path.is_file() {
                return Some(main_path);
            }
            if let Some(with_ext) = try_extensions(&main_path, extensions) {
                return Some(with_ext);
            }
            if let Some(index) = try_extensions(&main_path.join("index"), extensions) {
                return Some(index);
            }
        }

        try_extensions(&dir.join("index"), extensions)
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

fn try_extensions(path: &Path, extensions: &[String]) -> Option<PathBuf> {
    extensions.iter().find_map(|ext| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.is_file().then_some(candidate)
    })
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
}

fn read_main(dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let pkg: PackageJson = serde_json::from_str(&content).ok()?;
    pkg.main.filter(|m| !m.is_empty())
}

/// Realize symlinks unless `preserve` is set; always normalizes the path
pub fn realize(path: &Path, preserve: bool) -> PathBuf {
    if !preserve {
        if let Ok(real) = path.canonicalize() {
            return real;
        }
    }
    normalize(path)
}

/// Lexically remove `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// `node_modules` folders from `dir` up to the root
///
/// Directories that are themselves named `node_modules` are skipped.
pub fn node_module_paths(dir: &Path) -> Vec<PathBuf> {
    dir.ancestors()
        .filter(|d| d.file_name().is_none_or(|name| name != "node_modules"))
        .map(|d| d.join("node_modules"))
        .collect()
}

/// Global module folders: `NODE_PATH` entries, `~/.node_modules`, `~/.node_libraries`
pub fn global_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::env::var_os("NODE_PATH")
        .map(|value| {
            std::env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default();

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".node_modules"));
        paths.push(home.join(".node_libraries"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolver() -> ModuleResolver {
        ModuleResolver::new(&LoaderConfig::default())
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_is_builtin() {
        let resolver = resolver();
        assert!(resolver.is_builtin("fs"));
        assert!(resolver.is_builtin("node:fs"));
        assert!(!resolver.is_builtin("lodash"));
        assert_eq!(
            resolver
                .resolve("node:path", None, Format::Legacy, false, &[])
                .unwrap(),
            ResolveResult::BuiltIn("path".to_string())
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c.js")), PathBuf::from("/a/c.js"));
        assert_eq!(normalize(Path::new("/a/b/c")), PathBuf::from("/a/b/c"));
    }

    #[test]
    fn test_node_module_paths() {
        let paths = node_module_paths(Path::new("/app/node_modules/pkg/lib"));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/app/node_modules/pkg/lib/node_modules"),
                PathBuf::from("/app/node_modules/pkg/node_modules"),
                PathBuf::from("/app/node_modules"),
                PathBuf::from("/node_modules"),
            ]
        );
    }

    #[test]
    fn test_legacy_paths_extend_declarative_walk() {
        let config = LoaderConfig {
            global_paths: vec![PathBuf::from("/opt/modules")],
            ..LoaderConfig::default()
        };
        let dir = Path::new("/app/src");
        let legacy = ModuleResolver::new(&config).legacy_search_paths(dir);
        let declarative = node_module_paths(dir);
        assert_eq!(&legacy[..declarative.len()], &declarative[..]);
        assert_eq!(legacy.last(), Some(&PathBuf::from("/opt/modules")));
    }

    #[test]
    fn test_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("dep.js"));
        touch(&root.join("dep.mjs"));
        let referrer = root.join("main.js");
        let resolver = resolver();

        let legacy = resolver
            .resolve("./dep", Some(&referrer), Format::Legacy, false, &[])
            .unwrap();
        assert_eq!(legacy, ResolveResult::File(root.join("dep.js")));

        let declarative = resolver
            .resolve("./dep", Some(&referrer), Format::Declarative, false, &[])
            .unwrap();
        assert_eq!(declarative, ResolveResult::File(root.join("dep.mjs")));
    }

    #[test]
    fn test_extension_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("file.min.js"));
        let referrer = root.join("main.js");

        let resolved = resolver()
            .resolve("./file.min", Some(&referrer), Format::Legacy, false, &[])
            .unwrap();
        assert_eq!(resolved, ResolveResult::File(root.join("file.min.js")));
    }

    #[test]
    fn test_directory_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("lib/index.js"));
        touch(&root.join("pkg/dist/entry.js"));
        fs::write(root.join("pkg/package.json"), r#"{ "main": "dist/entry" }"#).unwrap();
        let referrer = root.join("main.js");
        let resolver = resolver();

        assert_eq!(
            resolver
                .resolve("./lib", Some(&referrer), Format::Legacy, false, &[])
                .unwrap(),
            ResolveResult::File(root.join("lib/index.js"))
        );
        assert_eq!(
            resolver
                .resolve("./pkg", Some(&referrer), Format::Legacy, false, &[])
                .unwrap(),
            ResolveResult::File(root.join("pkg/dist/entry.js"))
        );
    }

    #[test]
    fn test_bare_specifier_and_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("app/node_modules/dep/index.js"));
        touch(&root.join("global/extra.js"));
        let referrer = root.join("app/src/main.js");
        let resolver = resolver();

        assert_eq!(
            resolver
                .resolve("dep", Some(&referrer), Format::Legacy, false, &[])
                .unwrap(),
            ResolveResult::File(root.join("app/node_modules/dep/index.js"))
        );

        let err = resolver
            .resolve("extra", Some(&referrer), Format::Legacy, false, &[])
            .unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(
            resolver
                .resolve("extra", Some(&referrer), Format::Legacy, false, &[root.join("global")])
                .unwrap(),
            ResolveResult::File(root.join("global/extra.js"))
        );
    }

    #[test]
    fn test_extensionless_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("bin/cli"));

        let resolved = resolver()
            .resolve("./bin/cli", Some(&root.join("main.js")), Format::Declarative, false, &[])
            .unwrap();
        assert_eq!(resolved, ResolveResult::File(root.join("bin/cli")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_policy() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("real/a.js"));
        std::os::unix::fs::symlink(root.join("real/a.js"), root.join("link.js")).unwrap();
        let referrer = root.join("main.js");

        let realized = resolver()
            .resolve("./link.js", Some(&referrer), Format::Legacy, false, &[])
            .unwrap();
        assert_eq!(realized, ResolveResult::File(root.join("real/a.js")));

        let config = LoaderConfig {
            preserve_symlinks: true,
            ..LoaderConfig::default()
        };
        let preserved = ModuleResolver::new(&config)
            .resolve("./link.js", Some(&referrer), Format::Legacy, false, &[])
            .unwrap();
        assert_eq!(preserved, ResolveResult::File(root.join("link.js")));

        // The main entry point follows its own flag
        let main = ModuleResolver::new(&config)
            .resolve("./link.js", Some(&referrer), Format::Legacy, true, &[])
            .unwrap();
        assert_eq!(main, ResolveResult::File(root.join("real/a.js")));
    }
}
