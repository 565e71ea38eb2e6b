// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey CLI - load a module graph and print how each module was classified

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use rustc_hash::FxHashSet;
use spacey_loader::{EntryRef, Format, LoaderConfig, ModuleLoader, Partition, VERSION};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "spacey",
    about = "Resolve and load a legacy/declarative module graph",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Entry module
    script: PathBuf,

    /// Keep symlinked paths instead of realizing them
    #[arg(long)]
    preserve_symlinks: bool,

    /// Directory for the on-disk code cache
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Loader configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Classify the graph without evaluating it
    #[arg(long)]
    parse_only: bool,

    /// Print module exports
    #[arg(long)]
    exports: bool,

    /// Print the keys held by each cache partition
    #[arg(long)]
    cache: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("spacey_loader=debug")
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if cli.preserve_symlinks {
        config.preserve_symlinks = true;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }

    let script = std::path::absolute(&cli.script)
        .with_context(|| format!("invalid path {}", cli.script.display()))?;
    let request = script.display().to_string();

    let mut loader = ModuleLoader::with_config(config);
    let root = if cli.parse_only {
        loader.discover(&request, None)?
    } else {
        loader.load(&request, None, true)?
    };

    let mut seen = FxHashSet::default();
    print_entry(&loader, &root, None, 0, cli.exports, &mut seen);

    if cli.cache {
        let snapshot = loader.cache_snapshot();
        println!();
        for (name, keys) in [
            ("legacy", &snapshot.legacy),
            ("declarative", &snapshot.declarative),
            ("discovery", &snapshot.discovery),
        ] {
            println!("{} ({})", name.bold(), keys.len());
            for key in keys {
                if snapshot.poisoned.contains(key) {
                    println!("  {} {}", key, "poisoned".red());
                } else {
                    println!("  {}", key);
                }
            }
        }
    }
    Ok(())
}

/// Which partition currently owns a key
fn partition_of(loader: &ModuleLoader, key: &str) -> Option<Partition> {
    [Partition::Legacy, Partition::Declarative, Partition::Discovery]
        .into_iter()
        .find(|p| loader.state().has(*p, key))
}

fn print_entry(
    loader: &ModuleLoader,
    entry: &EntryRef,
    request: Option<&str>,
    depth: usize,
    exports: bool,
    seen: &mut FxHashSet<String>,
) {
    let e = entry.read();
    let indent = "  ".repeat(depth);
    let format = match e.format() {
        Format::Legacy => "legacy".yellow().to_string(),
        Format::Declarative => "declarative".cyan().to_string(),
    };
    let partition = match partition_of(loader, e.key()) {
        Some(p) => p.to_string(),
        None => "builtin".to_string(),
    };
    let label = match request {
        Some(request) => format!("{} -> {}", request.green(), e.key()),
        None => e.key().bold().to_string(),
    };

    let first_visit = seen.insert(e.key().to_string());
    println!(
        "{}{} [{}, {}]{}",
        indent,
        label,
        format,
        partition.dimmed(),
        if first_visit { "" } else { " (seen)" }
    );
    if !first_visit {
        return;
    }

    if exports && e.is_loaded() {
        let json = serde_json::to_string(&e.module.exports).unwrap_or_default();
        println!("{}  {}", indent, json.dimmed());
    }

    let mut children: Vec<(String, EntryRef)> = e
        .children()
        .iter()
        .map(|(k, v)| (k.clone(), EntryRef::clone(v)))
        .collect();
    drop(e);
    children.sort_by(|a, b| a.0.cmp(&b.0));

    for (request, child) in children {
        print_entry(loader, &child, Some(&request), depth + 1, exports, seen);
    }
}
