// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module source scanning
//!
//! The built-in compilers understand a line-oriented subset of module
//! syntax:
//! - `import` declarations (default, named, namespace, side-effect)
//! - `export const` / `export default`
//! - `exports.name =` / `module.exports =`
//! - `require("x")` and `require("x").name` expressions
//! - `throw` statements
//!
//! Values are JSON literals.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^import\s*(?:(?:[\w$]+\s*,?\s*)?(?:\{[^}]*\}\s*)?(?:\*\s*as\s+[\w$]+\s*)?from\s*)?["']([^"']+)["']$"#,
    )
    .expect("import pattern")
});

static EXPORT_BINDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^export\s+(?:const|let|var)\s+([\w$]+)\s*=\s*(.+)$").expect("export pattern")
});

static EXPORT_DEFAULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^export\s+default\s+(.+)$").expect("export default pattern"));

static EXPORTS_ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:module\.)?exports\.([\w$]+)\s*=\s*(.+)$").expect("exports pattern")
});

static MODULE_EXPORTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^module\.exports\s*=\s*(.+)$").expect("module.exports pattern"));

static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:const|let|var)\s+[\w$]+\s*=\s*(.+)$").expect("declaration pattern")
});

static THROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^throw\s+(?:new\s+Error\(\s*["']([^"']*)["']\s*\)|["']([^"']*)["'])$"#)
        .expect("throw pattern")
});

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^require\(\s*["']([^"']+)["']\s*\)(?:\.([\w$]+))?$"#).expect("require pattern")
});

/// Syntax error with a 1-based line number
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SyntaxError: {message} (line {line})")]
pub struct SyntaxError {
    /// Line number
    pub line: usize,
    /// Description
    pub message: String,
}

/// Expression on the right of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// JSON literal
    Literal(Value),
    /// `require("x")`, optionally followed by `.name`
    Require {
        /// Requested specifier
        request: String,
        /// Property read from the child's exports
        property: Option<String>,
    },
}

/// One statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `import ... from "x"` or `import "x"`
    Import(String),
    /// `export const name = v` or `export default v` (name `default`)
    Export {
        /// Exported name
        name: String,
        /// Value
        value: Expr,
    },
    /// `exports.name = v` (`Some`) or `module.exports = v` (`None`)
    Assign {
        /// Target property
        name: Option<String>,
        /// Value
        value: Expr,
    },
    /// Expression evaluated for its side effects
    Eval(Expr),
    /// `throw "message"`
    Throw(String),
}

/// A scanned module body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Statements in source order
    pub statements: Vec<Statement>,
}

impl Program {
    /// Whether the body uses import/export declarations
    pub fn has_module_syntax(&self) -> bool {
        self.statements
            .iter()
            .any(|s| matches!(s, Statement::Import(_) | Statement::Export { .. }))
    }

    /// Every specifier the module requests, in source order
    pub fn requests(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|s| match s {
                Statement::Import(request) => Some(request.as_str()),
                Statement::Export { value, .. }
                | Statement::Assign { value, .. }
                | Statement::Eval(value) => match value {
                    Expr::Require { request, .. } => Some(request.as_str()),
                    Expr::Literal(_) => None,
                },
                Statement::Throw(_) => None,
            })
            .collect()
    }
}

/// Scan module source
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let mut statements = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        let text = text.strip_suffix(';').unwrap_or(text).trim_end();

        if text.is_empty() || text.starts_with("//") || is_directive(text) {
            continue;
        }

        statements.push(parse_statement(text, line)?);
    }

    Ok(Program { statements })
}

fn is_directive(text: &str) -> bool {
    text == "\"use strict\"" || text == "'use strict'"
}

fn parse_statement(text: &str, line: usize) -> Result<Statement, SyntaxError> {
    if let Some(cap) = IMPORT_RE.captures(text) {
        return Ok(Statement::Import(cap[1].to_string()));
    }

    if let Some(cap) = EXPORT_BINDING_RE.captures(text) {
        return Ok(Statement::Export {
            name: cap[1].to_string(),
            value: parse_expr(&cap[2], line)?,
        });
    }

    if let Some(cap) = EXPORT_DEFAULT_RE.captures(text) {
        return Ok(Statement::Export {
            name: "default".to_string(),
            value: parse_expr(&cap[1], line)?,
        });
    }

    if let Some(cap) = EXPORTS_ASSIGN_RE.captures(text) {
        return Ok(Statement::Assign {
            name: Some(cap[1].to_string()),
            value: parse_expr(&cap[2], line)?,
        });
    }

    if let Some(cap) = MODULE_EXPORTS_RE.captures(text) {
        return Ok(Statement::Assign {
            name: None,
            value: parse_expr(&cap[1], line)?,
        });
    }

    if let Some(cap) = DECLARATION_RE.captures(text) {
        return Ok(Statement::Eval(parse_expr(&cap[1], line)?));
    }

    if let Some(cap) = THROW_RE.captures(text) {
        let message = cap.get(1).or_else(|| cap.get(2)).map_or("", |m| m.as_str());
        return Ok(Statement::Throw(message.to_string()));
    }

    if REQUIRE_RE.is_match(text) {
        return Ok(Statement::Eval(parse_expr(text, line)?));
    }

    let token = text.split_whitespace().next().unwrap_or(text);
    Err(SyntaxError {
        line,
        message: format!("Unexpected token '{}'", token),
    })
}

fn parse_expr(text: &str, line: usize) -> Result<Expr, SyntaxError> {
    let text = text.trim();

    if let Some(cap) = REQUIRE_RE.captures(text) {
        return Ok(Expr::Require {
            request: cap[1].to_string(),
            property: cap.get(2).map(|m| m.as_str().to_string()),
        });
    }

    serde_json::from_str(text)
        .map(Expr::Literal)
        .map_err(|e| SyntaxError {
            line,
            message: format!("Invalid expression '{}': {}", text, e),
        })
}
