//! Post-processing of a generated lexer so it can be embedded as a library
//!
//! The generator is run, its output is rewritten by an ordered rule list,
//! and the result is only written back once it passes the forbidden-token
//! scan.

mod generator;
mod rules;

pub use generator::Generator;
pub use rules::{RewriteRule, default_rules};

use crate::config::SelfmtConfig;
use crate::error::ErrorKind;
use crate::fs_util::{read_source, write_atomic};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Symbols that must not survive patching, with the label reported for each
static FORBIDDEN: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("stdin", r"\bstdin\s*;"),
        ("stdout", r"\bstdout\b"),
        ("fprintf(", r"\bfprintf\s*\("),
        ("exit(", r"\bexit\s*\("),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).expect("forbidden token regex")))
    .collect()
});

/// Result of patching one scanner source
#[derive(Debug, Clone)]
pub struct PatchResult {
    pub text: String,
    /// Names of the rules that changed something, in application order
    pub rules_fired: Vec<&'static str>,
}

/// Applies the rewrite rules in order and validates the outcome
#[derive(Debug, Clone)]
pub struct ScannerPatcher {
    rules: Vec<RewriteRule>,
}

impl ScannerPatcher {
    pub fn new(namespace: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: default_rules(namespace)?,
        })
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Rewrite `text`, failing if any forbidden token is left afterwards
    pub fn patch(&self, text: &str) -> Result<PatchResult, ErrorKind> {
        let mut current = text.to_string();
        let mut rules_fired = Vec::new();

        for rule in &self.rules {
            let (next, changed) = rule.apply(&current)?;
            if changed {
                rules_fired.push(rule.name);
            } else {
                tracing::debug!(rule = rule.name, "Rule did not match");
            }
            current = next;
        }

        let tokens = forbidden_tokens(&current);
        if !tokens.is_empty() {
            return Err(ErrorKind::ForbiddenToken { tokens });
        }

        Ok(PatchResult {
            text: current,
            rules_fired,
        })
    }
}

/// Every forbidden token occurrence as `<token> (line <n>)`
pub fn forbidden_tokens(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for (label, pattern) in FORBIDDEN.iter() {
            if pattern.is_match(line) {
                found.push(format!("{} (line {})", label, idx + 1));
            }
        }
    }
    found
}

/// What the scanner command should do
#[derive(Debug, Clone, Default)]
pub struct ScannerOptions {
    /// Generator executable overriding the configured one
    pub flex: Option<String>,
    /// Patch the existing output instead of regenerating it
    pub skip_generate: bool,
    /// Patch this file in place; implies no generation
    pub input: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannerReport {
    pub path: PathBuf,
    pub generated: bool,
    pub rules_fired: Vec<&'static str>,
}

/// Generate (unless told not to), patch and atomically write the scanner source
pub async fn run_scanner(config: &SelfmtConfig, options: &ScannerOptions) -> Result<ScannerReport> {
    let patcher = ScannerPatcher::new(&config.scanner.namespace)
        .context("compiling scanner rewrite rules")?;

    let (target, generate) = match &options.input {
        Some(input) => (config.resolve(input), false),
        None => (config.resolve(&config.scanner.output), !options.skip_generate),
    };

    if generate {
        let name = options
            .flex
            .as_deref()
            .unwrap_or(config.scanner.generator.as_str());
        let generator = Generator::discover(name, config.scanner.timeout())?;
        let grammar = config.resolve(&config.scanner.grammar);
        tracing::info!(
            grammar = %grammar.display(),
            output = %target.display(),
            "Generating scanner"
        );
        generator.generate(&grammar, &target, &config.root).await?;
    }

    let text = read_source(&target)?;
    let patched = patcher.patch(&text)?;
    write_atomic(&target, &patched.text)?;

    tracing::info!(
        path = %target.display(),
        rules = patched.rules_fired.len(),
        "Patched scanner"
    );

    Ok(ScannerReport {
        path: target,
        generated: generate,
        rules_fired: patched.rules_fired,
    })
}
