//! Configuration loading with multi-layer merge

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-repository config file, looked up at the root
pub const PROJECT_CONFIG_FILE: &str = ".selfmt.toml";

/// Top-level selfmt configuration, built once per process and passed down
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SelfmtConfig {
    /// Absolute repository root; never read from a file
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub header: HeaderConfig,

    #[serde(default)]
    pub formatter: FormatterConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub git: GitConfig,
}

/// Which files count as sources and where to look for them
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// File name suffixes eligible for processing
    #[serde(default = "default_source_suffixes")]
    pub source_suffixes: Vec<String>,

    /// Directories walked when no selection is given (relative to root)
    #[serde(default = "default_dirs")]
    pub dirs: Vec<String>,

    /// Glob patterns never processed
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_source_suffixes() -> Vec<String> {
    vec![".h".into(), ".cpp".into()]
}

fn default_dirs() -> Vec<String> {
    vec!["src".into(), "test".into()]
}

fn default_exclude() -> Vec<String> {
    vec!["**/third_party/**".into(), "**/build/**".into()]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_suffixes: default_source_suffixes(),
            dirs: default_dirs(),
            exclude: default_exclude(),
        }
    }
}

/// Identification header contents
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderConfig {
    /// Banner title
    #[serde(default = "default_header_project")]
    pub project: String,

    /// Copyright holder
    #[serde(default = "default_header_holder")]
    pub holder: String,

    /// First year of the copyright range
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Suffixes of files that get a header
    #[serde(default = "default_header_suffixes")]
    pub suffixes: Vec<String>,

    /// Only stamp files under one of `project.dirs`
    #[serde(default = "default_true")]
    pub restrict_to_dirs: bool,
}

fn default_header_project() -> String {
    "BusTub".into()
}

fn default_header_holder() -> String {
    "Carnegie Mellon University Database Group".into()
}

fn default_start_year() -> i32 {
    2015
}

fn default_header_suffixes() -> Vec<String> {
    vec![".h".into()]
}

fn default_true() -> bool {
    true
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            project: default_header_project(),
            holder: default_header_holder(),
            start_year: default_start_year(),
            suffixes: default_header_suffixes(),
            restrict_to_dirs: true,
        }
    }
}

/// External formatter settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FormatterConfig {
    /// Explicit executable; skips the candidate search
    pub path: Option<PathBuf>,

    /// Executable names searched on PATH, in order
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,

    /// Value passed as `-style=<style>`
    #[serde(default = "default_style")]
    pub style: String,

    /// Per-invocation timeout in seconds
    #[serde(default = "default_formatter_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a timeout
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Repo-relative paths exempt from check mode
    #[serde(default)]
    pub skip_check: Vec<String>,
}

fn default_candidates() -> Vec<String> {
    vec![
        "clang-format".into(),
        "clang-format-14".into(),
        "clang-format-13".into(),
    ]
}

fn default_style() -> String {
    "file".into()
}

fn default_formatter_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    1
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            path: None,
            candidates: default_candidates(),
            style: default_style(),
            timeout_secs: default_formatter_timeout(),
            retries: default_retries(),
            skip_check: Vec::new(),
        }
    }
}

impl FormatterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Lexer generator and scanner patch settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    /// Lexer generator executable
    #[serde(default = "default_generator")]
    pub generator: String,

    /// Grammar file (relative to root)
    #[serde(default = "default_grammar")]
    pub grammar: PathBuf,

    /// Generated scanner file (relative to root)
    #[serde(default = "default_scanner_output")]
    pub output: PathBuf,

    /// Namespace wrapped around the generated unit
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_generator() -> String {
    "flex".into()
}

fn default_grammar() -> PathBuf {
    PathBuf::from("third_party/libpg_query/scan.l")
}

fn default_scanner_output() -> PathBuf {
    PathBuf::from("third_party/libpg_query/src_backend_parser_scan.cpp")
}

fn default_namespace() -> String {
    "duckdb_libpgquery".into()
}

fn default_generator_timeout() -> u64 {
    120
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            generator: default_generator(),
            grammar: default_grammar(),
            output: default_scanner_output(),
            namespace: default_namespace(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

impl ScannerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Version control settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    #[serde(default = "default_git")]
    pub program: String,

    #[serde(default = "default_git_timeout")]
    pub timeout_secs: u64,
}

fn default_git() -> String {
    "git".into()
}

fn default_git_timeout() -> u64 {
    30
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_git(),
            timeout_secs: default_git_timeout(),
        }
    }
}

impl GitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SelfmtConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/selfmt/config.toml
    /// 3. <root>/.selfmt.toml (project)
    /// 4. `explicit`, when given
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut merged = toml::Table::new();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                merge_tables(&mut merged, Self::read_table(&user_config_path)?);
            }
        }

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            merge_tables(&mut merged, Self::read_table(&project_config_path)?);
        }

        if let Some(path) = explicit {
            merge_tables(&mut merged, Self::read_table(path)?);
        }

        let mut config: Self = toml::Value::Table(merged)
            .try_into()
            .context("parsing merged configuration")?;
        config.root = std::path::absolute(root)
            .with_context(|| format!("resolving root {}", root.display()))?;
        Ok(config)
    }

    fn read_table(path: &Path) -> Result<toml::Table> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let table: toml::Table =
            toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        Ok(table)
    }

    /// Get the user config path (~/.config/selfmt/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("selfmt/config.toml"))
    }

    /// Configured directories as absolute paths, with `~` expanded
    pub fn default_dirs(&self) -> Vec<PathBuf> {
        self.project
            .dirs
            .iter()
            .map(|d| {
                let expanded = shellexpand::tilde(d);
                self.root.join(expanded.as_ref())
            })
            .collect()
    }

    /// True if the file name ends with one of the source suffixes
    pub fn is_source(&self, path: &Path) -> bool {
        has_suffix(path, &self.project.source_suffixes)
    }

    /// True if the file should receive an identification header
    pub fn wants_header(&self, path: &Path) -> bool {
        if !has_suffix(path, &self.header.suffixes) {
            return false;
        }
        if !self.header.restrict_to_dirs {
            return true;
        }
        self.default_dirs().iter().any(|d| path.starts_with(d))
    }

    /// True if check mode should skip this file
    pub fn skips_check(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rel) => self
                .formatter
                .skip_check
                .iter()
                .any(|s| Path::new(s) == rel),
            Err(_) => false,
        }
    }

    /// Resolve a possibly relative path against the root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Suffix test on the file name, e.g. `.h` matches `page.h` but not `page.hpp`
pub fn has_suffix(path: &Path, suffixes: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    suffixes.iter().any(|s| name.ends_with(s.as_str()))
}

/// Merge `other` into `base`; nested tables merge, everything else is replaced
fn merge_tables(base: &mut toml::Table, other: toml::Table) {
    for (key, value) in other {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
