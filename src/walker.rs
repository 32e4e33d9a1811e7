//! Recursive source file discovery

use crate::config::{SelfmtConfig, has_suffix};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Decides which walked files are candidates
#[derive(Debug, Clone)]
pub struct SourceFilter {
    root: PathBuf,
    suffixes: Vec<String>,
    exclude: Vec<Pattern>,
}

impl SourceFilter {
    /// Build a filter; exclusion globs are matched against root-relative paths
    pub fn new(
        root: impl Into<PathBuf>,
        suffixes: Vec<String>,
        exclude: &[String],
    ) -> Result<Self, glob::PatternError> {
        let exclude = exclude
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            root: root.into(),
            suffixes,
            exclude,
        })
    }

    pub fn from_config(config: &SelfmtConfig) -> Result<Self, glob::PatternError> {
        Self::new(
            config.root.clone(),
            config.project.source_suffixes.clone(),
            &config.project.exclude,
        )
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        self.exclude
            .iter()
            .any(|p| p.matches_path_with(rel, MATCH_OPTIONS))
    }

    pub fn should_include(&self, path: &Path) -> bool {
        has_suffix(path, &self.suffixes) && !self.is_excluded(path)
    }
}

/// Lazily walk `roots` in file-name order, yielding candidate source files.
///
/// Unreadable entries are logged and skipped.
pub fn walk<'a>(
    roots: &'a [PathBuf],
    filter: &'a SourceFilter,
) -> impl Iterator<Item = PathBuf> + 'a {
    roots.iter().flat_map(move |root| {
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(move |p| filter.should_include(p))
    })
}
