//! Error types for selfmt

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Categories of errors that can occur during a run
#[derive(Debug, Error)]
pub enum ErrorKind {
    // Retryable - transient failures
    #[error("{tool} timed out after {elapsed:?}")]
    ToolTimeout { tool: String, elapsed: Duration },

    // Per-file failures
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed (exit code {exit_code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    // Recoverable - treated as an empty selection
    #[error("malformed diff at line {line_no}: {line}")]
    MalformedDiff { line_no: usize, line: String },

    // Not recoverable - abort the run
    #[error("required tool not found: {tool} (searched: {searched:?})")]
    ToolNotFound { tool: String, searched: Vec<String> },

    #[error("forbidden tokens left in scanner source: {tokens:?}")]
    ForbiddenToken { tokens: Vec<String> },

    #[error("rewrite rule '{rule}' found no anchor in scanner source")]
    MissingAnchor { rule: String },

    #[error("no targets selected")]
    EmptySelection,
}

impl ErrorKind {
    /// Returns true if retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ToolTimeout { .. })
    }

    /// Returns true if the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::ToolNotFound { .. }
                | ErrorKind::ForbiddenToken { .. }
                | ErrorKind::MissingAnchor { .. }
                | ErrorKind::EmptySelection
        )
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ErrorKind::Io {
            path: path.into(),
            source,
        }
    }
}

/// A failure while processing one file of the batch
#[derive(Debug)]
pub struct FileError {
    pub kind: ErrorKind,
    pub path: PathBuf,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.kind)?;
        if self.max_attempts > 1 {
            write!(f, " [attempt {}/{}]", self.attempt, self.max_attempts)?;
        }
        Ok(())
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl FileError {
    pub fn new(kind: ErrorKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            attempt: 1,
            max_attempts: 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u32, max_attempts: u32) -> Self {
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self
    }
}
