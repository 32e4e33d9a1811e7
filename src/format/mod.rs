//! External formatter invocation, whole-file or restricted to line ranges

mod report;

pub use report::{Deviation, line_deviations};

use crate::config::FormatterConfig;
use crate::diff::LineRange;
use crate::error::{ErrorKind, FileError};
use crate::fs_util::read_source;
use crate::process::{ToolOutput, run_tool};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What an in-place run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
    /// The formatter ran over the file
    Formatted,
    /// Ranges were requested but none were usable
    NothingToFormat,
}

/// A located formatter executable plus how to call it
#[derive(Debug, Clone)]
pub struct Formatter {
    program: PathBuf,
    style: String,
    timeout: Duration,
    retries: u32,
}

impl Formatter {
    /// Locate the formatter up front so a missing tool fails before any file is touched
    pub fn discover(config: &FormatterConfig) -> Result<Self, ErrorKind> {
        let searched: Vec<String> = match &config.path {
            Some(path) => vec![path.display().to_string()],
            None => config.candidates.clone(),
        };

        let program = searched
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| ErrorKind::ToolNotFound {
                tool: searched
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "clang-format".to_string()),
                searched: searched.clone(),
            })?;

        tracing::debug!(program = %program.display(), "Using formatter");
        Ok(Self::new(program, config))
    }

    /// Use a known executable without searching
    pub fn new(program: PathBuf, config: &FormatterConfig) -> Self {
        Self {
            program,
            style: config.style.clone(),
            timeout: config.timeout(),
            retries: config.retries,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `-style=<style> [-lines=s:e]... [-i] <path>`, or None when ranges
    /// were given and none of them is valid.
    pub fn command_args(
        &self,
        path: &Path,
        ranges: Option<&[LineRange]>,
        in_place: bool,
    ) -> Option<Vec<String>> {
        let mut args = vec![format!("-style={}", self.style)];

        if let Some(ranges) = ranges {
            let valid: Vec<&LineRange> = ranges.iter().filter(|r| r.is_valid()).collect();
            if valid.is_empty() {
                return None;
            }
            args.extend(valid.iter().map(|r| format!("-lines={}", r)));
        }

        if in_place {
            args.push("-i".into());
        }
        args.push(path.display().to_string());
        Some(args)
    }

    /// Format `path` in place
    pub async fn format_in_place(
        &self,
        path: &Path,
        ranges: Option<&[LineRange]>,
        working_dir: &Path,
    ) -> Result<FormatOutcome, FileError> {
        let Some(args) = self.command_args(path, ranges, true) else {
            tracing::debug!(path = %path.display(), "No valid ranges, not formatting");
            return Ok(FormatOutcome::NothingToFormat);
        };

        self.invoke(path, &args, working_dir).await?;
        Ok(FormatOutcome::Formatted)
    }

    /// Run without writing and report every line the formatter would change
    pub async fn check(
        &self,
        path: &Path,
        ranges: Option<&[LineRange]>,
        working_dir: &Path,
    ) -> Result<Vec<Deviation>, FileError> {
        let Some(args) = self.command_args(path, ranges, false) else {
            return Ok(Vec::new());
        };

        let original = read_source(path).map_err(|e| FileError::new(e, path))?;
        let output = self.invoke(path, &args, working_dir).await?;
        Ok(line_deviations(&original, &output.stdout))
    }

    /// Run the formatter, retrying timeouts up to the configured count
    async fn invoke(
        &self,
        path: &Path,
        args: &[String],
        working_dir: &Path,
    ) -> Result<ToolOutput, FileError> {
        let max_attempts = self.retries + 1;

        for attempt in 1..=max_attempts {
            match run_tool(&self.program, args, working_dir, self.timeout).await {
                Ok(output) if output.success() => return Ok(output),
                Ok(output) => {
                    let kind = ErrorKind::ToolFailed {
                        tool: self.program.display().to_string(),
                        exit_code: output.exit_code,
                        stderr: output.stderr.trim().to_string(),
                    };
                    return Err(FileError::new(kind, path).with_attempt(attempt, max_attempts));
                }
                Err(kind) if kind.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        path = %path.display(),
                        attempt,
                        max_attempts,
                        error = %kind,
                        "Formatter attempt failed, retrying"
                    );
                }
                Err(kind) => {
                    return Err(FileError::new(kind, path).with_attempt(attempt, max_attempts));
                }
            }
        }

        // max_attempts >= 1, so the loop always returns
        Err(FileError::new(
            ErrorKind::ToolTimeout {
                tool: self.program.display().to_string(),
                elapsed: self.timeout,
            },
            path,
        )
        .with_attempt(max_attempts, max_attempts))
    }
}
