//! Lexer generator invocation

use crate::error::ErrorKind;
use crate::process::run_tool;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A located lexer generator
#[derive(Debug, Clone)]
pub struct Generator {
    program: PathBuf,
    timeout: Duration,
}

impl Generator {
    /// Resolve `name` on PATH (or as a path) before anything runs
    pub fn discover(name: &str, timeout: Duration) -> Result<Self, ErrorKind> {
        let program = which::which(name).map_err(|_| ErrorKind::ToolNotFound {
            tool: name.to_string(),
            searched: vec![name.to_string()],
        })?;
        Ok(Self { program, timeout })
    }

    pub fn command_args(grammar: &Path, output: &Path) -> Vec<String> {
        vec![
            "--nounistd".into(),
            "-o".into(),
            output.display().to_string(),
            grammar.display().to_string(),
        ]
    }

    /// Generate `output` from `grammar`. Any stderr output counts as failure.
    pub async fn generate(
        &self,
        grammar: &Path,
        output: &Path,
        working_dir: &Path,
    ) -> Result<(), ErrorKind> {
        let args = Self::command_args(grammar, output);
        let result = run_tool(&self.program, &args, working_dir, self.timeout).await?;

        if !result.success() || !result.stderr.trim().is_empty() {
            return Err(ErrorKind::ToolFailed {
                tool: self.program.display().to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        tracing::debug!(
            output = %output.display(),
            duration_ms = result.duration.as_millis() as u64,
            "Generated scanner"
        );
        Ok(())
    }
}
