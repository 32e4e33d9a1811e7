//! Blocking-style external tool invocation with a bounded timeout.

use crate::error::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

fn exit_status_code_parts(code: Option<i32>, _signal: Option<i32>) -> Option<i32> {
    if let Some(code) = code {
        return Some(code);
    }
    #[cfg(unix)]
    {
        if let Some(signal) = _signal {
            return Some(128 + signal);
        }
    }
    None
}

/// Extract exit code from ExitStatus, using 128+signal for signal-terminated processes on Unix.
pub(crate) fn exit_status_code(status: &std::process::ExitStatus) -> Option<i32> {
    let code = status.code();
    #[cfg(unix)]
    let signal = status.signal();
    #[cfg(not(unix))]
    let signal = None;
    exit_status_code_parts(code, signal)
}

/// Captured result of a finished tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Read stdout and stderr concurrently so a chatty tool cannot deadlock on a full pipe.
async fn collect_output(child: &mut Child) -> std::io::Result<(String, String)> {
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_fut = async move {
        let mut buf = String::new();
        if let Some(mut out) = stdout_pipe {
            out.read_to_string(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    };

    let stderr_fut = async move {
        let mut buf = String::new();
        if let Some(mut err) = stderr_pipe {
            err.read_to_string(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    };

    tokio::try_join!(stdout_fut, stderr_fut)
}

/// Run `program args...` to completion, killing it once `limit` elapses.
///
/// A non-zero exit is not an error here; callers decide what failure means
/// for their tool. Spawn failures map to `ToolNotFound` when the executable
/// is missing and to `Io` otherwise.
pub async fn run_tool(
    program: &Path,
    args: &[String],
    working_dir: &Path,
    limit: Duration,
) -> Result<ToolOutput, ErrorKind> {
    let tool = program.display().to_string();
    tracing::info!("{} {}", tool, args.join(" "));

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::ToolNotFound {
                tool: tool.clone(),
                searched: vec![tool.clone()],
            },
            _ => ErrorKind::io(program, e),
        })?;

    let (stdout, stderr) = match tokio::time::timeout(limit, collect_output(&mut child)).await {
        Ok(Ok(streams)) => streams,
        Ok(Err(e)) => {
            let _ = child.kill().await;
            return Err(ErrorKind::io(program, e));
        }
        Err(_) => {
            let _ = child.kill().await;
            return Err(ErrorKind::ToolTimeout {
                tool,
                elapsed: start.elapsed(),
            });
        }
    };

    let remaining = limit.saturating_sub(start.elapsed());
    let status = match tokio::time::timeout(remaining, child.wait()).await {
        Ok(status) => status.map_err(|e| ErrorKind::io(program, e))?,
        Err(_) => {
            let _ = child.kill().await;
            return Err(ErrorKind::ToolTimeout {
                tool,
                elapsed: start.elapsed(),
            });
        }
    };

    Ok(ToolOutput {
        stdout,
        stderr,
        exit_code: exit_status_code(&status),
        duration: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn exit_code_passthrough() {
        assert_eq!(exit_status_code_parts(Some(0), None), Some(0));
        assert_eq!(exit_status_code_parts(Some(1), None), Some(1));
        assert_eq!(exit_status_code_parts(Some(42), None), Some(42));
    }

    #[cfg(unix)]
    #[test]
    fn signal_exit_code() {
        // SIGKILL (9) -> 128 + 9 = 137
        assert_eq!(exit_status_code_parts(None, Some(9)), Some(137));
        // SIGTERM (15) -> 128 + 15 = 143
        assert_eq!(exit_status_code_parts(None, Some(15)), Some(143));
    }

    #[cfg(not(unix))]
    #[test]
    fn signal_ignored_on_non_unix() {
        assert_eq!(exit_status_code_parts(None, Some(9)), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_both_streams() {
        let dir = TempDir::new().unwrap();
        let out = run_tool(
            Path::new("sh"),
            &sh("printf 'stdout'; printf 'stderr' >&2"),
            dir.path(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(out.stdout, "stdout");
        assert_eq!(out.stderr, "stderr");
        assert!(out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_nonzero_exit_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let out = run_tool(
            Path::new("sh"),
            &sh("printf 'output'; exit 42"),
            dir.path(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(out.stdout, "output");
        assert_eq!(out.exit_code, Some(42));
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("test.txt"), "content").unwrap();

        let out = run_tool(
            Path::new("cat"),
            &["test.txt".to_string()],
            dir.path(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(out.stdout, "content");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_timeout() {
        let dir = TempDir::new().unwrap();
        let result = run_tool(
            Path::new("sh"),
            &sh("sleep 10"),
            dir.path(),
            Duration::from_millis(100),
        )
        .await;

        assert!(matches!(result, Err(ErrorKind::ToolTimeout { .. })));
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let dir = TempDir::new().unwrap();
        let result = run_tool(
            Path::new("definitely-not-a-real-tool-4f2a"),
            &[],
            dir.path(),
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(ErrorKind::ToolNotFound { .. })));
    }
}
