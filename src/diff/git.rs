//! The two git diff invocations used to select changed lines

use crate::config::SelfmtConfig;
use crate::error::ErrorKind;
use crate::process::run_tool;
use std::path::Path;

/// Which changes to diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSource {
    /// Index against HEAD
    Staged,
    /// Working tree against HEAD~N
    LastCommits(u32),
}

impl DiffSource {
    /// Arguments for `git`; deleted files are filtered out and no context is emitted
    pub fn git_args(&self) -> Vec<String> {
        let mut args = vec!["diff".to_string()];
        match self {
            DiffSource::Staged => {
                args.push("HEAD".into());
                args.push("--cached".into());
            }
            DiffSource::LastCommits(n) => {
                args.push(format!("HEAD~{}", n));
            }
        }
        args.push("--diff-filter=d".into());
        args.push("--unified=0".into());
        args
    }
}

/// Run git in the repository root and return the raw diff text
pub async fn diff_text(config: &SelfmtConfig, source: DiffSource) -> Result<String, ErrorKind> {
    let program = which::which(&config.git.program).map_err(|_| ErrorKind::ToolNotFound {
        tool: config.git.program.clone(),
        searched: vec![config.git.program.clone()],
    })?;

    run_git(&program, config, source).await
}

async fn run_git(
    program: &Path,
    config: &SelfmtConfig,
    source: DiffSource,
) -> Result<String, ErrorKind> {
    let output = run_tool(
        program,
        &source.git_args(),
        &config.root,
        config.git.timeout(),
    )
    .await?;

    if !output.success() {
        return Err(ErrorKind::ToolFailed {
            tool: config.git.program.clone(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_args() {
        assert_eq!(
            DiffSource::Staged.git_args(),
            vec!["diff", "HEAD", "--cached", "--diff-filter=d", "--unified=0"]
        );
    }

    #[test]
    fn test_last_commits_args() {
        assert_eq!(
            DiffSource::LastCommits(3).git_args(),
            vec!["diff", "HEAD~3", "--diff-filter=d", "--unified=0"]
        );
    }

    #[tokio::test]
    async fn test_missing_git_is_tool_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = SelfmtConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        config.git.program = "no-such-git-binary-8c1d".into();

        let result = diff_text(&config, DiffSource::Staged).await;
        assert!(matches!(result, Err(ErrorKind::ToolNotFound { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_git_failure_is_tool_failed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let fake = dir.path().join("fake-git");
        std::fs::write(&fake, "#!/bin/sh\necho 'not a git repository' >&2\nexit 128\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = SelfmtConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        config.git.program = fake.display().to_string();

        let result = diff_text(&config, DiffSource::LastCommits(1)).await;
        match result {
            Err(ErrorKind::ToolFailed {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, Some(128));
                assert!(stderr.contains("not a git repository"));
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_git_stdout_is_returned() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let fake = dir.path().join("fake-git");
        std::fs::write(&fake, "#!/bin/sh\nprintf '+++ b/a.h\\n@@ -1 +1 @@\\n'\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = SelfmtConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        config.git.program = fake.display().to_string();

        let text = diff_text(&config, DiffSource::Staged).await.unwrap();
        assert_eq!(text, "+++ b/a.h\n@@ -1 +1 @@\n");
    }
}
