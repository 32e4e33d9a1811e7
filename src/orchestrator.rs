//! Target selection and per-file dispatch
//!
//! Whole-run failures (missing tool, empty selection) abort before any file
//! is touched. Failures on a single file are reported and the batch moves on.

use crate::cli::output::{OutputEvent, OutputHandler};
use crate::cli::signals;
use crate::config::SelfmtConfig;
use crate::diff::{DiffSource, HunkTarget, diff_text, parse_unified_diff};
use crate::error::{ErrorKind, FileError};
use crate::format::{FormatOutcome, Formatter};
use crate::header::{header_is_current, update_file_header};
use crate::walker::{SourceFilter, walk};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Where the file list comes from
#[derive(Debug, Clone)]
pub enum TargetSelection {
    /// Files and directories named on the command line; directories are walked
    Paths(Vec<PathBuf>),
    /// Changed lines from a git diff
    Diff(DiffSource),
    /// Every source file under the configured directories
    Dirs,
}

/// What to do with each selected file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actions {
    pub header: bool,
    pub format: bool,
    /// Report instead of writing
    pub check: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub targets: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Lines (or headers) that check mode found out of date
    pub deviations: usize,
    pub interrupted: bool,
    pub duration: Duration,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.deviations == 0 && !self.interrupted
    }

    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.success() {
            0
        } else {
            1
        }
    }
}

pub struct Orchestrator<'a> {
    config: &'a SelfmtConfig,
    handler: &'a dyn OutputHandler,
    stop_requested: fn() -> bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a SelfmtConfig, handler: &'a dyn OutputHandler) -> Self {
        Self {
            config,
            handler,
            stop_requested: signals::is_shutdown_requested,
        }
    }

    /// Replace the between-files stop check
    pub fn with_stop_check(mut self, stop_requested: fn() -> bool) -> Self {
        self.stop_requested = stop_requested;
        self
    }

    fn filter(&self) -> Result<SourceFilter> {
        SourceFilter::from_config(self.config).context("invalid exclude pattern")
    }

    /// Build the target list for `selection`
    pub async fn select_targets(&self, selection: &TargetSelection) -> Result<Vec<HunkTarget>> {
        let filter = self.filter()?;

        let targets = match selection {
            TargetSelection::Paths(paths) => {
                let mut targets = Vec::new();
                for path in paths {
                    let resolved = self.config.resolve(path);
                    if resolved.is_dir() {
                        targets.extend(
                            walk(std::slice::from_ref(&resolved), &filter)
                                .map(HunkTarget::whole_file),
                        );
                    } else {
                        targets.push(HunkTarget::whole_file(resolved));
                    }
                }
                targets
            }
            TargetSelection::Diff(source) => {
                let text = diff_text(self.config, *source).await?;
                let parsed = match parse_unified_diff(
                    &text,
                    &self.config.root,
                    &self.config.project.source_suffixes,
                ) {
                    Ok(parsed) => parsed,
                    Err(e @ ErrorKind::MalformedDiff { .. }) => {
                        tracing::warn!(error = %e, "Ignoring malformed diff");
                        Vec::new()
                    }
                    Err(e) => return Err(e.into()),
                };
                parsed
                    .into_iter()
                    .filter(|t| {
                        let excluded = filter.is_excluded(&t.path);
                        if excluded {
                            tracing::debug!(path = %t.path.display(), "Excluded");
                        }
                        !excluded
                    })
                    .collect()
            }
            TargetSelection::Dirs => {
                let roots = self.config.default_dirs();
                walk(&roots, &filter).map(HunkTarget::whole_file).collect()
            }
        };

        tracing::debug!(count = targets.len(), "Selected targets");
        Ok(targets)
    }

    /// Select targets and process them
    pub async fn run(&self, selection: &TargetSelection, actions: Actions) -> Result<RunSummary> {
        // Fail on a missing formatter before anything is selected or written
        let formatter = if actions.format {
            Some(Formatter::discover(&self.config.formatter)?)
        } else {
            None
        };

        let targets = self.select_targets(selection).await?;
        if targets.is_empty() {
            return Err(ErrorKind::EmptySelection.into());
        }

        self.run_targets(&targets, actions, formatter.as_ref()).await
    }

    /// Process an already selected list, one file at a time
    pub async fn run_targets(
        &self,
        targets: &[HunkTarget],
        actions: Actions,
        formatter: Option<&Formatter>,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary {
            targets: targets.len(),
            ..Default::default()
        };

        self.handler.emit(OutputEvent::RunStart {
            targets: targets.len(),
            header: actions.header,
            format: actions.format,
            check: actions.check,
        });

        for target in targets {
            if (self.stop_requested)() {
                tracing::warn!("Shutdown requested, stopping before next file");
                summary.interrupted = true;
                break;
            }

            let path = &target.path;
            if let Some(reason) = self.skip_reason(path) {
                tracing::info!(path = %path.display(), reason, "Skipping");
                self.handler.emit(OutputEvent::FileSkipped {
                    path: path.clone(),
                    reason: reason.to_string(),
                });
                summary.skipped += 1;
                continue;
            }

            match self.process_file(target, actions, formatter).await {
                Ok(deviations) => {
                    summary.processed += 1;
                    summary.deviations += deviations;
                }
                Err(err) if err.kind.is_fatal() => {
                    return Err(err.into());
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "File failed");
                    self.handler.emit(OutputEvent::FileError {
                        path: path.clone(),
                        error: err.kind.to_string(),
                    });
                    summary.failed += 1;
                }
            }
        }

        summary.duration = start.elapsed();
        self.handler.emit(OutputEvent::RunComplete {
            processed: summary.processed,
            skipped: summary.skipped,
            failed: summary.failed,
            deviations: summary.deviations,
            interrupted: summary.interrupted,
            duration_ms: summary.duration.as_millis() as u64,
        });

        Ok(summary)
    }

    fn skip_reason(&self, path: &Path) -> Option<&'static str> {
        if !path.is_file() {
            Some("does not exist")
        } else if !self.config.is_source(path) {
            Some("not a source file")
        } else {
            None
        }
    }

    /// Header first, then formatting. Returns the number of deviations found in check mode.
    async fn process_file(
        &self,
        target: &HunkTarget,
        actions: Actions,
        formatter: Option<&Formatter>,
    ) -> Result<usize, FileError> {
        let path = &target.path;
        let mut deviations = 0;

        if actions.header && self.config.wants_header(path) {
            if actions.check {
                let current =
                    header_is_current(self.config, path).map_err(|e| FileError::new(e, path))?;
                if !current {
                    deviations += 1;
                    self.handler
                        .emit(OutputEvent::HeaderStale { path: path.clone() });
                }
            } else if update_file_header(self.config, path).map_err(|e| FileError::new(e, path))? {
                self.handler
                    .emit(OutputEvent::HeaderUpdated { path: path.clone() });
            }
        }

        let Some(formatter) = formatter else {
            return Ok(deviations);
        };
        let ranges = target.ranges.as_deref();

        if actions.check {
            if self.config.skips_check(path) {
                tracing::debug!(path = %path.display(), "On the check allow-list");
                return Ok(deviations);
            }
            let found = formatter.check(path, ranges, &self.config.root).await?;
            if !found.is_empty() {
                deviations += found.len();
                self.handler.emit(OutputEvent::CheckDeviations {
                    path: path.clone(),
                    deviations: found,
                });
            }
        } else if formatter.format_in_place(path, ranges, &self.config.root).await?
            == FormatOutcome::Formatted
        {
            self.handler.emit(OutputEvent::FileFormatted {
                path: path.clone(),
                ranges: ranges.map(<[_]>::len),
            });
        }

        Ok(deviations)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::output::tests::MockHandler;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    // Logs its arguments, echoes the file in check mode, fails on bad.cpp
    const FAKE_FORMATTER: &str = "\
echo \"$@\" >> \"$(dirname \"$0\")/calls.log\"
for last; do :; done
case \"$last\" in *bad.cpp) echo 'cannot parse' >&2; exit 1;; esac
case \" $* \" in *\" -i \"*) ;; *) sed 's/^return/  return/' \"$last\" ;; esac
";

    struct Fixture {
        dir: TempDir,
        tools: TempDir,
        config: SelfmtConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let tools = TempDir::new().unwrap();
            let formatter = script(tools.path(), "fake-format", FAKE_FORMATTER);

            let mut config = SelfmtConfig {
                root: dir.path().to_path_buf(),
                ..Default::default()
            };
            config.formatter.path = Some(formatter);
            Self { dir, tools, config }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn write(&self, rel: &str, contents: &str) -> PathBuf {
            let path = self.root().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, contents).unwrap();
            path
        }

        fn calls(&self) -> Vec<String> {
            std::fs::read_to_string(self.tools.path().join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn never() -> bool {
        false
    }

    fn always() -> bool {
        true
    }

    fn format_only() -> Actions {
        Actions {
            format: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_explicit_paths_skip_missing_and_foreign() {
        let fx = Fixture::new();
        let a = fx.write("src/a.cpp", "int a;\n");
        fx.write("src/notes.txt", "hi\n");
        let handler = MockHandler::default();

        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(
                &TargetSelection::Paths(vec![
                    PathBuf::from("src/a.cpp"),
                    PathBuf::from("src/notes.txt"),
                    PathBuf::from("src/gone.cpp"),
                ]),
                format_only(),
            )
            .await
            .unwrap();

        assert_eq!((summary.processed, summary.skipped, summary.failed), (1, 2, 0));
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(fx.calls(), vec![format!("-style=file -i {}", a.display())]);
    }

    #[tokio::test]
    async fn test_directory_argument_is_walked() {
        let fx = Fixture::new();
        fx.write("src/a.cpp", "int a;\n");
        fx.write("src/sub/b.h", "int b;\n");
        fx.write("src/third_party/c.h", "int c;\n");
        let handler = MockHandler::default();

        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Paths(vec![PathBuf::from("src")]), format_only())
            .await
            .unwrap();

        assert_eq!(summary.targets, 2);
        assert_eq!(summary.processed, 2);
    }

    #[tokio::test]
    async fn test_dirs_mode_updates_headers_only_for_h_files() {
        let fx = Fixture::new();
        let header = fx.write("src/include/page.h", "#pragma once\n");
        let source = fx.write("test/page_test.cpp", "int main() {}\n");
        let handler = MockHandler::default();

        let actions = Actions {
            header: true,
            ..Default::default()
        };
        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Dirs, actions)
            .await
            .unwrap();

        assert_eq!(summary.processed, 2);
        let written = std::fs::read_to_string(&header).unwrap();
        assert!(written.contains("// Identification: src/include/page.h\n"));
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "int main() {}\n");
        // No formatter requested
        assert!(fx.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_selection_is_an_error() {
        let fx = Fixture::new();
        fx.write("src/readme.md", "x\n");
        let handler = MockHandler::default();

        let err = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Dirs, format_only())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ErrorKind>(),
            Some(ErrorKind::EmptySelection)
        ));
        assert!(handler.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_formatter_fails_before_any_write() {
        let mut fx = Fixture::new();
        fx.config.formatter.path = Some(PathBuf::from("/no/such/formatter-42"));
        let header = fx.write("src/page.h", "#pragma once\n");
        let handler = MockHandler::default();

        let actions = Actions {
            header: true,
            format: true,
            check: false,
        };
        let err = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Dirs, actions)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ErrorKind>(),
            Some(ErrorKind::ToolNotFound { .. })
        ));
        assert_eq!(std::fs::read_to_string(&header).unwrap(), "#pragma once\n");
    }

    #[tokio::test]
    async fn test_check_mode_reports_without_writing() {
        let fx = Fixture::new();
        let original = "int main() {\nreturn 0;\n}\n";
        let path = fx.write("src/main.cpp", original);
        let handler = MockHandler::default();

        let actions = Actions {
            format: true,
            check: true,
            ..Default::default()
        };
        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Paths(vec![path.clone()]), actions)
            .await
            .unwrap();

        assert_eq!(summary.deviations, 1);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert!(handler.events().iter().any(|e| matches!(
            e,
            OutputEvent::CheckDeviations { deviations, .. } if deviations[0].line == 2
        )));
    }

    #[tokio::test]
    async fn test_check_mode_clean_file_exits_zero() {
        let mut fx = Fixture::new();
        let cat_last = script(
            fx.tools.path(),
            "fake-format-clean",
            "for last; do :; done\ncat \"$last\"\n",
        );
        fx.config.formatter.path = Some(cat_last);
        let formatted = "int main() {\n  return 0;\n}\n";
        let path = fx.write("src/main.cpp", formatted);
        let handler = MockHandler::default();

        let actions = Actions {
            format: true,
            check: true,
            ..Default::default()
        };
        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Paths(vec![path.clone()]), actions)
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.deviations, 0);
        assert!(summary.success());
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), formatted);

        let events = handler.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, OutputEvent::CheckDeviations { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            OutputEvent::RunComplete { deviations: 0, failed: 0, .. }
        )));
    }

    #[tokio::test]
    async fn test_check_allow_list() {
        let mut fx = Fixture::new();
        fx.config.formatter.skip_check = vec!["src/main.cpp".into()];
        let path = fx.write("src/main.cpp", "int main() {\nreturn 0;\n}\n");
        let handler = MockHandler::default();

        let actions = Actions {
            format: true,
            check: true,
            ..Default::default()
        };
        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Paths(vec![path]), actions)
            .await
            .unwrap();

        assert!(summary.success());
        assert!(fx.calls().is_empty());
    }

    #[tokio::test]
    async fn test_one_failing_file_does_not_stop_the_batch() {
        let fx = Fixture::new();
        fx.write("src/a.cpp", "int a;\n");
        fx.write("src/bad.cpp", "int b;\n");
        fx.write("src/c.cpp", "int c;\n");
        let handler = MockHandler::default();

        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Dirs, format_only())
            .await
            .unwrap();

        assert_eq!((summary.processed, summary.failed), (2, 1));
        assert_eq!(summary.exit_code(), 1);
        assert!(handler.events().iter().any(|e| matches!(
            e,
            OutputEvent::FileError { path, error } if path.ends_with("bad.cpp") && error.contains("cannot parse")
        )));
    }

    #[tokio::test]
    async fn test_stop_request_ends_batch_between_files() {
        let fx = Fixture::new();
        fx.write("src/a.cpp", "int a;\n");
        let handler = MockHandler::default();

        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(always)
            .run(&TargetSelection::Dirs, format_only())
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.exit_code(), 130);
        assert!(fx.calls().is_empty());
    }

    #[tokio::test]
    async fn test_staged_diff_passes_line_ranges() {
        let mut fx = Fixture::new();
        let foo = fx.write("src/foo.cpp", "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nl\nm\n");
        fx.write("src/third_party/x.cpp", "int x;\n");
        let git = script(
            fx.tools.path(),
            "fake-git",
            "cat <<'EOF'\n\
diff --git a/src/foo.cpp b/src/foo.cpp\n\
--- a/src/foo.cpp\n\
+++ b/src/foo.cpp\n\
@@ -10,0 +11,3 @@\n\
+x\n\
diff --git a/src/third_party/x.cpp b/src/third_party/x.cpp\n\
--- a/src/third_party/x.cpp\n\
+++ b/src/third_party/x.cpp\n\
@@ -1 +1 @@\n\
-y\n\
+x\n\
EOF\n",
        );
        fx.config.git.program = git.display().to_string();
        let handler = MockHandler::default();

        let summary = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Diff(DiffSource::Staged), format_only())
            .await
            .unwrap();

        assert_eq!(summary.targets, 1);
        assert_eq!(
            fx.calls(),
            vec![format!("-style=file -lines=11:13 -i {}", foo.display())]
        );
    }

    #[tokio::test]
    async fn test_malformed_diff_counts_as_empty() {
        let mut fx = Fixture::new();
        let git = script(fx.tools.path(), "fake-git", "echo '@@ -1 +1 @@'\n");
        fx.config.git.program = git.display().to_string();
        let handler = MockHandler::default();

        let err = Orchestrator::new(&fx.config, &handler)
            .with_stop_check(never)
            .run(&TargetSelection::Diff(DiffSource::LastCommits(2)), format_only())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ErrorKind>(),
            Some(ErrorKind::EmptySelection)
        ));
    }
}
