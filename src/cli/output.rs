//! Output handlers for CLI commands
//!
//! Supports console (pretty), JSON, and quiet output modes.

use crate::format::Deviation;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Output mode for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    #[default]
    Console,
    Json,
    Quiet,
}

/// Events emitted while processing files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputEvent {
    RunStart {
        targets: usize,
        header: bool,
        format: bool,
        check: bool,
    },
    FileSkipped {
        path: PathBuf,
        reason: String,
    },
    HeaderUpdated {
        path: PathBuf,
    },
    HeaderStale {
        path: PathBuf,
    },
    FileFormatted {
        path: PathBuf,
        /// Number of line ranges, or None for the whole file
        ranges: Option<usize>,
    },
    CheckDeviations {
        path: PathBuf,
        deviations: Vec<Deviation>,
    },
    FileError {
        path: PathBuf,
        error: String,
    },
    RunComplete {
        processed: usize,
        skipped: usize,
        failed: usize,
        deviations: usize,
        interrupted: bool,
        duration_ms: u64,
    },
    ScannerPatched {
        path: PathBuf,
        generated: bool,
        rules: Vec<String>,
    },
    RunError {
        error: String,
    },
    Info {
        message: String,
    },
}

/// Output handler trait
pub trait OutputHandler: Send + Sync {
    /// Emit an event
    fn emit(&self, event: OutputEvent);

    /// Write final result
    fn result(&self, success: bool, output: Option<&str>);
}

/// Console output handler
pub struct ConsoleHandler {
    debug: bool,
}

impl ConsoleHandler {
    /// Create a new console handler
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn format_duration(ms: u64) -> String {
        if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        }
    }

    /// Render deviations like a unified diff against the formatter output
    fn render_deviations(path: &std::path::Path, deviations: &[Deviation]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- {}", path.display());
        let _ = writeln!(out, "+++ {} (formatted)", path.display());

        let mut last_line = None;
        for dev in deviations {
            if last_line != Some(dev.line) {
                let _ = writeln!(out, "@@ line {} @@", dev.line);
                last_line = Some(dev.line);
            }
            if let Some(original) = &dev.original {
                let _ = writeln!(out, "-{}", original);
            }
            if let Some(suggested) = &dev.suggested {
                let _ = writeln!(out, "+{}", suggested);
            }
            if let Some(note) = &dev.note {
                let _ = writeln!(out, "\\ {}", note);
            }
        }
        out
    }
}

impl OutputHandler for ConsoleHandler {
    fn emit(&self, event: OutputEvent) {
        match event {
            OutputEvent::RunStart {
                targets,
                header,
                format,
                check,
            } => {
                let mut actions = Vec::new();
                if header {
                    actions.push("header");
                }
                if format {
                    actions.push(if check { "check" } else { "format" });
                }
                eprintln!("Processing {} file(s) ({})", targets, actions.join(", "));
            }
            OutputEvent::FileSkipped { path, reason } => {
                if self.debug {
                    eprintln!("  - {} ({})", path.display(), reason);
                }
            }
            OutputEvent::HeaderUpdated { path } => {
                eprintln!("  ✓ {} (header)", path.display());
            }
            OutputEvent::HeaderStale { path } => {
                eprintln!("  ✗ {} (header out of date)", path.display());
            }
            OutputEvent::FileFormatted { path, ranges } => match ranges {
                Some(n) => eprintln!("  ✓ {} ({} range(s))", path.display(), n),
                None => eprintln!("  ✓ {}", path.display()),
            },
            OutputEvent::CheckDeviations { path, deviations } => {
                eprint!("{}", Self::render_deviations(&path, &deviations));
            }
            OutputEvent::FileError { path, error } => {
                eprintln!("  ✗ {}: {}", path.display(), error);
            }
            OutputEvent::RunComplete {
                processed,
                skipped,
                failed,
                deviations,
                interrupted,
                duration_ms,
            } => {
                eprintln!();
                if interrupted {
                    eprintln!("Interrupted after {} file(s)", processed);
                } else if failed == 0 && deviations == 0 {
                    eprintln!(
                        "✓ {} file(s) processed, {} skipped ({})",
                        processed,
                        skipped,
                        Self::format_duration(duration_ms)
                    );
                } else {
                    eprintln!(
                        "✗ {} file(s) processed, {} failed, {} deviation(s) ({})",
                        processed,
                        failed,
                        deviations,
                        Self::format_duration(duration_ms)
                    );
                }
            }
            OutputEvent::ScannerPatched {
                path,
                generated,
                rules,
            } => {
                let verb = if generated { "Generated and patched" } else { "Patched" };
                eprintln!("✓ {} {} ({} rules applied)", verb, path.display(), rules.len());
                if self.debug {
                    for rule in rules {
                        eprintln!("  - {}", rule);
                    }
                }
            }
            OutputEvent::RunError { error } => {
                eprintln!("Error: {}", error);
            }
            OutputEvent::Info { message } => {
                eprintln!("{}", message);
            }
        }
    }

    fn result(&self, _success: bool, output: Option<&str>) {
        if let Some(out) = output {
            println!("{}", out);
        }
    }
}

/// JSON output handler, one object per line
pub struct JsonHandler;

impl JsonHandler {
    fn print_json<T: Serialize>(&self, value: &T) {
        if let Ok(s) = serde_json::to_string(value) {
            println!("{}", s);
        }
    }
}

impl OutputHandler for JsonHandler {
    fn emit(&self, event: OutputEvent) {
        self.print_json(&event);
    }

    fn result(&self, success: bool, output: Option<&str>) {
        #[derive(Serialize)]
        struct FinalResult<'a> {
            success: bool,
            output: Option<&'a str>,
        }

        self.print_json(&FinalResult { success, output });
    }
}

/// Quiet handler; only errors get through
pub struct QuietHandler;

impl OutputHandler for QuietHandler {
    fn emit(&self, event: OutputEvent) {
        match event {
            OutputEvent::FileError { path, error } => {
                eprintln!("{}: {}", path.display(), error);
            }
            OutputEvent::RunError { error } => {
                eprintln!("Error: {}", error);
            }
            _ => {}
        }
    }

    fn result(&self, _success: bool, output: Option<&str>) {
        if let Some(out) = output {
            println!("{}", out);
        }
    }
}

/// Create an output handler based on mode
pub fn create_handler(mode: OutputMode, debug: bool) -> Box<dyn OutputHandler> {
    match mode {
        OutputMode::Console => Box::new(ConsoleHandler::new(debug)),
        OutputMode::Json => Box::new(JsonHandler),
        OutputMode::Quiet => Box::new(QuietHandler),
    }
}
