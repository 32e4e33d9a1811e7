//! CLI command implementations

use super::output::{OutputEvent, OutputHandler};
use crate::config::{PROJECT_CONFIG_FILE, SelfmtConfig};
use crate::error::ErrorKind;
use crate::format::Formatter;
use crate::orchestrator::{Actions, Orchestrator, TargetSelection};
use crate::scanner::{ScannerOptions, ScannerPatcher, run_scanner};

/// Report a whole-run failure and map it to an exit code
fn fail(handler: &dyn OutputHandler, err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ErrorKind>() {
        Some(ErrorKind::EmptySelection) => {
            tracing::error!("Nothing to do: the selection matched no files");
        }
        _ => tracing::error!("Run aborted: {:#}", err),
    }
    handler.emit(OutputEvent::RunError {
        error: format!("{:#}", err),
    });
    handler.result(false, None);
    1
}

/// Select targets and update headers and/or formatting
pub async fn run(
    config: &SelfmtConfig,
    selection: TargetSelection,
    actions: Actions,
    handler: &dyn OutputHandler,
) -> i32 {
    let orchestrator = Orchestrator::new(config, handler);

    match orchestrator.run(&selection, actions).await {
        Ok(summary) => {
            handler.result(summary.success(), None);
            summary.exit_code()
        }
        Err(err) => fail(handler, &err),
    }
}

/// Regenerate and patch the embedded scanner
pub async fn scanner(
    config: &SelfmtConfig,
    options: &ScannerOptions,
    handler: &dyn OutputHandler,
) -> i32 {
    match run_scanner(config, options).await {
        Ok(report) => {
            handler.emit(OutputEvent::ScannerPatched {
                path: report.path,
                generated: report.generated,
                rules: report.rules_fired.iter().map(|r| r.to_string()).collect(),
            });
            handler.result(true, None);
            0
        }
        Err(err) => fail(handler, &err),
    }
}

/// Check which external tools resolve
pub async fn doctor(config: &SelfmtConfig, handler: &dyn OutputHandler) -> i32 {
    let info = |message: String| handler.emit(OutputEvent::Info { message });

    info(format!("Repository root: {}", config.root.display()));
    let project_file = config.root.join(PROJECT_CONFIG_FILE);
    if project_file.exists() {
        info(format!("Project config: {}", project_file.display()));
    }
    if let Some(user_file) = SelfmtConfig::user_config_path().filter(|p| p.exists()) {
        info(format!("User config: {}", user_file.display()));
    }

    info("\nChecking tools...".into());

    let mut all_ok = true;
    match Formatter::discover(&config.formatter) {
        Ok(formatter) => info(format!(
            "✓ formatter ({})",
            formatter.program().display()
        )),
        Err(err) => {
            all_ok = false;
            info(format!("✗ formatter - {}", err));
        }
    }

    // git and the lexer generator are only needed by some commands
    for (label, name) in [
        ("git", config.git.program.as_str()),
        ("lexer generator", config.scanner.generator.as_str()),
    ] {
        match which::which(name) {
            Ok(path) => info(format!("✓ {} ({})", label, path.display())),
            Err(_) => info(format!("  {} ({} not found)", label, name)),
        }
    }

    match ScannerPatcher::new(&config.scanner.namespace) {
        Ok(patcher) => {
            let names: Vec<&str> = patcher.rules().iter().map(|r| r.name).collect();
            info(format!("\nScanner rules: {}", names.join(", ")));
        }
        Err(err) => {
            all_ok = false;
            info(format!("✗ scanner rules failed to compile: {}", err));
        }
    }

    if all_ok { 0 } else { 1 }
}
