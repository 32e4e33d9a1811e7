use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive for the crate target
fn filter_directive(debug: bool, quiet: bool) -> &'static str {
    if debug {
        "selfmt=debug"
    } else if quiet {
        "selfmt=error"
    } else {
        "selfmt=info"
    }
}

/// Initialize logging: human-readable on stderr, JSON lines appended to
/// `log_file` when one is given.
pub fn init_logging(debug: bool, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_line_number(debug)
        .with_file(debug)
        .with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;

            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(file)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directive(debug, quiet)))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
