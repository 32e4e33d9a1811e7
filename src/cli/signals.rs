//! Signal handling for graceful shutdown
//!
//! A signal never interrupts a file mid-write; the batch checks the flag
//! between files and stops there.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global shutdown flag
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if shutdown has been requested
pub fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Request shutdown
pub fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Wait for SIGINT/SIGTERM (Ctrl+C elsewhere) and raise the shutdown flag.
///
/// Spawn this as a background task; if the handlers cannot be installed the
/// run simply continues without graceful shutdown.
pub async fn setup_signal_handlers() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(int), Ok(term)) => (int, term),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "Failed to install signal handlers");
                    return;
                }
            };

        tokio::select! {
            _ = sigint.recv() => {
                eprintln!("\nReceived SIGINT, finishing current file...");
            }
            _ = sigterm.recv() => {
                eprintln!("\nReceived SIGTERM, finishing current file...");
            }
        }

        request_shutdown();
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        eprintln!("\nReceived Ctrl+C, finishing current file...");
        request_shutdown();
    }
}

#[cfg(test)]
pub(crate) fn reset_shutdown() {
    SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_flag() {
        reset_shutdown();
        assert!(!is_shutdown_requested());

        request_shutdown();
        assert!(is_shutdown_requested());

        reset_shutdown();
    }
}
