//! CLI module for selfmt
//!
//! This module provides:
//! - Command implementations (run, scanner, doctor)
//! - Output handlers (console, JSON, quiet)
//! - Signal handling for graceful shutdown
//!
//! # Example
//!
//! ```ignore
//! use selfmt::cli::{commands, output};
//!
//! let handler = output::create_handler(output::OutputMode::Console, false);
//! let exit_code = commands::run(&config, TargetSelection::Dirs, actions, &*handler).await;
//! ```

pub mod commands;
pub mod output;
pub mod signals;

pub use output::{OutputMode, create_handler};
pub use signals::setup_signal_handlers;
