//! Configuration types and loading for selfmt

mod loader;

pub use loader::{FormatterConfig, HeaderConfig, PROJECT_CONFIG_FILE, SelfmtConfig, has_suffix};
