//! Configuration Management
//!
//! Hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/bimlca/config.toml`)
//! 3. Project config (`bimlca.toml`)
//! 4. Explicit `--config` file
//! 5. Environment variables (`BIMLCA_*`)
//! 6. CLI arguments (highest priority)

mod loader;
mod types;

pub use loader::{ConfigLoader, ENV_PREFIX, PROJECT_CONFIG_FILE};
pub use types::*;
