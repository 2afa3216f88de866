//! CLI Common Utilities
//!
//! Shared configuration loading for command handlers.

use std::path::Path;

use crate::config::{Config, ConfigLoader, DatabaseKind};
use crate::pipeline::WorkLayout;
use crate::types::Result;

/// Command execution context
///
/// Created via [`CommandContext::load`] once per invocation; the global
/// `--config` and `--database` flags are applied here.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    pub layout: WorkLayout,
}

impl CommandContext {
    pub fn load(config_path: Option<&Path>, database: Option<DatabaseKind>) -> Result<Self> {
        let config = ConfigLoader::load(config_path)?;
        Ok(Self::from_config(config, database))
    }

    /// Context for an already loaded configuration, with an optional database override
    pub fn from_config(mut config: Config, database: Option<DatabaseKind>) -> Self {
        if let Some(database) = database {
            config.database.name = database;
        }
        let layout = WorkLayout::new(config.paths.work_dir.clone());
        Self { config, layout }
    }
}
