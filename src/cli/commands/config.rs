//! Config Command
//!
//! Usage:
//!   bimlca config show [--json]
//!   bimlca config path
//!   bimlca config init [--force]

use crate::cli::{CommandContext, Output};
use crate::config::{ConfigLoader, PROJECT_CONFIG_FILE};
use crate::types::Result;

/// Print the effective configuration after all sources are merged
pub fn show(ctx: &CommandContext, json: bool) -> Result<()> {
    println!("{}", ConfigLoader::render(&ctx.config, json)?);
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Write `bimlca.toml` into the current directory
pub fn init(force: bool) -> Result<()> {
    let out = Output::new();
    let root = std::env::current_dir()?;
    let existed = root.join(PROJECT_CONFIG_FILE).exists();

    let path = ConfigLoader::init_project(&root, force)?;
    if existed && !force {
        out.warning(&format!(
            "{} already exists; use --force to overwrite",
            path.display()
        ));
    } else {
        out.success(&format!("Initialized project configuration: {}", path.display()));
    }
    Ok(())
}
