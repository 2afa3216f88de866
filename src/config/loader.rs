//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (`<config dir>/bimlca/config.toml`)
//! 3. Project config (`bimlca.toml` in the working directory)
//! 4. Explicit file passed with `--config`
//! 5. Environment variables (`BIMLCA_` prefix, `__` between sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{LcaError, Result};

/// Project-level config file name
pub const PROJECT_CONFIG_FILE: &str = "bimlca.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BIMLCA_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with the full resolution chain:
    /// defaults → global → project → explicit file → env vars
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(LcaError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // e.g. BIMLCA_DATABASE__NAME=oekobaudat -> database.name
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| LcaError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only (defaults + file)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| LcaError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config directory (e.g. `~/.config/bimlca/`)
    pub fn global_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "bimlca").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_config_path() -> PathBuf {
        PathBuf::from(PROJECT_CONFIG_FILE)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Print config file locations and whether they exist
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration as TOML or JSON
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| LcaError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write a commented project config into `dir`
    pub fn init_project(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let config_path = dir.join(PROJECT_CONFIG_FILE);
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        } else {
            info!("Project config exists: {}", config_path.display());
        }
        Ok(config_path)
    }

    fn default_project_config() -> String {
        r#"# bimlca project configuration
# Environment variables override these values, e.g. BIMLCA_DATABASE__NAME=oekobaudat

version = "1.0"

[paths]
elements = "data/input/elements"
work_dir = "data/pipeline"
taxonomy_root = "data/input/databases"

[database]
name = "kbob"   # kbob | oekobaudat

# API keys are read from OPENAI_API_KEY / ANTHROPIC_API_KEY
[category_llm]
provider = "openai"
model = "gpt-4o-mini"
timeout_secs = 120
temperature = 0.0

[material_llm]
provider = "openai"
model = "gpt-4o"
timeout_secs = 120
temperature = 0.0

[prompt]
reasoning = "plain"   # plain | chain-of-thought | extract-then-reason | self-refine
language = "en"       # en | de
strictness = "mid"    # low | mid | high
include_density = false
prune_empty = true

[dissection]
zero_thickness = "unknown"   # unknown | duplicate

[retry]
max_retries = 1
base_delay_ms = 500
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseKind, ZeroThicknessPolicy};
    use tempfile::TempDir;

    #[test]
    fn test_default_template_parses() {
        let dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_project(dir.path(), false).unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.material_llm.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.category_llm.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[database]\nname = \"oekobaudat\"\n[dissection]\nzero_thickness = \"duplicate\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.database.name, DatabaseKind::Oekobaudat);
        assert_eq!(
            config.dissection.zero_thickness,
            ZeroThicknessPolicy::Duplicate
        );
        assert_eq!(config.retry.max_retries, 1);
    }

    #[test]
    fn test_invalid_database_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[database]\nname = \"ecoinvent\"\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(LcaError::Config(_))
        ));
    }

    #[test]
    fn test_init_project_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(&path, "version = \"1.0\"\n").unwrap();
        ConfigLoader::init_project(dir.path(), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version = \"1.0\"\n");
    }

    #[test]
    fn test_render_hides_api_key() {
        let mut config = Config::default();
        config.material_llm.api_key = Some("sk-secret".into());
        let rendered = ConfigLoader::render(&config, false).unwrap();
        assert!(!rendered.contains("sk-secret"));
        let json = ConfigLoader::render(&config, true).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let result = ConfigLoader::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(LcaError::Config(_))));
    }
}
