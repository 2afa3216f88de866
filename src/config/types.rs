//! Configuration Types
//!
//! All configuration structures with sensible defaults. Built once at process
//! start and passed by reference into every stage.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ai::provider::ProviderConfig;
use crate::constants::{taxonomy as taxonomy_constants, traversal as traversal_constants};
use crate::types::{LcaError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub paths: PathsConfig,
    pub database: DatabaseConfig,
    /// Model used for category selection steps
    pub category_llm: ProviderConfig,
    /// Model used for the final material selection step
    pub material_llm: ProviderConfig,
    pub prompt: PromptSettings,
    pub dissection: DissectionConfig,
    pub retry: RetryConfig,
    pub traversal: TraversalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathsConfig::default(),
            database: DatabaseConfig::default(),
            category_llm: ProviderConfig::default(),
            material_llm: ProviderConfig::default(),
            prompt: PromptSettings::default(),
            dissection: DissectionConfig::default(),
            retry: RetryConfig::default(),
            traversal: TraversalConfig::default(),
        }
    }
}

impl Config {
    /// Validate value ranges. Returns `LcaError::Config` on failure.
    pub fn validate(&self) -> Result<()> {
        for (label, llm) in [
            ("category_llm", &self.category_llm),
            ("material_llm", &self.material_llm),
        ] {
            if !(0.0..=2.0).contains(&llm.temperature) {
                return Err(LcaError::Config(format!(
                    "{}.temperature must be between 0.0 and 2.0, got {}",
                    label, llm.temperature
                )));
            }
            if llm.timeout_secs == 0 {
                return Err(LcaError::Config(format!(
                    "{}.timeout_secs must be greater than 0",
                    label
                )));
            }
            if !crate::ai::provider::SUPPORTED_PROVIDERS.contains(&llm.provider.as_str()) {
                return Err(LcaError::Config(format!(
                    "{}.provider '{}' is not supported. Supported: {}",
                    label,
                    llm.provider,
                    crate::ai::provider::SUPPORTED_PROVIDERS.join(", ")
                )));
            }
        }

        if self.traversal.max_steps == 0 {
            return Err(LcaError::Config(
                "traversal.max_steps must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Check both input locations: the element directory and the taxonomy manifest.
    pub fn validate_paths(&self) -> Result<()> {
        self.require_elements_dir()?;
        self.require_taxonomy_root()?;
        Ok(())
    }

    /// Check that the element input directory exists.
    pub fn require_elements_dir(&self) -> Result<&Path> {
        let dir = self.paths.elements.as_path();
        if !dir.is_dir() {
            return Err(LcaError::Config(format!(
                "Elements directory not found: {}",
                dir.display()
            )));
        }
        Ok(dir)
    }

    /// Root of the selected database's taxonomy tree, which must carry a manifest.
    pub fn require_taxonomy_root(&self) -> Result<PathBuf> {
        let root = self.taxonomy_root();
        let manifest = root.join(taxonomy_constants::MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(LcaError::Config(format!(
                "Taxonomy manifest not found for database {}: {}",
                self.database.name,
                manifest.display()
            )));
        }
        Ok(root)
    }

    pub fn taxonomy_root(&self) -> PathBuf {
        self.paths
            .taxonomy_root
            .join(self.database.name.directory_name())
    }
}

// =============================================================================
// Paths
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// One JSON file per extracted element
    pub elements: PathBuf,
    /// Stage outputs are written below this directory
    pub work_dir: PathBuf,
    /// Contains one taxonomy tree per database (`KBOB/`, `OEKOBAUDAT/`)
    pub taxonomy_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            elements: PathBuf::from("data/input/elements"),
            work_dir: PathBuf::from("data/pipeline"),
            taxonomy_root: PathBuf::from("data/input/databases"),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub name: DatabaseKind,
}

/// Indicator database the taxonomy was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default]
    Kbob,
    Oekobaudat,
}

impl DatabaseKind {
    pub fn directory_name(&self) -> &'static str {
        match self {
            DatabaseKind::Kbob => "KBOB",
            DatabaseKind::Oekobaudat => "OEKOBAUDAT",
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseKind::Kbob => write!(f, "kbob"),
            DatabaseKind::Oekobaudat => write!(f, "oekobaudat"),
        }
    }
}

impl std::str::FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kbob" => Ok(DatabaseKind::Kbob),
            "oekobaudat" | "ökobaudat" => Ok(DatabaseKind::Oekobaudat),
            _ => Err(format!(
                "Unknown database: {}. Valid values: kbob, oekobaudat",
                s
            )),
        }
    }
}

// =============================================================================
// Prompt behaviour
// =============================================================================

/// Behaviour bundle handed to the classifier with every call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub reasoning: ReasoningStyle,
    pub language: PromptLanguage,
    pub strictness: Strictness,
    /// Offer `{Name, Density}` pairs instead of bare names at material nodes
    pub include_density: bool,
    pub include_examples: bool,
    /// Drop empty and placeholder values from the element context
    pub prune_empty: bool,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            reasoning: ReasoningStyle::Plain,
            language: PromptLanguage::En,
            strictness: Strictness::Mid,
            include_density: false,
            include_examples: false,
            prune_empty: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReasoningStyle {
    #[default]
    Plain,
    ChainOfThought,
    ExtractThenReason,
    SelfRefine,
}

impl std::fmt::Display for ReasoningStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningStyle::Plain => write!(f, "plain"),
            ReasoningStyle::ChainOfThought => write!(f, "chain-of-thought"),
            ReasoningStyle::ExtractThenReason => write!(f, "extract-then-reason"),
            ReasoningStyle::SelfRefine => write!(f, "self-refine"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptLanguage {
    #[default]
    En,
    De,
}

impl std::fmt::Display for PromptLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptLanguage::En => write!(f, "en"),
            PromptLanguage::De => write!(f, "de"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Low,
    #[default]
    Mid,
    High,
}

impl std::fmt::Display for Strictness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strictness::Low => write!(f, "low"),
            Strictness::Mid => write!(f, "mid"),
            Strictness::High => write!(f, "high"),
        }
    }
}

// =============================================================================
// Dissection
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DissectionConfig {
    pub zero_thickness: ZeroThicknessPolicy,
}

/// How to split a parent volume when the layer thicknesses sum to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZeroThicknessPolicy {
    /// Leave layer volumes empty and tag them `unknown split`
    #[default]
    Unknown,
    /// Give every layer the full parent volume (ratio 1.0)
    Duplicate,
}

// =============================================================================
// Retry / traversal
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first failed classification call (0 disables)
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub max_steps: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_steps: traversal_constants::DEFAULT_MAX_STEPS,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
