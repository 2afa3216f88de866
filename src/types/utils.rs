//! Shared helpers for lenient value extraction and file handling.
//!
//! ## JSON Extraction Helpers
//!
//! Element exports come from different authoring tools, so numbers arrive as
//! JSON numbers, numeric strings, or placeholder strings. These helpers
//! normalise them:
//! - `lenient_f64` - numbers and numeric strings, anything else is absent
//! - `is_placeholder` - `"Not defined"`, `"Unknown"`, `"None"`, empty

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::types::{LcaError, Result};

/// Strings that mark a field as never populated
pub const PLACEHOLDERS: &[&str] = &["not defined", "unknown", "none", "n/a", "null"];

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// True for strings that stand in for a missing value
#[inline]
pub fn is_placeholder(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str())
}

/// Interpret a JSON value as a number, treating anything unparsable as absent.
pub fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite()),
        _ => None,
    }
}


/// Round half away from zero to a fixed number of decimals.
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round to 4 decimals, the precision used for all quantities and indicators.
#[inline]
pub fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

// =============================================================================
// File Helpers
// =============================================================================

/// Read and deserialize a JSON file, mapping failures to a parse error with the path.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| LcaError::parse(path.display().to_string(), e.to_string()))
}

/// Serialize to pretty JSON and write, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// All `*.json` files directly inside `dir`, sorted by file name.
///
/// Sorting fixes the input order so representative selection is stable.
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = dir.join("*.json");
    let pattern = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| LcaError::Config(format!("Invalid path pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// File stem as an owned string
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Empty a stage-owned output directory, creating it when missing.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Fail with a stage error when an upstream artifact is missing.
pub fn require_file(path: &Path, stage: &str, produced_by: &str) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(LcaError::stage(
        stage,
        format!(
            "{} not found; run the {} stage first",
            path.display(),
            produced_by
        ),
    ))
}

/// Replace characters that are unsafe in file names.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
