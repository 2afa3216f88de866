//! Taxonomy tree of an indicator database.
//!
//! Every node directory carries an `index.json` manifest:
//!
//! ```json
//! {"type": "categories", "items": [{"name": "Concrete", "path": "concrete/index.json"}]}
//! {"type": "materials",  "items": [{"Name": "Lean concrete", "Density (kg/m3)": 2200, ...}]}
//! ```
//!
//! `mixed` nodes hold both kinds of items. Material items are the full
//! indicator records that enrichment later projects onto its allow-list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::constants::taxonomy::{
    DENSITY_FIELD, DENSITY_OPTION_LABEL, MANIFEST_FILE, MAX_MATERIAL_OPTIONS,
    MAX_MATERIAL_OPTIONS_WITH_DENSITY,
};
use crate::types::utils::{lenient_f64, read_json};
use crate::types::{LcaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Categories,
    Materials,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Child category entry of a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    pub name: String,
    /// Relative to the node directory; may point at the child's manifest
    pub path: String,
}

// =============================================================================
// Node
// =============================================================================

#[derive(Debug, Clone)]
pub struct TaxonomyNode {
    dir: PathBuf,
    manifest: Manifest,
}

impl TaxonomyNode {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(LcaError::taxonomy(
                dir.display().to_string(),
                format!("missing {}", MANIFEST_FILE),
            ));
        }
        let manifest: Manifest = read_json(&path)
            .map_err(|e| LcaError::taxonomy(path.display().to_string(), e.to_string()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn kind(&self) -> NodeKind {
        self.manifest.kind
    }

    pub fn categories(&self) -> Vec<CategoryEntry> {
        if self.manifest.kind == NodeKind::Materials {
            return Vec::new();
        }
        self.manifest
            .items
            .iter()
            .filter_map(|item| {
                let name = item.get("name")?.as_str()?.trim();
                let path = item.get("path")?.as_str()?;
                (!name.is_empty()).then(|| CategoryEntry {
                    name: name.to_string(),
                    path: path.to_string(),
                })
            })
            .collect()
    }

    /// Material records, i.e. items carrying a `Name`
    pub fn materials(&self) -> impl Iterator<Item = &Map<String, Value>> {
        let include = self.manifest.kind != NodeKind::Categories;
        self.manifest
            .items
            .iter()
            .filter(move |_| include)
            .filter_map(Value::as_object)
            .filter(|item| {
                item.get("Name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| !n.trim().is_empty())
            })
    }

    pub fn has_categories(&self) -> bool {
        !self.categories().is_empty()
    }

    pub fn has_materials(&self) -> bool {
        self.materials().next().is_some()
    }

    /// Category names offered to the classifier, deduplicated ignoring case and sorted.
    pub fn category_options(&self) -> Vec<String> {
        let names: Vec<String> = self.categories().into_iter().map(|c| c.name).collect();
        dedup_casefold(names)
    }

    /// Material options offered to the classifier.
    ///
    /// Plain names are sorted and capped at 40. With densities, the first 30
    /// `{Name, Density}` objects in manifest order.
    pub fn material_options(&self, include_density: bool) -> Vec<Value> {
        let mut seen = HashSet::new();
        let named: Vec<(&str, &Map<String, Value>)> = self
            .materials()
            .filter_map(|item| {
                let name = item.get("Name").and_then(Value::as_str)?.trim();
                seen.insert(name.to_lowercase()).then_some((name, item))
            })
            .collect();

        if include_density {
            named
                .into_iter()
                .take(MAX_MATERIAL_OPTIONS_WITH_DENSITY)
                .map(|(name, item)| {
                    let mut option = Map::new();
                    option.insert("Name".into(), Value::String(name.to_string()));
                    if let Some(density) = item.get(DENSITY_FIELD).filter(|d| has_density(d)) {
                        let density = lenient_f64(density)
                            .map(|d| json!(d))
                            .unwrap_or_else(|| density.clone());
                        option.insert(DENSITY_OPTION_LABEL.into(), density);
                    }
                    Value::Object(option)
                })
                .collect()
        } else {
            let mut names: Vec<&str> = named.into_iter().map(|(name, _)| name).collect();
            names.sort_by_key(|name| name.to_lowercase());
            names
                .into_iter()
                .take(MAX_MATERIAL_OPTIONS)
                .map(|name| Value::String(name.to_string()))
                .collect()
        }
    }

    /// Child category by name; exact match first, then ignoring case.
    pub fn find_category(&self, name: &str) -> Option<CategoryEntry> {
        let categories = self.categories();
        let wanted = name.trim();
        categories
            .iter()
            .find(|c| c.name == wanted)
            .or_else(|| {
                categories
                    .iter()
                    .find(|c| c.name.to_lowercase() == wanted.to_lowercase())
            })
            .cloned()
    }

    /// Directory of a child category
    pub fn child_dir(&self, entry: &CategoryEntry) -> PathBuf {
        let relative = Path::new(&entry.path);
        let relative = if relative.file_name().and_then(|f| f.to_str()) == Some(MANIFEST_FILE) {
            relative.parent().unwrap_or(relative)
        } else {
            relative
        };
        self.dir.join(relative)
    }

    pub fn child(&self, entry: &CategoryEntry) -> Result<TaxonomyNode> {
        TaxonomyNode::load(&self.child_dir(entry))
    }

    /// Material record by name, exact match first, then ignoring case.
    pub fn find_material(&self, name: &str) -> Option<&Map<String, Value>> {
        let wanted = name.trim();
        let matches = |item: &&Map<String, Value>, exact: bool| {
            item.get("Name").and_then(Value::as_str).is_some_and(|n| {
                if exact {
                    n.trim() == wanted
                } else {
                    n.trim().to_lowercase() == wanted.to_lowercase()
                }
            })
        };
        self.materials()
            .find(|item| matches(item, true))
            .or_else(|| self.materials().find(|item| matches(item, false)))
    }
}

fn dedup_casefold(names: Vec<String>) -> Vec<String> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for name in names {
        seen.entry(name.to_lowercase()).or_insert(name);
    }
    seen.into_values().collect()
}

/// Null, empty and zero densities are left out of the options
fn has_density(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|d| d != 0.0),
        _ => true,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::types::utils::write_json;

    /// Root with `Concrete` (materials leaf), `Insulation` (mixed) and `Metals`
    /// (categories with one `Steel` leaf).
    pub fn write_taxonomy(root: &Path) {
        write_json(
            &root.join(MANIFEST_FILE),
            &json!({"type": "categories", "items": [
                {"name": "Concrete", "path": "concrete/index.json"},
                {"name": "Insulation", "path": "insulation"},
                {"name": "Metals", "path": "metals/index.json"},
                {"name": "concrete", "path": "concrete/index.json"}
            ]}),
        )
        .unwrap();
        write_json(
            &root.join("concrete").join(MANIFEST_FILE),
            &json!({"type": "materials", "items": [
                {"Name": "Lean concrete", "ID": "01.001", "Density (kg/m3)": 2200,
                 "Reference": "kg",
                 "Global Warming Potential Total [kgCO2-eqv]": 0.0624},
                {"Name": "Reinforced concrete", "ID": "01.002", "Density (kg/m3)": "2400",
                 "Reference": "m3",
                 "Global Warming Potential Total [kgCO2-eqv]": 300.0}
            ]}),
        )
        .unwrap();
        write_json(
            &root.join("insulation").join(MANIFEST_FILE),
            &json!({"type": "mixed", "items": [
                {"name": "Mineral wool", "path": "mineral/index.json"},
                {"Name": "EPS", "Density (kg/m3)": 20, "Reference": "kg",
                 "Global Warming Potential Total [kgCO2-eqv]": 3.3}
            ]}),
        )
        .unwrap();
        write_json(
            &root.join("insulation").join("mineral").join(MANIFEST_FILE),
            &json!({"type": "materials", "items": [
                {"Name": "Glass wool", "Density (kg/m3)": 30, "Reference": "kg",
                 "Global Warming Potential Total [kgCO2-eqv]": 1.2}
            ]}),
        )
        .unwrap();
        write_json(
            &root.join("metals").join(MANIFEST_FILE),
            &json!({"type": "categories", "items": [
                {"name": "Steel", "path": "steel/index.json"}
            ]}),
        )
        .unwrap();
        write_json(
            &root.join("metals").join("steel").join(MANIFEST_FILE),
            &json!({"type": "materials", "items": [
                {"Name": "Steel profile", "Reference": "m",
                 "Global Warming Potential Total [kgCO2-eqv]": 10.0}
            ]}),
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::write_taxonomy;
    use super::*;
    use crate::types::utils::write_json;
    use tempfile::TempDir;

    #[test]
    fn test_category_options_dedup_sorted() {
        let dir = TempDir::new().unwrap();
        write_taxonomy(dir.path());
        let root = TaxonomyNode::load(dir.path()).unwrap();
        assert_eq!(root.kind(), NodeKind::Categories);
        assert_eq!(
            root.category_options(),
            vec!["Concrete", "Insulation", "Metals"]
        );
        assert!(!root.has_materials());
    }

    #[test]
    fn test_child_resolution() {
        let dir = TempDir::new().unwrap();
        write_taxonomy(dir.path());
        let root = TaxonomyNode::load(dir.path()).unwrap();

        let concrete = root.find_category("concrete").unwrap();
        let node = root.child(&concrete).unwrap();
        assert_eq!(node.kind(), NodeKind::Materials);
        assert_eq!(node.dir(), dir.path().join("concrete"));

        let insulation = root.child(&root.find_category("Insulation").unwrap()).unwrap();
        assert_eq!(insulation.kind(), NodeKind::Mixed);
        assert!(insulation.has_categories());
        assert!(insulation.has_materials());

        assert!(root.find_category("Timber").is_none());
    }

    #[test]
    fn test_material_options() {
        let dir = TempDir::new().unwrap();
        write_taxonomy(dir.path());
        let node = TaxonomyNode::load(&dir.path().join("concrete")).unwrap();
        assert_eq!(
            node.material_options(false),
            vec![json!("Lean concrete"), json!("Reinforced concrete")]
        );
        let with_density = node.material_options(true);
        assert_eq!(with_density[1]["Density [kg/m³]"], json!(2400.0));
        assert_eq!(node.find_material("reinforced concrete").unwrap()["ID"], "01.002");
    }

    #[test]
    fn test_material_options_are_capped() {
        let dir = TempDir::new().unwrap();
        let items: Vec<Value> = (0..50)
            .map(|i| json!({"Name": format!("Material {:02}", i), "Density (kg/m3)": i}))
            .collect();
        write_json(
            &dir.path().join(MANIFEST_FILE),
            &json!({"type": "materials", "items": items}),
        )
        .unwrap();
        let node = TaxonomyNode::load(dir.path()).unwrap();
        assert_eq!(node.material_options(false).len(), MAX_MATERIAL_OPTIONS);
        assert_eq!(
            node.material_options(true).len(),
            MAX_MATERIAL_OPTIONS_WITH_DENSITY
        );
    }

    #[test]
    fn test_density_options_keep_manifest_order() {
        let dir = TempDir::new().unwrap();
        let mut items: Vec<Value> = (0..35)
            .rev()
            .map(|i| json!({"Name": format!("Material {:02}", i), "Density (kg/m3)": i}))
            .collect();
        items.push(json!({"Name": "material 34", "Density (kg/m3)": 1}));
        write_json(
            &dir.path().join(MANIFEST_FILE),
            &json!({"type": "materials", "items": items}),
        )
        .unwrap();
        let node = TaxonomyNode::load(dir.path()).unwrap();

        let options = node.material_options(true);
        assert_eq!(options.len(), MAX_MATERIAL_OPTIONS_WITH_DENSITY);
        assert_eq!(options[0]["Name"], "Material 34");
        assert_eq!(options[0]["Density [kg/m³]"], json!(34.0));
        assert_eq!(options[29]["Name"], "Material 05");

        let names = node.material_options(false);
        assert_eq!(names.len(), 35);
        assert_eq!(names[0], "Material 00");
    }

    #[test]
    fn test_zero_density_is_omitted() {
        let dir = TempDir::new().unwrap();
        write_json(
            &dir.path().join(MANIFEST_FILE),
            &json!({"type": "materials", "items": [
                {"Name": "Membrane", "Density (kg/m3)": 0},
                {"Name": "Sealant", "Density (kg/m3)": ""}
            ]}),
        )
        .unwrap();
        let node = TaxonomyNode::load(dir.path()).unwrap();
        let options = node.material_options(true);
        assert_eq!(options, vec![json!({"Name": "Membrane"}), json!({"Name": "Sealant"})]);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let err = TaxonomyNode::load(dir.path()).unwrap_err();
        assert!(matches!(err, LcaError::Taxonomy { .. }));
    }
}
