//! Layer Dissector
//!
//! Splits multi-layer elements into one record per material layer so each
//! layer is classified on its own, and apportions the parent volume by
//! thickness share.
//!
//! Layer ids append `_L{n}` (1-based) to the parent id; [`strip_layer_suffix`]
//! recovers the parent id or name.

mod boq;
mod stage;

pub use boq::split_boq;
pub use stage::run_dissect;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::config::ZeroThicknessPolicy;
use crate::types::utils::round4;
use crate::types::{ElementMetadata, ElementRecord, GeometryData, MaterialKind, PropertySets};

static LAYER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_L(\d+)$").expect("valid layer suffix regex"));

// =============================================================================
// Layer identifiers
// =============================================================================

pub fn layer_id(parent_id: &str, layer_number: u32) -> String {
    format!("{}_L{}", parent_id, layer_number)
}

/// Parent id of a layer id; other ids are returned unchanged.
pub fn strip_layer_suffix(id: &str) -> &str {
    match LAYER_SUFFIX.find(id) {
        Some(m) => &id[..m.start()],
        None => id,
    }
}

/// Split a layer id into parent id and layer number.
pub fn parse_layer_id(id: &str) -> Option<(&str, u32)> {
    let caps = LAYER_SUFFIX.captures(id)?;
    let whole = caps.get(0)?;
    let number = caps.get(1)?.as_str().parse().ok()?;
    Some((&id[..whole.start()], number))
}

// =============================================================================
// Layer records
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetLayer {
    #[serde(rename = "Material Name")]
    pub material_name: String,
    #[serde(rename = "Thickness")]
    pub thickness: f64,
    #[serde(rename = "Thickness Unit")]
    pub thickness_unit: String,
    #[serde(rename = "Layer Number")]
    pub layer_number: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementContext {
    #[serde(rename = "Element Metadata", default)]
    pub metadata: ElementMetadata,
    #[serde(rename = "Other Material Layers", default)]
    pub other_layers: Vec<TargetLayer>,
    /// The layer set entry without its layer list
    #[serde(
        rename = "Layer Set Metadata",
        default,
        skip_serializing_if = "Value::is_null"
    )]
    pub layer_set: Value,
    #[serde(rename = "Element Geometry Data", default)]
    pub geometry: GeometryData,
    #[serde(rename = "Element Property Sets", default)]
    pub property_sets: PropertySets,
    #[serde(
        rename = "Element Location",
        default,
        skip_serializing_if = "Value::is_null"
    )]
    pub location: Value,
}

/// One target layer plus the element it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRecord {
    #[serde(rename = "Target Layer of Material Inference")]
    pub target: TargetLayer,
    #[serde(rename = "Building Element Context")]
    pub context: ElementContext,
    #[serde(rename = "CompilationGroupID")]
    pub id: String,
}

impl LayerRecord {
    pub fn display_name(&self) -> String {
        format!(
            "{} (L{})",
            self.context.metadata.name.as_deref().unwrap_or("Unnamed"),
            self.target.layer_number
        )
    }
}

fn layer_of(layer: &crate::types::MaterialLayer, number: u32) -> TargetLayer {
    TargetLayer {
        material_name: layer
            .material_name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        thickness: layer.thickness.unwrap_or(0.0),
        thickness_unit: layer
            .thickness_unit
            .clone()
            .unwrap_or_else(|| "N/A".to_string()),
        layer_number: number,
    }
}

/// Layer records of a multi-layer element; `None` for zero or one layer.
pub fn dissect_element(element: &ElementRecord) -> Option<Vec<LayerRecord>> {
    let set = element.layer_set()?;
    if set.layers.len() < 2 {
        return None;
    }
    let parent_id = element.record_id()?;

    let mut layer_set = Map::new();
    if let Some(entity) = &set.ifc_entity {
        layer_set.insert("IfcEntity".into(), Value::String(entity.clone()));
    }
    if let Some(name) = &set.layer_set_name {
        layer_set.insert("Layer Set Name".into(), Value::String(name.clone()));
    }
    layer_set.extend(set.extra.clone());

    let all: Vec<TargetLayer> = set
        .layers
        .iter()
        .zip(1u32..)
        .map(|(layer, n)| layer_of(layer, n))
        .collect();

    let records = all
        .iter()
        .map(|target| LayerRecord {
            target: target.clone(),
            context: ElementContext {
                metadata: element.metadata.clone(),
                other_layers: all
                    .iter()
                    .filter(|l| l.layer_number != target.layer_number)
                    .cloned()
                    .collect(),
                layer_set: Value::Object(layer_set.clone()),
                geometry: element.geometry.clone(),
                property_sets: element.property_sets.clone(),
                location: element.location.clone(),
            },
            id: layer_id(parent_id, target.layer_number),
        })
        .collect();
    Some(records)
}

/// Material shown in the BOQ for an element that is not dissected
pub fn material_descriptor(element: &ElementRecord) -> Option<String> {
    element.materials.iter().find_map(|m| match m.kind()? {
        MaterialKind::Material => m.material_name.clone(),
        MaterialKind::LayerSet | MaterialKind::LayerSetUsage => {
            m.layers.first().and_then(|l| l.material_name.clone())
        }
        MaterialKind::Other(_) => None,
    })
}

// =============================================================================
// Apportionment
// =============================================================================

/// Layers of one dissected element, used to split its BOQ row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerPlan {
    pub layers: Vec<PlannedLayer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLayer {
    pub number: u32,
    pub material_name: String,
    /// Thickness in metres, 0 when unknown
    pub thickness_m: f64,
}

impl LayerPlan {
    pub fn from_element(element: &ElementRecord) -> Option<Self> {
        let set = element.layer_set()?;
        if set.layers.len() < 2 {
            return None;
        }
        let layers = set
            .layers
            .iter()
            .zip(1u32..)
            .map(|(layer, number)| PlannedLayer {
                number,
                material_name: layer
                    .material_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                thickness_m: layer.thickness_m().unwrap_or(0.0),
            })
            .collect();
        Some(Self { layers })
    }

    pub fn total_thickness(&self) -> f64 {
        self.layers.iter().map(|l| l.thickness_m).sum()
    }

    pub fn ratios(&self, policy: ZeroThicknessPolicy) -> Option<Vec<f64>> {
        let thicknesses: Vec<f64> = self.layers.iter().map(|l| l.thickness_m).collect();
        layer_ratios(&thicknesses, policy)
    }
}

/// Share of the parent volume per layer.
///
/// `None` means the split is unknown: total thickness is zero and the policy
/// does not duplicate.
pub fn layer_ratios(thicknesses: &[f64], policy: ZeroThicknessPolicy) -> Option<Vec<f64>> {
    let total: f64 = thicknesses.iter().sum();
    if total > 0.0 {
        return Some(thicknesses.iter().map(|t| t / total).collect());
    }
    match policy {
        ZeroThicknessPolicy::Duplicate => Some(vec![1.0; thicknesses.len()]),
        ZeroThicknessPolicy::Unknown => None,
    }
}

/// Apportion a parent volume; each share is rounded to 4 decimals.
pub fn apportion(volume: Option<f64>, ratios: Option<&[f64]>, layers: usize) -> Vec<Option<f64>> {
    match ratios {
        Some(ratios) => ratios
            .iter()
            .map(|ratio| volume.map(|v| round4(v * ratio)))
            .collect(),
        None => vec![None; layers],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn wall() -> ElementRecord {
        serde_json::from_value(json!({
            "Element Metadata": {"GlobalId": "W1", "Name": "Wall", "Type": "IfcWall", "ObjectType": "Ext"},
            "Element Material Data": [{
                "IfcEntity": "IfcMaterialLayerSetUsage",
                "Layer Set Name": "Ext 200",
                "Direction": "AXIS2",
                "Layers": [
                    {"Material Name": "Plaster", "Thickness": 50, "Thickness unit": "mm"},
                    {"Material Name": "Brick", "Thickness": 100, "Thickness unit": "mm"},
                    {"Material Name": "Render", "Thickness": 50, "Thickness unit": "mm"}
                ]
            }],
            "Element Geometry Data": {"Quantities (IFC)": {"Net Volume": 1.0}},
            "Element Location": {"Storey": "EG"}
        }))
        .unwrap()
    }

    #[test]
    fn test_layer_id_round_trip() {
        assert_eq!(layer_id("abc", 2), "abc_L2");
        assert_eq!(strip_layer_suffix("abc_L2"), "abc");
        assert_eq!(strip_layer_suffix("abc"), "abc");
        assert_eq!(strip_layer_suffix("abc_Lx"), "abc_Lx");
        assert_eq!(parse_layer_id("g1_L12"), Some(("g1", 12)));
        assert_eq!(parse_layer_id("g1"), None);
    }

    #[test]
    fn test_dissect_three_layers() {
        let records = dissect_element(&wall()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "W1_L1");
        assert_eq!(records[1].target.material_name, "Brick");
        assert_eq!(records[1].target.layer_number, 2);
        let others: Vec<u32> = records[1]
            .context
            .other_layers
            .iter()
            .map(|l| l.layer_number)
            .collect();
        assert_eq!(others, vec![1, 3]);
        assert_eq!(records[0].context.layer_set["Layer Set Name"], "Ext 200");
        assert_eq!(records[0].context.layer_set["Direction"], "AXIS2");
        assert!(records[0].context.layer_set.get("Layers").is_none());
        assert_eq!(records[2].display_name(), "Wall (L3)");

        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["CompilationGroupID"], "W1_L1");
        assert_eq!(value["Target Layer of Material Inference"]["Thickness Unit"], "mm");
        assert_eq!(value["Building Element Context"]["Element Location"]["Storey"], "EG");
    }

    #[test]
    fn test_dissect_prefers_group_id() {
        let mut element = wall();
        element.group_id = Some("g7".into());
        let records = dissect_element(&element).unwrap();
        assert_eq!(records[2].id, "g7_L3");
    }

    #[test]
    fn test_single_layer_passes_through() {
        let element: ElementRecord = serde_json::from_value(json!({
            "Element Metadata": {"GlobalId": "S"},
            "Element Material Data": [{
                "IfcEntity": "IfcMaterialLayerSet",
                "Layers": [{"Material Name": "Concrete", "Thickness": 0.25}]
            }]
        }))
        .unwrap();
        assert!(dissect_element(&element).is_none());
        assert!(LayerPlan::from_element(&element).is_none());
        assert_eq!(material_descriptor(&element).as_deref(), Some("Concrete"));
    }

    #[test]
    fn test_apportion_by_thickness() {
        let plan = LayerPlan::from_element(&wall()).unwrap();
        assert!((plan.total_thickness() - 0.2).abs() < 1e-12);
        let ratios = plan.ratios(ZeroThicknessPolicy::Unknown).unwrap();
        let volumes = apportion(Some(1.0), Some(&ratios), 3);
        assert_eq!(volumes, vec![Some(0.25), Some(0.5), Some(0.25)]);
    }

    #[test]
    fn test_zero_thickness_policies() {
        let zero = [0.0, 0.0, 0.0];
        assert_eq!(layer_ratios(&zero, ZeroThicknessPolicy::Unknown), None);
        let dup = layer_ratios(&zero, ZeroThicknessPolicy::Duplicate).unwrap();
        assert_eq!(apportion(Some(1.0), Some(&dup), 3), vec![Some(1.0); 3]);
        assert_eq!(apportion(Some(1.0), None, 3), vec![None; 3]);
    }

    proptest! {
        #[test]
        fn test_strip_layer_suffix_round_trip(id in "[A-Za-z0-9$_]{1,22}", n in 1u32..500) {
            let layered = layer_id(&id, n);
            prop_assert_eq!(strip_layer_suffix(&layered), id.as_str());
            prop_assert_eq!(parse_layer_id(&layered), Some((id.as_str(), n)));
        }

        #[test]
        fn test_apportion_conserves_volume(
            thicknesses in prop::collection::vec(0.001f64..1.0, 2..8),
            volume in 0.0f64..1000.0,
        ) {
            let ratios = layer_ratios(&thicknesses, ZeroThicknessPolicy::Unknown).unwrap();
            let parts = apportion(Some(volume), Some(&ratios), thicknesses.len());
            prop_assert_eq!(parts.len(), thicknesses.len());
            let sum: f64 = parts.iter().map(|p| p.unwrap()).sum();
            let tolerance = 0.00005 * thicknesses.len() as f64 + 1e-9;
            prop_assert!((sum - volume).abs() <= tolerance);
        }
    }
}
