//! Element record as exported from the IFC model.
//!
//! Key names are the literal contract shared with the extraction tool and
//! with every downstream stage. Placeholder strings (`"Not defined"`,
//! `"Unknown"`, `"None"`) are read as absent values; keys this module does
//! not model are kept in `extra` maps and written back unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::utils::{is_placeholder, lenient_f64};

/// One extracted building element (or group representative).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementRecord {
    #[serde(rename = "Element Metadata", default)]
    pub metadata: ElementMetadata,

    #[serde(
        rename = "Element Material Data",
        default,
        deserialize_with = "list_or_placeholder"
    )]
    pub materials: Vec<MaterialEntry>,

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

    /// Injected by aggregation (group id) or dissection (`{id}_L{n}`)
    #[serde(
        rename = "CompilationGroupID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ElementRecord {
    /// Identifier used for downstream joins: the group id when present, else the GlobalId.
    pub fn record_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or(self.metadata.global_id.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("Unnamed")
    }

    /// First material entry that carries an ordered layer list.
    pub fn layer_set(&self) -> Option<&MaterialEntry> {
        self.materials.iter().find(|m| {
            matches!(
                m.kind(),
                Some(MaterialKind::LayerSet) | Some(MaterialKind::LayerSetUsage)
            ) && !m.layers.is_empty()
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementMetadata {
    #[serde(
        rename = "Name",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(
        rename = "GlobalId",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub global_id: Option<String>,

    /// IFC entity, e.g. `IfcWall`
    #[serde(
        rename = "Type",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub entity: Option<String>,

    #[serde(
        rename = "ObjectType",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub object_type: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Materials
// =============================================================================

/// Kind of IFC material relationship attached to an element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Material,
    LayerSet,
    LayerSetUsage,
    Other(String),
}

impl MaterialKind {
    pub fn parse(entity: &str) -> Self {
        match entity {
            "IfcMaterial" => Self::Material,
            "IfcMaterialLayerSet" => Self::LayerSet,
            "IfcMaterialLayerSetUsage" => Self::LayerSetUsage,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Material => "IfcMaterial",
            Self::LayerSet => "IfcMaterialLayerSet",
            Self::LayerSetUsage => "IfcMaterialLayerSetUsage",
            Self::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialEntry {
    #[serde(
        rename = "IfcEntity",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub ifc_entity: Option<String>,

    #[serde(
        rename = "Material Name",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub material_name: Option<String>,

    #[serde(
        rename = "Layer Set Name",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub layer_set_name: Option<String>,

    #[serde(
        rename = "Layers",
        default,
        deserialize_with = "list_or_placeholder",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub layers: Vec<MaterialLayer>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MaterialEntry {
    pub fn kind(&self) -> Option<MaterialKind> {
        self.ifc_entity.as_deref().map(MaterialKind::parse)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialLayer {
    #[serde(
        rename = "Material Name",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub material_name: Option<String>,

    #[serde(
        rename = "Thickness",
        default,
        deserialize_with = "opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub thickness: Option<f64>,

    #[serde(
        rename = "Thickness unit",
        default,
        deserialize_with = "opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub thickness_unit: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MaterialLayer {
    /// Thickness converted to metres using the declared unit.
    ///
    /// Unitless thicknesses are taken as metres.
    pub fn thickness_m(&self) -> Option<f64> {
        let factor = match self
            .thickness_unit
            .as_deref()
            .map(|u| u.trim().to_lowercase())
            .as_deref()
        {
            Some("mm") | Some("millimetre") | Some("millimeter") => 0.001,
            Some("cm") | Some("centimetre") | Some("centimeter") => 0.01,
            Some("dm") => 0.1,
            _ => 1.0,
        };
        self.thickness.map(|t| t * factor)
    }
}

// =============================================================================
// Geometry and property sets
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometryData {
    /// Quantities declared in the IFC quantity sets
    #[serde(
        rename = "Quantities (IFC)",
        default,
        deserialize_with = "map_or_placeholder"
    )]
    pub declared: Map<String, Value>,

    /// Quantities computed from the tessellated mesh
    #[serde(
        rename = "Quantities (COMPAS)",
        default,
        deserialize_with = "map_or_placeholder"
    )]
    pub mesh: Map<String, Value>,

    #[serde(
        rename = "Bounding Box Dimensions (OBB - local frame)",
        default,
        deserialize_with = "opt_bounding_box",
        skip_serializing_if = "Option::is_none"
    )]
    pub bounding_box: Option<BoundingBox>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Oriented bounding box extents in metres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "X", default, deserialize_with = "opt_number")]
    pub x: Option<f64>,
    #[serde(rename = "Y", default, deserialize_with = "opt_number")]
    pub y: Option<f64>,
    #[serde(rename = "Z", default, deserialize_with = "opt_number")]
    pub z: Option<f64>,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// All three extents, if every one is known
    pub fn extents(&self) -> Option<[f64; 3]> {
        Some([self.x?, self.y?, self.z?])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySets {
    #[serde(
        rename = "Psets Element",
        default,
        deserialize_with = "map_or_placeholder"
    )]
    pub element: Map<String, Value>,

    #[serde(
        rename = "Psets Object Type",
        default,
        deserialize_with = "map_or_placeholder"
    )]
    pub object_type: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Lenient deserializers
// =============================================================================

fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::String(s) if !is_placeholder(&s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(lenient_f64(&value))
}

fn list_or_placeholder<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .map(|v| serde_json::from_value(v).map_err(serde::de::Error::custom))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

fn map_or_placeholder<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

fn opt_bounding_box<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BoundingBox>, D::Error> {
    let value = Value::deserialize(d)?;
    match value {
        Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
