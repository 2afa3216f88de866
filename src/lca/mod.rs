//! Indicator enrichment and emission calculation.
//!
//! Matched material names are joined with the indicator records stored in
//! the taxonomy leaf, projected onto the database's field allow-list, and
//! then scaled by the record's resolved quantities.

mod emissions;
mod indicators;

pub use emissions::{Multiplier, ReferenceUnit, multiplier, run_emissions, scale_material};
pub use indicators::{enrich, project, run_indicators};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ai::classifier::RecordKind;
use crate::config::DatabaseKind;
use crate::types::BoqRow;

/// Material record projected onto an [`IndicatorSchema`]
pub type MaterialIndicators = Map<String, Value>;

/// Name carried by the entry that marks a record without usable matches
pub const NONE_MATERIAL: &str = "None";

pub const NAME_FIELD: &str = "Name";
pub const REFERENCE_FIELD: &str = "Reference";

// =============================================================================
// Database schemas
// =============================================================================

const KBOB_EMISSION_KEYS: &[&str] = &[
    "Global Warming Potential Total [kgCO2-eqv]",
    "Global Warming Potential Manufacturing [kgCO2-eqv]",
    "Global Warming Potential Disposal [kgCO2-eqv]",
    "Biogenic Carbon [kg C]",
    "UBP (Total)",
    "UBP (Manufacturing)",
    "UBP (Disposal)",
    "Total Renewable Primary Energy [kWh oil-eq]",
    "Manufacturing Renewable Primary Energy [kWh oil-eq]",
    "Disposal Renewable Primary Energy [kWh oil-eq]",
    "Total Non-Renewable Primary Energy [kWh oil-eq]",
    "Manufacturing Non-Renewable Primary Energy [kWh oil-eq]",
    "Disposal Non-Renewable Primary Energy [kWh oil-eq]",
];

const KBOB_FIELDS: &[&str] = &[
    "Name",
    "ID",
    "Reference",
    "Density (kg/m3)",
    "Global Warming Potential Total [kgCO2-eqv]",
    "Global Warming Potential Manufacturing [kgCO2-eqv]",
    "Global Warming Potential Disposal [kgCO2-eqv]",
    "Biogenic Carbon [kg C]",
    "UBP (Total)",
    "UBP (Manufacturing)",
    "UBP (Disposal)",
    "Total Renewable Primary Energy [kWh oil-eq]",
    "Manufacturing Renewable Primary Energy [kWh oil-eq]",
    "Disposal Renewable Primary Energy [kWh oil-eq]",
    "Total Non-Renewable Primary Energy [kWh oil-eq]",
    "Manufacturing Non-Renewable Primary Energy [kWh oil-eq]",
    "Disposal Non-Renewable Primary Energy [kWh oil-eq]",
];

const KBOB_ANALYSED: &[&str] = &[
    "Global Warming Potential Manufacturing [kgCO2-eqv]",
    "Global Warming Potential Disposal [kgCO2-eqv]",
    "Global Warming Potential Total [kgCO2-eqv]",
    "Biogenic Carbon [kg C]",
    "UBP (Total)",
    "Total Renewable Primary Energy [kWh oil-eq]",
    "Total Non-Renewable Primary Energy [kWh oil-eq]",
];

const OEKOBAUDAT_EMISSION_KEYS: &[&str] = &[
    "GWPtotal (A1)",
    "GWPtotal (A2)",
    "GWPtotal (A3)",
    "GWPtotal (A1-A3)",
    "GWPtotal (A4)",
    "GWPtotal (A5)",
    "GWPtotal (B1)",
    "GWPtotal (B2)",
    "GWPtotal (B3)",
    "GWPtotal (B4)",
    "GWPtotal (B5)",
    "GWPtotal (B6)",
    "GWPtotal (B7)",
    "GWPtotal (C1)",
    "GWPtotal (C2)",
    "GWPtotal (C3)",
    "GWPtotal (C4)",
    "GWPbiogenic",
    "GWPfossil",
    "GWPtotal",
];

const OEKOBAUDAT_FIELDS: &[&str] = &[
    "Name",
    "ID",
    "Reference",
    "Density (kg/m3)",
    "Bezugsgroesse",
    "GWPtotal (A1)",
    "GWPtotal (A2)",
    "GWPtotal (A3)",
    "GWPtotal (A1-A3)",
    "GWPtotal (A4)",
    "GWPtotal (A5)",
    "GWPtotal (B1)",
    "GWPtotal (B2)",
    "GWPtotal (B3)",
    "GWPtotal (B4)",
    "GWPtotal (B5)",
    "GWPtotal (B6)",
    "GWPtotal (B7)",
    "GWPtotal (C1)",
    "GWPtotal (C2)",
    "GWPtotal (C3)",
    "GWPtotal (C4)",
    "GWPbiogenic",
    "GWPfossil",
    "GWPtotal",
    "Conformity",
    "Laenderkennung",
    "Declaration owner",
    "Registrierungsnummer",
];

const OEKOBAUDAT_ANALYSED: &[&str] = &[
    "GWPbiogenic",
    "GWPfossil",
    "GWPtotal",
    "GWPtotal (A1-A3)",
    "GWPtotal (A4)",
    "GWPtotal (A5)",
    "GWPtotal (C1)",
    "GWPtotal (C2)",
    "GWPtotal (C3)",
    "GWPtotal (C4)",
];

/// Field layout of one indicator database
#[derive(Debug)]
pub struct IndicatorSchema {
    pub database: DatabaseKind,
    /// Fields kept when projecting a taxonomy material record
    pub fields: &'static [&'static str],
    /// Fields scaled by the quantity multiplier
    pub emission_keys: &'static [&'static str],
    /// Field ranking candidate materials in the rollup
    pub total_gwp: &'static str,
    /// Fields that get min / mean / max columns
    pub analysed: &'static [&'static str],
    /// Allow-listed fields missing from a record are written as 0
    pub missing_as_zero: bool,
    /// Field holding the declared reference quantity indicators are given per
    pub reference_quantity: Option<&'static str>,
    /// Unit suffix added to keys of the emissions overview
    pub overview_unit: Option<&'static str>,
}

static KBOB: IndicatorSchema = IndicatorSchema {
    database: DatabaseKind::Kbob,
    fields: KBOB_FIELDS,
    emission_keys: KBOB_EMISSION_KEYS,
    total_gwp: "Global Warming Potential Total [kgCO2-eqv]",
    analysed: KBOB_ANALYSED,
    missing_as_zero: false,
    reference_quantity: None,
    overview_unit: None,
};

static OEKOBAUDAT: IndicatorSchema = IndicatorSchema {
    database: DatabaseKind::Oekobaudat,
    fields: OEKOBAUDAT_FIELDS,
    emission_keys: OEKOBAUDAT_EMISSION_KEYS,
    total_gwp: "GWPtotal",
    analysed: OEKOBAUDAT_ANALYSED,
    missing_as_zero: true,
    reference_quantity: Some("Bezugsgroesse"),
    overview_unit: Some("[kgCO2-eqv]"),
};

impl IndicatorSchema {
    pub fn for_database(database: DatabaseKind) -> &'static IndicatorSchema {
        match database {
            DatabaseKind::Kbob => &KBOB,
            DatabaseKind::Oekobaudat => &OEKOBAUDAT,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// The "no usable match" entry
pub fn none_material() -> MaterialIndicators {
    let mut entry = Map::new();
    entry.insert(NAME_FIELD.to_string(), Value::String(NONE_MATERIAL.to_string()));
    entry
}

pub fn is_none_material(material: &MaterialIndicators) -> bool {
    material
        .get(NAME_FIELD)
        .and_then(Value::as_str)
        .is_some_and(|name| name.trim().eq_ignore_ascii_case(NONE_MATERIAL))
}

/// True when no entry is a real material
pub fn is_negative(materials: &[MaterialIndicators]) -> bool {
    materials.iter().all(is_none_material)
}

/// One element or layer with its matched materials, written by the
/// indicator stage and rewritten with scaled values by the emission stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LcaRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Record Kind")]
    pub record_kind: RecordKind,
    #[serde(rename = "Database")]
    pub database: DatabaseKind,
    #[serde(rename = "Layer Thickness [m]", default)]
    pub layer_thickness: Option<f64>,
    #[serde(rename = "Length [m]", default)]
    pub length: Option<f64>,
    #[serde(rename = "Largest Surface Area [m^2]", default)]
    pub area: Option<f64>,
    #[serde(rename = "Volume [m^3]", default)]
    pub volume: Option<f64>,
    #[serde(rename = "Matched Materials")]
    pub materials: Vec<MaterialIndicators>,
    /// Materials left out of the emission result, with the reason
    #[serde(
        rename = "Excluded Materials",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub excluded: Vec<String>,
}

impl LcaRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        record_kind: RecordKind,
        database: DatabaseKind,
        row: &BoqRow,
        materials: Vec<MaterialIndicators>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            record_kind,
            database,
            layer_thickness: row.layer_thickness,
            length: row.length,
            area: row.area,
            volume: row.volume,
            materials,
            excluded: Vec::new(),
        }
    }

    pub fn is_negative(&self) -> bool {
        is_negative(&self.materials)
    }
}
