//! Bill of quantities table.
//!
//! One row per unique element, compiled group, or dissected layer. The fixed
//! columns carry quantities and their provenance; indicator columns are
//! appended by the rollup stage as `"<indicator> (min|mean|max)"` triplets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use super::utils::round4;
use crate::types::Result;

pub const COL_ID: &str = "Id";
pub const COL_NAME: &str = "Name";
pub const COL_ENTITY: &str = "Entity";
pub const COL_OBJECT_TYPE: &str = "ObjectType";
pub const COL_COMPILED: &str = "Compiled";
pub const COL_ELEMENTS_COMPILED: &str = "Elements Compiled";
pub const COL_MATERIAL: &str = "Material Descriptor";
pub const COL_LAYER_NUMBER: &str = "Layer Number";
pub const COL_LAYER_THICKNESS: &str = "Layer Thickness [m]";
pub const COL_LENGTH: &str = "Length [m]";
pub const COL_LENGTH_SOURCE: &str = "Length Source";
pub const COL_AREA: &str = "Largest Surface Area [m^2]";
pub const COL_AREA_SOURCE: &str = "Area Source";
pub const COL_VOLUME: &str = "Volume [m^3]";
pub const COL_VOLUME_SOURCE: &str = "Volume Source";

/// Fixed columns in output order
pub const FIXED_COLUMNS: &[&str] = &[
    COL_ID,
    COL_NAME,
    COL_ENTITY,
    COL_OBJECT_TYPE,
    COL_COMPILED,
    COL_ELEMENTS_COMPILED,
    COL_MATERIAL,
    COL_LAYER_NUMBER,
    COL_LAYER_THICKNESS,
    COL_LENGTH,
    COL_LENGTH_SOURCE,
    COL_AREA,
    COL_AREA_SOURCE,
    COL_VOLUME,
    COL_VOLUME_SOURCE,
];

/// Text written for rows without any usable indicator data
pub const NOT_MATCHED: &str = "not matched";

// =============================================================================
// Provenance
// =============================================================================

/// Where a resolved quantity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuantitySource {
    #[serde(rename = "declared")]
    Declared,
    #[serde(rename = "mesh")]
    Mesh,
    #[serde(rename = "property-set")]
    PropertySet,
    #[serde(rename = "bounding-box")]
    BoundingBox,
    /// Summed group whose members used different sources
    #[serde(rename = "mixed")]
    Mixed,
    /// Layer share could not be apportioned (zero total thickness)
    #[serde(rename = "unknown split")]
    UnknownSplit,
    #[default]
    #[serde(rename = "not available", alias = "")]
    NotAvailable,
}

impl QuantitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declared => "declared",
            Self::Mesh => "mesh",
            Self::PropertySet => "property-set",
            Self::BoundingBox => "bounding-box",
            Self::Mixed => "mixed",
            Self::UnknownSplit => "unknown split",
            Self::NotAvailable => "not available",
        }
    }

    /// Common source of a set of rows, `Mixed` when they disagree.
    pub fn combine(sources: impl IntoIterator<Item = QuantitySource>) -> QuantitySource {
        let mut iter = sources.into_iter();
        let Some(first) = iter.next() else {
            return QuantitySource::NotAvailable;
        };
        if iter.all(|s| s == first) {
            first
        } else {
            QuantitySource::Mixed
        }
    }
}

impl fmt::Display for QuantitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Indicator cells
// =============================================================================

/// One indicator cell of the final table
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum IndicatorCell {
    Value(f64),
    /// No valid classification or no total-GWP value for this row
    NotMatched,
    /// The chosen material carries no value for this indicator
    #[default]
    Empty,
}

impl IndicatorCell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(NOT_MATCHED) {
            return Self::NotMatched;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Value(v),
            _ => Self::Empty,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::NotMatched => f.write_str(NOT_MATCHED),
            Self::Empty => Ok(()),
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoqRow {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Entity", default)]
    pub entity: Option<String>,
    #[serde(rename = "ObjectType", default)]
    pub object_type: Option<String>,
    #[serde(rename = "Compiled", default)]
    pub compiled: bool,
    #[serde(rename = "Elements Compiled", default = "one")]
    pub elements_compiled: usize,
    #[serde(rename = "Material Descriptor", default)]
    pub material_descriptor: Option<String>,
    #[serde(rename = "Layer Number", default)]
    pub layer_number: u32,
    #[serde(rename = "Layer Thickness [m]", default)]
    pub layer_thickness: Option<f64>,
    #[serde(rename = "Length [m]", default)]
    pub length: Option<f64>,
    #[serde(rename = "Length Source", default)]
    pub length_source: QuantitySource,
    #[serde(rename = "Largest Surface Area [m^2]", default)]
    pub area: Option<f64>,
    #[serde(rename = "Area Source", default)]
    pub area_source: QuantitySource,
    #[serde(rename = "Volume [m^3]", default)]
    pub volume: Option<f64>,
    #[serde(rename = "Volume Source", default)]
    pub volume_source: QuantitySource,

    /// Indicator cells keyed by column name, filled by rollup
    #[serde(skip)]
    pub indicators: HashMap<String, IndicatorCell>,
}

fn one() -> usize {
    1
}

fn opt_cell(value: &Option<f64>) -> String {
    value.map(|v| round4(v).to_string()).unwrap_or_default()
}

impl BoqRow {
    fn fixed_record(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.entity.clone().unwrap_or_default(),
            self.object_type.clone().unwrap_or_default(),
            self.compiled.to_string(),
            self.elements_compiled.to_string(),
            self.material_descriptor.clone().unwrap_or_default(),
            self.layer_number.to_string(),
            opt_cell(&self.layer_thickness),
            opt_cell(&self.length),
            self.length_source.to_string(),
            opt_cell(&self.area),
            self.area_source.to_string(),
            opt_cell(&self.volume),
            self.volume_source.to_string(),
        ]
    }
}

// =============================================================================
// Table
// =============================================================================

/// Ordered rows plus the indicator columns appended after the fixed ones
#[derive(Debug, Clone, Default)]
pub struct BoqTable {
    pub rows: Vec<BoqRow>,
    pub indicator_columns: Vec<String>,
}

impl BoqTable {
    pub fn new(rows: Vec<BoqRow>) -> Self {
        Self {
            rows,
            indicator_columns: Vec::new(),
        }
    }

    /// Read a table written by [`BoqTable::write`].
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let indicator_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !FIXED_COLUMNS.contains(h))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: BoqRow = record.deserialize(Some(&headers))?;
            for (idx, column) in &indicator_columns {
                let cell = record.get(*idx).map(IndicatorCell::parse).unwrap_or_default();
                row.indicators.insert(column.clone(), cell);
            }
            rows.push(row);
        }

        Ok(Self {
            rows,
            indicator_columns: indicator_columns.into_iter().map(|(_, c)| c).collect(),
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header: Vec<&str> = FIXED_COLUMNS.to_vec();
        header.extend(self.indicator_columns.iter().map(String::as_str));
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = row.fixed_record();
            for column in &self.indicator_columns {
                let cell = row.indicators.get(column).copied().unwrap_or_default();
                record.push(cell.to_string());
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Row index by id
    pub fn index(&self) -> HashMap<&str, &BoqRow> {
        self.rows.iter().map(|r| (r.id.as_str(), r)).collect()
    }
}
