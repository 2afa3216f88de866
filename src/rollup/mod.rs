//! Rollup of emission results into the bill of quantities.
//!
//! Each BOQ row takes the emission record with the same id. Candidate
//! materials are ranked by total GWP; every analysed indicator then gets
//! three columns: the lowest-GWP material's value, the highest-GWP
//! material's value, and their midpoint.

mod stage;

pub use stage::run_rollup;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::dissect::{parse_layer_id, strip_layer_suffix};
use crate::lca::{IndicatorSchema, LcaRecord, MaterialIndicators, is_none_material};
use crate::types::{BoqTable, IndicatorCell, lenient_f64, round_to, round4};

const A1_A3: &str = "GWPtotal (A1-A3)";
const A1_A3_PARTS: [&str; 3] = ["GWPtotal (A1)", "GWPtotal (A2)", "GWPtotal (A3)"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Mean,
    Max,
}

impl Bound {
    pub const ALL: [Bound; 3] = [Bound::Min, Bound::Mean, Bound::Max];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Mean => "mean",
            Self::Max => "max",
        }
    }
}

/// `"<indicator> (min)"` etc.
pub fn column_name(indicator: &str, bound: Bound) -> String {
    format!("{} ({})", indicator, bound.as_str())
}

/// All indicator columns in output order
pub fn indicator_columns(schema: &IndicatorSchema) -> Vec<String> {
    schema
        .analysed
        .iter()
        .flat_map(|key| Bound::ALL.map(|bound| column_name(key, bound)))
        .collect()
}

fn field(material: &MaterialIndicators, key: &str) -> Option<f64> {
    material.get(key).and_then(lenient_f64)
}

/// Value of one indicator; `GWPtotal (A1-A3)` falls back to the module sum
/// when it is zero or absent.
pub fn indicator_value(material: &MaterialIndicators, key: &str) -> Option<f64> {
    let value = field(material, key);
    if key != A1_A3 {
        return value;
    }
    if value.is_some_and(|v| v.abs() > 1e-6) {
        return value;
    }
    let parts: Option<Vec<f64>> = A1_A3_PARTS.iter().map(|k| field(material, k)).collect();
    match parts {
        Some(parts) => Some(round4(parts.iter().sum())),
        None => value,
    }
}

/// Min / mean / max cells of every analysed indicator.
///
/// `None` when no candidate carries a numeric total GWP; the row is then
/// written as not matched.
pub fn summarize(
    materials: &[MaterialIndicators],
    schema: &IndicatorSchema,
) -> Option<BTreeMap<String, IndicatorCell>> {
    let mut ranked = materials
        .iter()
        .filter(|m| !is_none_material(m))
        .filter_map(|m| field(m, schema.total_gwp).map(|gwp| (m, gwp)));

    let first = ranked.next()?;
    let (mut low, mut high) = (first, first);
    for candidate in ranked {
        if candidate.1 < low.1 {
            low = candidate;
        }
        if candidate.1 > high.1 {
            high = candidate;
        }
    }

    let mut cells = BTreeMap::new();
    for key in schema.analysed {
        let min = indicator_value(low.0, key).map(round4);
        let max = indicator_value(high.0, key).map(round4);
        let mean = match (min, max) {
            (Some(a), Some(b)) => Some(round4((a + b) / 2.0)),
            _ => None,
        };
        for (bound, value) in [(Bound::Min, min), (Bound::Mean, mean), (Bound::Max, max)] {
            let cell = value.map(IndicatorCell::Value).unwrap_or(IndicatorCell::Empty);
            cells.insert(column_name(key, bound), cell);
        }
    }
    Some(cells)
}

/// Fill the indicator columns of every row; returns the number of matched rows.
pub fn apply(
    table: &mut BoqTable,
    records: &HashMap<String, LcaRecord>,
    schema: &IndicatorSchema,
) -> usize {
    let columns = indicator_columns(schema);
    let mut matched = 0;

    for row in &mut table.rows {
        let cells = records
            .get(&row.id)
            .and_then(|record| summarize(&record.materials, schema));
        row.indicators.clear();
        match cells {
            Some(cells) => {
                matched += 1;
                row.indicators.extend(cells);
            }
            None => {
                for column in &columns {
                    row.indicators.insert(column.clone(), IndicatorCell::NotMatched);
                }
            }
        }
    }

    table.indicator_columns = columns;
    matched
}

// =============================================================================
// Report files
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnTotals {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

/// Column sums per analysed indicator, skipping sentinel and empty cells.
pub fn emissions_overview(table: &BoqTable, schema: &IndicatorSchema) -> BTreeMap<String, ColumnTotals> {
    let sum = |column: String| -> f64 {
        let total: f64 = table
            .rows
            .iter()
            .filter_map(|row| row.indicators.get(&column).and_then(IndicatorCell::value))
            .fold(0.0, |acc, v| acc + v);
        round_to(total, 3)
    };

    schema
        .analysed
        .iter()
        .map(|key| {
            let label = match schema.overview_unit {
                Some(unit) => format!("{} {}", key, unit),
                None => key.to_string(),
            };
            let totals = ColumnTotals {
                min: sum(column_name(key, Bound::Min)),
                mean: sum(column_name(key, Bound::Mean)),
                max: sum(column_name(key, Bound::Max)),
            };
            (label, totals)
        })
        .collect()
}

/// Names of rows by match outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchList {
    #[serde(rename = "Unique Elements")]
    pub unique_elements: Vec<String>,
    #[serde(rename = "ObjectTypes")]
    pub object_types: Vec<String>,
}

impl MatchList {
    fn finish(mut self) -> Self {
        for names in [&mut self.unique_elements, &mut self.object_types] {
            names.sort();
            names.dedup();
        }
        self
    }
}

/// Split rows into positive and negative matches.
///
/// A row is positive when its record has at least one real material. Rows
/// with a layer id are listed as `"<name> (Layer n)"`.
pub fn match_lists(table: &BoqTable, records: &HashMap<String, LcaRecord>) -> (MatchList, MatchList) {
    let mut positives = MatchList::default();
    let mut negatives = MatchList::default();

    for row in &table.rows {
        let positive = records.get(&row.id).is_some_and(|r| !r.is_negative());
        let name = match parse_layer_id(&row.id) {
            Some((_, number)) => {
                let suffix = format!(" (L{})", number);
                let base = row
                    .name
                    .strip_suffix(&suffix)
                    .unwrap_or_else(|| strip_layer_suffix(&row.name));
                format!("{} (Layer {})", base, number)
            }
            None => row.name.clone(),
        };

        let target = if positive { &mut positives } else { &mut negatives };
        if row.compiled {
            target.object_types.push(name);
        } else {
            target.unique_elements.push(name);
        }
    }

    (positives.finish(), negatives.finish())
}
