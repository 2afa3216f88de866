use serde_json::Value;
use tracing::{info, warn};

use super::{
    IndicatorSchema, LcaRecord, MaterialIndicators, NAME_FIELD, REFERENCE_FIELD, is_none_material,
    none_material,
};
use crate::ai::classifier::RecordKind;
use crate::config::Config;
use crate::constants::taxonomy::DENSITY_FIELD;
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::types::utils::{file_stem, list_json_files, read_json, reset_dir, write_json};
use crate::types::{LcaError, Result, lenient_f64, round4};

// =============================================================================
// Reference units
// =============================================================================

/// Declared unit an indicator record is given per
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceUnit {
    Mass,
    Area,
    Volume,
    Piece,
    Linear,
    Other(String),
}

impl ReferenceUnit {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "kg" => Self::Mass,
            "qm" | "m2" | "m²" => Self::Area,
            "m3" | "m³" => Self::Volume,
            "pcs" | "stk" | "piece" => Self::Piece,
            "m" => Self::Linear,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Factor applied to a material's indicator values
#[derive(Debug, Clone, PartialEq)]
pub enum Multiplier {
    Scale(f64),
    /// Length-based material; excluded from the result
    Skip,
    /// The quantity the unit needs is not available
    Missing(&'static str),
}

/// Multiplier for one material given the record's resolved quantities.
pub fn multiplier(material: &MaterialIndicators, volume: Option<f64>, area: Option<f64>) -> Multiplier {
    let unit = material
        .get(REFERENCE_FIELD)
        .and_then(Value::as_str)
        .map(ReferenceUnit::parse)
        .unwrap_or_else(|| ReferenceUnit::Other(String::new()));

    let require = |value: Option<f64>, what: &'static str| match value {
        Some(v) => Multiplier::Scale(v),
        None => Multiplier::Missing(what),
    };

    match unit {
        ReferenceUnit::Mass => {
            let density = material.get(DENSITY_FIELD).and_then(lenient_f64);
            match (density, volume) {
                (Some(d), Some(v)) => Multiplier::Scale(d * v),
                (None, _) => Multiplier::Missing("density"),
                (_, None) => Multiplier::Missing("volume"),
            }
        }
        ReferenceUnit::Area => require(area, "area"),
        ReferenceUnit::Volume => require(volume, "volume"),
        ReferenceUnit::Piece => Multiplier::Scale(1.0),
        ReferenceUnit::Linear => Multiplier::Skip,
        ReferenceUnit::Other(unit) => {
            let name = material
                .get(NAME_FIELD)
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unnamed material");
            warn!("Unknown reference unit '{}' for {}; using multiplier 1", unit, name);
            Multiplier::Scale(1.0)
        }
    }
}

/// Scale the emission fields of one material.
///
/// `factor` of `None` clears the numeric values (quantity unknown). Values
/// that are not numbers are left as they are.
pub fn scale_material(
    material: &MaterialIndicators,
    factor: Option<f64>,
    schema: &IndicatorSchema,
) -> MaterialIndicators {
    let reference = schema
        .reference_quantity
        .and_then(|field| material.get(field))
        .and_then(lenient_f64)
        .filter(|v| *v != 0.0)
        .unwrap_or(1.0);

    let mut scaled = material.clone();
    for key in schema.emission_keys {
        let Some(raw) = material.get(*key) else {
            continue;
        };
        let Some(value) = lenient_f64(raw) else {
            continue;
        };
        let new_value = match factor {
            Some(f) => Value::from(round4(value * f / reference)),
            None => Value::Null,
        };
        scaled.insert(key.to_string(), new_value);
    }
    scaled
}

/// Emission result for one indicator record
pub fn calculate(record: &LcaRecord, schema: &IndicatorSchema, report: &mut StageReport) -> LcaRecord {
    let mut result = record.clone();
    result.materials.clear();

    for material in &record.materials {
        if is_none_material(material) {
            result.materials.push(material.clone());
            continue;
        }
        let name = material
            .get(NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or("unnamed material")
            .to_string();

        match multiplier(material, record.volume, record.area) {
            Multiplier::Scale(factor) => {
                result.materials.push(scale_material(material, Some(factor), schema));
            }
            Multiplier::Skip => {
                report.count("linear materials excluded", 1);
                result.excluded.push(format!("{}: length-based reference unit", name));
            }
            Multiplier::Missing(what) => {
                report.flag(
                    record.id.as_str(),
                    format!("{} has no {}; emission values left empty", name, what),
                );
                result.materials.push(scale_material(material, None, schema));
            }
        }
    }
    if result.materials.is_empty() {
        result.materials.push(none_material());
    }
    result
}

/// Scale every indicator record by its quantities.
pub fn run_emissions(config: &Config, layout: &WorkLayout) -> Result<StageReport> {
    if !layout.indicators_dir().is_dir() {
        return Err(LcaError::stage(
            Stage::Emissions.as_str(),
            format!(
                "{} not found; run the {} stage first",
                layout.indicators_dir().display(),
                Stage::Indicators.as_str()
            ),
        ));
    }

    let schema = IndicatorSchema::for_database(config.database.name);
    let mut report = StageReport::new(Stage::Emissions);

    for kind in RecordKind::ALL {
        let output_dir = layout.emissions_dir().join(kind.dir_name());
        reset_dir(&output_dir)?;

        for path in list_json_files(&layout.indicators_dir().join(kind.dir_name()))? {
            let stem = file_stem(&path);
            let record: LcaRecord = match read_json(&path) {
                Ok(record) => record,
                Err(e) => {
                    report.skip(stem, e.to_string());
                    continue;
                }
            };

            let result = calculate(&record, schema, &mut report);
            info!(
                "{} ({}): {} materials scaled, {} excluded",
                result.name,
                result.id,
                result.materials.iter().filter(|m| !is_none_material(m)).count(),
                result.excluded.len()
            );

            let name = stem.trim_end_matches("_indicators");
            write_json(&output_dir.join(format!("{}_emissions.json", name)), &result)?;
            report.processed();
        }
    }

    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseKind;
    use crate::types::BoqRow;
    use serde_json::json;
    use tempfile::TempDir;

    fn material(value: Value) -> MaterialIndicators {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_reference_units() {
        assert_eq!(ReferenceUnit::parse("KG"), ReferenceUnit::Mass);
        assert_eq!(ReferenceUnit::parse("qm"), ReferenceUnit::Area);
        assert_eq!(ReferenceUnit::parse("m²"), ReferenceUnit::Area);
        assert_eq!(ReferenceUnit::parse("m³"), ReferenceUnit::Volume);
        assert_eq!(ReferenceUnit::parse("Stk"), ReferenceUnit::Piece);
        assert_eq!(ReferenceUnit::parse("m"), ReferenceUnit::Linear);
        assert_eq!(ReferenceUnit::parse("t"), ReferenceUnit::Other("t".into()));
    }

    #[test]
    fn test_multiplier_table() {
        let kg = material(json!({"Reference": "kg", "Density (kg/m3)": "2400"}));
        assert_eq!(multiplier(&kg, Some(2.0), None), Multiplier::Scale(4800.0));
        assert_eq!(multiplier(&kg, None, None), Multiplier::Missing("volume"));

        let area = material(json!({"Reference": "m2"}));
        assert_eq!(multiplier(&area, Some(2.0), Some(12.5)), Multiplier::Scale(12.5));

        let volume = material(json!({"Reference": "m3"}));
        assert_eq!(multiplier(&volume, Some(2.0), Some(12.5)), Multiplier::Scale(2.0));

        let piece = material(json!({"Reference": "pcs"}));
        assert_eq!(multiplier(&piece, None, None), Multiplier::Scale(1.0));

        let linear = material(json!({"Reference": "m"}));
        assert_eq!(multiplier(&linear, Some(2.0), Some(1.0)), Multiplier::Skip);

        let unknown = material(json!({"Reference": "t"}));
        assert_eq!(multiplier(&unknown, None, None), Multiplier::Scale(1.0));
    }

    #[test]
    fn test_scale_divides_by_reference_quantity() {
        let schema = IndicatorSchema::for_database(DatabaseKind::Oekobaudat);
        let m = material(json!({
            "Name": "Beton", "Bezugsgroesse": 1000, "GWPtotal": "250",
            "GWPfossil": "n/a", "GWPtotal (A4)": 0
        }));
        let scaled = scale_material(&m, Some(2.4), schema);
        assert_eq!(scaled["GWPtotal"], json!(0.6));
        assert_eq!(scaled["GWPfossil"], json!("n/a"));
        assert_eq!(scaled["GWPtotal (A4)"], json!(0.0));
        assert_eq!(scaled["Name"], json!("Beton"));
    }

    #[test]
    fn test_scale_kbob_rounds() {
        let schema = IndicatorSchema::for_database(DatabaseKind::Kbob);
        let m = material(json!({"Global Warming Potential Total [kgCO2-eqv]": 0.0624}));
        let scaled = scale_material(&m, Some(3.3333), schema);
        assert_eq!(scaled["Global Warming Potential Total [kgCO2-eqv]"], json!(0.208));

        let cleared = scale_material(&m, None, schema);
        assert!(cleared["Global Warming Potential Total [kgCO2-eqv]"].is_null());
    }

    fn record(materials: Vec<MaterialIndicators>, volume: Option<f64>) -> LcaRecord {
        LcaRecord::new(
            "W1",
            "Wall",
            RecordKind::Element,
            DatabaseKind::Kbob,
            &BoqRow {
                id: "W1".into(),
                volume,
                area: Some(8.0),
                ..Default::default()
            },
            materials,
        )
    }

    #[test]
    fn test_calculate_excludes_linear_and_keeps_sentinel() {
        let schema = IndicatorSchema::for_database(DatabaseKind::Kbob);
        let mut report = StageReport::new(Stage::Emissions);

        let input = record(
            vec![
                material(json!({"Name": "Profile", "Reference": "m",
                    "Global Warming Potential Total [kgCO2-eqv]": 10.0})),
                material(json!({"Name": "Board", "Reference": "m2",
                    "Global Warming Potential Total [kgCO2-eqv]": 1.5})),
            ],
            Some(1.0),
        );
        let result = calculate(&input, schema, &mut report);
        assert_eq!(result.materials.len(), 1);
        assert_eq!(
            result.materials[0]["Global Warming Potential Total [kgCO2-eqv]"],
            json!(12.0)
        );
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(report.counter("linear materials excluded"), 1);

        let negative = calculate(&record(vec![none_material()], None), schema, &mut report);
        assert!(negative.is_negative());
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_all_linear_falls_back_to_sentinel() {
        let schema = IndicatorSchema::for_database(DatabaseKind::Kbob);
        let mut report = StageReport::new(Stage::Emissions);
        let input = record(
            vec![
                material(json!({"Name": "Steel profile", "Reference": "m",
                    "Global Warming Potential Total [kgCO2-eqv]": 2.1})),
                material(json!({"Name": "Aluminium profile", "Reference": "m",
                    "Global Warming Potential Total [kgCO2-eqv]": 8.4})),
            ],
            Some(1.0),
        );
        let result = calculate(&input, schema, &mut report);
        assert_eq!(result.materials.len(), 1);
        assert!(result.is_negative());
        assert_eq!(result.excluded.len(), 2);
        assert_eq!(report.counter("linear materials excluded"), 2);
    }

    #[test]
    fn test_missing_volume_is_flagged() {
        let schema = IndicatorSchema::for_database(DatabaseKind::Kbob);
        let mut report = StageReport::new(Stage::Emissions);
        let input = record(
            vec![material(json!({"Name": "Concrete", "Reference": "m3",
                "Global Warming Potential Total [kgCO2-eqv]": 300.0}))],
            None,
        );
        let result = calculate(&input, schema, &mut report);
        assert!(result.materials[0]["Global Warming Potential Total [kgCO2-eqv]"].is_null());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.summary.skipped, 0);
    }

    #[test]
    fn test_run_emissions() {
        let dir = TempDir::new().unwrap();
        let layout = WorkLayout::new(dir.path());
        let input = record(
            vec![material(json!({"Name": "Concrete", "Reference": "m3",
                "Global Warming Potential Total [kgCO2-eqv]": 300.0}))],
            Some(2.5),
        );
        write_json(
            &layout
                .indicators_dir()
                .join("Elements")
                .join("W1_indicators.json"),
            &input,
        )
        .unwrap();

        let report = run_emissions(&Config::default(), &layout).unwrap();
        assert_eq!(report.summary.processed, 1);

        let out: LcaRecord = read_json(
            &layout
                .emissions_dir()
                .join("Elements")
                .join("W1_emissions.json"),
        )
        .unwrap();
        assert_eq!(
            out.materials[0]["Global Warming Potential Total [kgCO2-eqv]"],
            json!(750.0)
        );
    }
}
