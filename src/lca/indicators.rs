use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::{IndicatorSchema, LcaRecord, MaterialIndicators, NAME_FIELD, none_material};
use crate::ai::classifier::RecordKind;
use crate::bookkeeping::InferenceSummary;
use crate::config::Config;
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::taxonomy::TaxonomyNode;
use crate::types::utils::{list_json_files, read_json, require_file, reset_dir, sanitize_file_name, write_json};
use crate::types::{BoqRow, BoqTable, LcaError, Result};

/// Keep only the schema's fields of a taxonomy material record.
pub fn project(item: &Map<String, Value>, schema: &IndicatorSchema) -> MaterialIndicators {
    let mut projected = Map::new();
    for field in schema.fields {
        match item.get(*field) {
            Some(value) => {
                projected.insert(field.to_string(), value.clone());
            }
            None if schema.missing_as_zero => {
                projected.insert(field.to_string(), Value::from(0));
            }
            None => {}
        }
    }
    projected
}

/// Indicator records for the matched names at a leaf.
///
/// Names without a record are dropped; when nothing is left the result is the
/// single "None" entry.
pub fn enrich(leaf: &TaxonomyNode, names: &[String], schema: &IndicatorSchema) -> Vec<MaterialIndicators> {
    let mut materials: Vec<MaterialIndicators> = Vec::new();
    for name in names {
        let Some(item) = leaf.find_material(name) else {
            debug!("'{}' not found in {}", name, leaf.dir().display());
            continue;
        };
        let projected = project(item, schema);
        if !materials.iter().any(|m| m.get(NAME_FIELD) == projected.get(NAME_FIELD)) {
            materials.push(projected);
        }
    }
    if materials.is_empty() {
        materials.push(none_material());
    }
    materials
}

/// Materials for one summary; a leaf that cannot be loaded is reported and
/// yields the "None" entry.
fn materials_for(
    summary: &InferenceSummary,
    schema: &IndicatorSchema,
    report: &mut StageReport,
) -> Vec<MaterialIndicators> {
    let Some((path, names)) = summary.final_match() else {
        return vec![none_material()];
    };
    match TaxonomyNode::load(Path::new(path)) {
        Ok(leaf) => enrich(&leaf, names, schema),
        Err(e) => {
            report.flag(summary.id.as_str(), e.to_string());
            vec![none_material()]
        }
    }
}

/// Join every bookkept record with its indicator records and BOQ quantities.
pub fn run_indicators(config: &Config, layout: &WorkLayout) -> Result<StageReport> {
    let boq_path = layout.dissect_boq();
    require_file(&boq_path, Stage::Indicators.as_str(), Stage::Dissect.as_str())?;
    if !layout.bookkeeping_dir().is_dir() {
        return Err(LcaError::stage(
            Stage::Indicators.as_str(),
            format!(
                "{} not found; run the {} stage first",
                layout.bookkeeping_dir().display(),
                Stage::Bookkeeping.as_str()
            ),
        ));
    }

    let schema = IndicatorSchema::for_database(config.database.name);
    let table = BoqTable::read(&boq_path)?;
    let rows: HashMap<&str, &BoqRow> = table.index();
    let mut report = StageReport::new(Stage::Indicators);

    for kind in RecordKind::ALL {
        let output_dir = layout.indicators_dir().join(kind.dir_name());
        reset_dir(&output_dir)?;

        for path in list_json_files(&layout.bookkeeping_dir().join(kind.dir_name()))? {
            let summary: InferenceSummary = match read_json(&path) {
                Ok(summary) => summary,
                Err(e) => {
                    report.skip(crate::types::utils::file_stem(&path), e.to_string());
                    continue;
                }
            };
            let Some(row) = rows.get(summary.id.as_str()) else {
                report.skip(summary.id.as_str(), "no bill-of-quantities row for this id");
                continue;
            };

            let materials = materials_for(&summary, schema, &mut report);
            let record = LcaRecord::new(
                summary.id.as_str(),
                summary.name.as_str(),
                kind,
                schema.database,
                row,
                materials,
            );
            if record.is_negative() {
                report.count("not matched", 1);
            } else {
                report.count("matched", 1);
            }
            info!(
                "{} ({}): {} indicator records",
                record.name,
                record.id,
                if record.is_negative() { 0 } else { record.materials.len() }
            );

            let file = output_dir.join(format!("{}_indicators.json", sanitize_file_name(&record.id)));
            write_json(&file, &record)?;
            report.processed();
        }
    }

    report.log_summary();
    Ok(report)
}
