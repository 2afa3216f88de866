use std::collections::HashMap;
use tracing::{debug, info};

use super::{apply, emissions_overview, match_lists};
use crate::ai::classifier::RecordKind;
use crate::config::Config;
use crate::lca::{IndicatorSchema, LcaRecord};
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::types::utils::{file_stem, list_json_files, read_json, require_file, write_json};
use crate::types::{BoqTable, LcaError, Result, ResultExt};

/// Emission records of both kinds keyed by id
fn load_records(layout: &WorkLayout, report: &mut StageReport) -> Result<HashMap<String, LcaRecord>> {
    let mut records = HashMap::new();
    for kind in RecordKind::ALL {
        for path in list_json_files(&layout.emissions_dir().join(kind.dir_name()))? {
            match read_json::<LcaRecord>(&path) {
                Ok(record) => {
                    records.insert(record.id.clone(), record);
                }
                Err(e) => report.skip(file_stem(&path), e.to_string()),
            }
        }
    }
    Ok(records)
}

/// Write the final bill of quantities and the report files.
pub fn run_rollup(config: &Config, layout: &WorkLayout) -> Result<StageReport> {
    let boq_path = layout.dissect_boq();
    require_file(&boq_path, Stage::Rollup.as_str(), Stage::Dissect.as_str())?;
    if !layout.emissions_dir().is_dir() {
        return Err(LcaError::stage(
            Stage::Rollup.as_str(),
            format!(
                "{} not found; run the {} stage first",
                layout.emissions_dir().display(),
                Stage::Emissions.as_str()
            ),
        ));
    }

    let schema = IndicatorSchema::for_database(config.database.name);
    let mut report = StageReport::new(Stage::Rollup);
    let records = load_records(layout, &mut report)?;

    let mut table = BoqTable::read(&boq_path)?;
    let matched = apply(&mut table, &records, schema);
    for row in &table.rows {
        debug!("{} ({})", row.name, row.id);
        report.processed();
    }
    report.count("matched rows", matched);
    report.count("not matched rows", table.rows.len() - matched);

    table.write(&layout.final_boq())?;
    info!("Final bill of quantities: {}", layout.final_boq().display());

    write_json(&layout.emissions_overview(), &emissions_overview(&table, schema))?;

    let (positives, negatives) = match_lists(&table, &records);
    write_json(&layout.inference_positives(), &positives)?;
    write_json(&layout.inference_negatives(), &negatives)?;

    let metadata = layout.inference_metadata();
    if metadata.is_file() {
        std::fs::copy(&metadata, layout.report_dir().join("inference_metadata.json"))
            .with_context(Stage::Rollup.as_str())?;
    }

    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseKind;
    use crate::rollup::{ColumnTotals, MatchList};
    use crate::types::{BoqRow, IndicatorCell};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const GWP: &str = "Global Warming Potential Total [kgCO2-eqv]";

    #[test]
    fn test_run_rollup() {
        let dir = TempDir::new().unwrap();
        let layout = WorkLayout::new(dir.path());
        let slab = BoqRow {
            id: "S1".into(),
            name: "Slab".into(),
            volume: Some(2.0),
            ..Default::default()
        };
        let beam = BoqRow {
            id: "B1".into(),
            name: "Beam".into(),
            ..Default::default()
        };
        BoqTable::new(vec![slab.clone(), beam]).write(&layout.dissect_boq()).unwrap();

        let record = LcaRecord::new(
            "S1",
            "Slab",
            RecordKind::Element,
            DatabaseKind::Kbob,
            &slab,
            vec![
                json!({"Name": "Lean", GWP: 250.0}).as_object().cloned().unwrap(),
                json!({"Name": "Reinforced", GWP: 600.0}).as_object().cloned().unwrap(),
            ],
        );
        write_json(
            &layout.emissions_dir().join("Elements").join("S1_emissions.json"),
            &record,
        )
        .unwrap();
        std::fs::write(layout.emissions_dir().join("Elements").join("bad.json"), "{").unwrap();

        let report = run_rollup(&Config::default(), &layout).unwrap();
        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.counter("matched rows"), 1);

        let table = BoqTable::read(&layout.final_boq()).unwrap();
        let index = table.index();
        assert_eq!(
            index["S1"].indicators[&format!("{} (mean)", GWP)],
            IndicatorCell::Value(425.0)
        );
        assert_eq!(
            index["B1"].indicators[&format!("{} (min)", GWP)],
            IndicatorCell::NotMatched
        );

        let overview: BTreeMap<String, ColumnTotals> =
            read_json(&layout.emissions_overview()).unwrap();
        assert_eq!(overview[GWP].max, 600.0);

        let negatives: MatchList = read_json(&layout.inference_negatives()).unwrap();
        assert_eq!(negatives.unique_elements, vec!["Beam"]);
    }

    #[test]
    fn test_requires_emissions() {
        let dir = TempDir::new().unwrap();
        let layout = WorkLayout::new(dir.path());
        BoqTable::default().write(&layout.dissect_boq()).unwrap();
        assert!(run_rollup(&Config::default(), &layout).is_err());
    }
}
