use std::collections::HashMap;
use tracing::{debug, info};

use super::{LayerPlan, dissect_element, material_descriptor, split_boq};
use crate::config::Config;
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::types::utils::{file_stem, list_json_files, read_json, require_file, reset_dir, write_json};
use crate::types::{BoqTable, ElementRecord, Result};

/// Dissect the unique and aggregated element pools and split the BOQ.
pub fn run_dissect(config: &Config, layout: &WorkLayout) -> Result<StageReport> {
    let aggregate_boq = layout.aggregate_boq();
    require_file(&aggregate_boq, Stage::Dissect.as_str(), Stage::Aggregate.as_str())?;

    let mut report = StageReport::new(Stage::Dissect);
    let policy = config.dissection.zero_thickness;

    let elements_dir = layout.dissected_elements_dir();
    let layers_dir = layout.layers_dir();
    reset_dir(&elements_dir)?;
    reset_dir(&layers_dir)?;

    let mut plans: HashMap<String, LayerPlan> = HashMap::new();
    let mut descriptors: HashMap<String, String> = HashMap::new();

    for source in [layout.unique_dir(), layout.aggregated_dir()] {
        for path in list_json_files(&source)? {
            let stem = file_stem(&path);
            let element: ElementRecord = match read_json(&path) {
                Ok(element) => element,
                Err(e) => {
                    report.skip(stem, e.to_string());
                    continue;
                }
            };
            let Some(id) = element.record_id().map(str::to_string) else {
                report.skip(stem, "missing GlobalId and CompilationGroupID");
                continue;
            };

            match dissect_element(&element) {
                Some(records) => {
                    for record in &records {
                        write_json(&layers_dir.join(format!("{}.json", record.id)), record)?;
                        debug!("{}: layer {}", id, record.target.material_name);
                    }
                    info!(
                        "Dissected {} ({}) into {} layers",
                        element.display_name(),
                        id,
                        records.len()
                    );
                    report.count("multi-layer elements", 1);
                    report.count("layer records", records.len());

                    if let Some(plan) = LayerPlan::from_element(&element) {
                        if plan.ratios(policy).is_none() {
                            report.flag(
                                id.as_str(),
                                "total layer thickness is zero; layer volumes left unknown",
                            );
                        }
                        plans.insert(id, plan);
                    }
                }
                None => {
                    if let Some(descriptor) = material_descriptor(&element) {
                        descriptors.insert(id.clone(), descriptor);
                    }
                    write_json(&elements_dir.join(format!("{}.json", stem)), &element)?;
                    info!("Passed through {} ({})", element.display_name(), id);
                    report.count("single-layer elements", 1);
                }
            }
            report.processed();
        }
    }

    let table = BoqTable::read(&aggregate_boq)?;
    split_boq(&table, &plans, &descriptors, policy).write(&layout.dissect_boq())?;

    let required = report.counter("layer records") + report.counter("single-layer elements");
    report.count("required inferences", required);
    report.log_summary();
    Ok(report)
}
