use tracing::{debug, info};

use super::resolve;
use crate::config::Config;
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::types::utils::{file_stem, list_json_files, read_json};
use crate::types::{BoqRow, BoqTable, ElementRecord, Result};

/// Resolve quantities for every element file and write the initial BOQ.
pub fn run_quantities(config: &Config, layout: &WorkLayout) -> Result<StageReport> {
    let elements_dir = config.require_elements_dir()?;
    let mut report = StageReport::new(Stage::Quantities);
    let mut rows = Vec::new();

    for path in list_json_files(elements_dir)? {
        let stem = file_stem(&path);
        let element: ElementRecord = match read_json(&path) {
            Ok(element) => element,
            Err(e) => {
                report.skip(stem, e.to_string());
                continue;
            }
        };
        let Some(id) = element.metadata.global_id.clone() else {
            report.skip(stem, "missing GlobalId");
            continue;
        };

        let resolved = resolve(&element);
        debug!(
            "{}: volume {:?} ({}), area {:?} ({}), length {:?} ({})",
            id,
            resolved.volume.value,
            resolved.volume.source,
            resolved.area.value,
            resolved.area.source,
            resolved.length.value,
            resolved.length.source
        );
        info!("Resolved quantities for {} ({})", element.display_name(), id);

        rows.push(BoqRow {
            id,
            name: element.display_name().to_string(),
            entity: element.metadata.entity.clone(),
            object_type: element.metadata.object_type.clone(),
            length: resolved.length.value,
            length_source: resolved.length.source,
            area: resolved.area.value,
            area_source: resolved.area.source,
            volume: resolved.volume.value,
            volume_source: resolved.volume.source,
            ..Default::default()
        });
        report.processed();
    }

    BoqTable::new(rows).write(&layout.quantities_boq())?;
    report.log_summary();
    Ok(report)
}
