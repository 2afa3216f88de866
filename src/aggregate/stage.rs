use std::path::PathBuf;
use tracing::info;

use super::{aggregate, aggregate_boq, overview};
use crate::config::Config;
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::types::utils::{
    file_stem, list_json_files, read_json, require_file, reset_dir, write_json,
};
use crate::types::{BoqTable, ElementRecord, Result};

/// Group identical elements, write representatives and unique elements, and
/// compact the BOQ to one row per group.
pub fn run_aggregate(config: &Config, layout: &WorkLayout) -> Result<StageReport> {
    let elements_dir = config.require_elements_dir()?;
    let quantities_boq = layout.quantities_boq();
    require_file(&quantities_boq, Stage::Aggregate.as_str(), Stage::Quantities.as_str())?;

    let mut report = StageReport::new(Stage::Aggregate);

    let mut files: Vec<PathBuf> = Vec::new();
    let mut elements: Vec<ElementRecord> = Vec::new();
    for path in list_json_files(elements_dir)? {
        match read_json::<ElementRecord>(&path) {
            Ok(element) => {
                files.push(path);
                elements.push(element);
            }
            Err(e) => report.skip(file_stem(&path), e.to_string()),
        }
    }

    let aggregation = aggregate(&elements);
    let unique_dir = layout.unique_dir();
    let aggregated_dir = layout.aggregated_dir();
    reset_dir(&unique_dir)?;
    reset_dir(&aggregated_dir)?;

    for group in &aggregation.groups {
        let mut representative = elements[group.representative()].clone();
        representative.group_id = Some(group.id.clone());
        write_json(&aggregated_dir.join(format!("{}.json", group.id)), &representative)?;
        info!(
            "Group {} ({} / {}): {} elements, representative {}",
            group.id,
            group.key.entity,
            group.key.object_type,
            group.members.len(),
            representative.display_name()
        );
        report.processed();
    }

    for &idx in &aggregation.unique {
        let source = &files[idx];
        let Some(file_name) = source.file_name() else {
            continue;
        };
        std::fs::copy(source, unique_dir.join(file_name))?;
        info!("Unique element {}", elements[idx].display_name());
        report.processed();
    }

    let overview = overview(&aggregation, &elements);
    write_json(&layout.aggregation_overview(), &overview)?;

    let table = BoqTable::read(&quantities_boq)?;
    aggregate_boq(&table, &overview).write(&layout.aggregate_boq())?;

    report.count("groups", aggregation.groups.len());
    report.count("compiled elements", aggregation.compiled_elements());
    report.count("unique elements", aggregation.unique.len());
    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregationOverview;
    use crate::quantity::run_quantities;
    use crate::types::QuantitySource;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_element(dir: &std::path::Path, file: &str, id: &str, object_type: &str, geometry: serde_json::Value) {
        write_json(
            &dir.join(file),
            &json!({
                "Element Metadata": {"GlobalId": id, "Name": id, "Type": "IfcSlab", "ObjectType": object_type},
                "Element Material Data": [{"IfcEntity": "IfcMaterial", "Material Name": "Concrete"}],
                "Element Geometry Data": geometry,
                "Custom Key": {"kept": true}
            }),
        )
        .unwrap();
    }

    #[test]
    fn test_run_aggregate() {
        let dir = TempDir::new().unwrap();
        let elements = dir.path().join("elements");
        write_element(&elements, "a.json", "A", "Floor 250", json!({"Quantities (IFC)": {"Net Volume": 2.5}}));
        write_element(
            &elements,
            "b.json",
            "B",
            "Wall 200",
            json!({"Bounding Box Dimensions (OBB - local frame)": {"X": 4.0, "Y": 3.0, "Z": 0.2}}),
        );
        write_element(&elements, "c.json", "C", "Floor 250", json!({"Quantities (IFC)": {"Net Volume": 2.5}}));

        let mut config = Config::default();
        config.paths.elements = elements;
        let layout = WorkLayout::new(dir.path().join("work"));
        run_quantities(&config, &layout).unwrap();

        let report = run_aggregate(&config, &layout).unwrap();
        assert_eq!(report.counter("groups"), 1);
        assert_eq!(report.counter("compiled elements"), 2);
        assert_eq!(report.counter("unique elements"), 1);

        let overview: AggregationOverview = read_json(&layout.aggregation_overview()).unwrap();
        let (group_id, group) = overview.iter().next().unwrap();
        assert_eq!(group.elements.len(), 2);

        let representative: ElementRecord =
            read_json(&layout.aggregated_dir().join(format!("{}.json", group_id))).unwrap();
        assert_eq!(representative.group_id.as_deref(), Some(group_id.as_str()));
        assert_eq!(representative.metadata.global_id.as_deref(), Some("A"));
        assert!(representative.extra.contains_key("Custom Key"));
        assert!(layout.unique_dir().join("b.json").is_file());

        let boq = BoqTable::read(&layout.aggregate_boq()).unwrap();
        let index = boq.index();
        assert_eq!(index[group_id.as_str()].volume, Some(5.0));
        assert_eq!(index[group_id.as_str()].elements_compiled, 2);
        assert_eq!(index["B"].volume, Some(2.4));
        assert_eq!(index["B"].volume_source, QuantitySource::BoundingBox);
    }

    #[test]
    fn test_requires_quantities() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.elements = dir.path().to_path_buf();
        let layout = WorkLayout::new(dir.path().join("work"));
        assert!(run_aggregate(&config, &layout).is_err());
    }
}
