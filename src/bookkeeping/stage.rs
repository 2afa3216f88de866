use std::path::Path;
use tracing::{debug, info};

use super::{InferenceMetadata, InferenceSummary};
use crate::ai::classifier::RecordKind;
use crate::config::Config;
use crate::constants::traversal::RECORD_FILE;
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::traverse::{RecordInfo, read_steps};
use crate::types::utils::{read_json, reset_dir, sanitize_file_name, write_json};
use crate::types::{LcaError, Result};

/// Record directories below one kind's inference directory, sorted by name
fn record_dirs(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Summarize the step logs of the selected database.
pub fn run_bookkeeping(config: &Config, layout: &WorkLayout) -> Result<StageReport> {
    let inference_dir = layout.inference_dir(config.database.name);
    if !inference_dir.is_dir() {
        return Err(LcaError::stage(
            Stage::Bookkeeping.as_str(),
            format!(
                "{} not found; run the {} stage first",
                inference_dir.display(),
                Stage::Match.as_str()
            ),
        ));
    }

    let mut report = StageReport::new(Stage::Bookkeeping);
    let mut summaries = Vec::new();

    for kind in RecordKind::ALL {
        let output_dir = layout.bookkeeping_dir().join(kind.dir_name());
        reset_dir(&output_dir)?;

        for dir in record_dirs(&inference_dir.join(kind.dir_name()))? {
            let dir_name = crate::types::utils::file_stem(&dir);
            let record: RecordInfo = match read_json(&dir.join(RECORD_FILE)) {
                Ok(record) => record,
                Err(e) => {
                    report.skip(dir_name, e.to_string());
                    continue;
                }
            };
            let steps = match read_steps(&dir) {
                Ok(steps) => steps,
                Err(e) => {
                    report.skip(record.id, e.to_string());
                    continue;
                }
            };

            let summary = InferenceSummary::from_steps(record, &steps);
            let file = output_dir.join(format!("{}_inference.json", sanitize_file_name(&summary.id)));
            write_json(&file, &summary)?;
            debug!(
                "{}: {} steps, {} tokens",
                summary.id, summary.total_steps, summary.total_tokens
            );

            if summary.final_match().is_none() {
                report.count("without material step", 1);
            }
            report.count(kind.dir_name(), 1);
            report.processed();
            summaries.push(summary);
        }
    }

    let metadata = InferenceMetadata::build(config, &summaries);
    write_json(&layout.inference_metadata(), &metadata)?;
    info!(
        "Tokens: {} total, cost ${:.3}, {} category / {} material inferences",
        metadata.tokens_and_cost.total_tokens,
        metadata.tokens_and_cost.cost_usd,
        metadata.tokens_and_cost.category_inferences,
        metadata.tokens_and_cost.material_inferences
    );

    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::fixtures::write_taxonomy;
    use crate::traverse::run_match;
    use crate::traverse::scripted::ScriptedClassifier;
    use crate::ai::metrics::MetricsCollector;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bookkeeping_after_match() {
        let dir = TempDir::new().unwrap();
        write_taxonomy(&dir.path().join("databases").join("KBOB"));
        let layout = WorkLayout::new(dir.path().join("work"));
        write_json(
            &layout.dissected_elements_dir().join("slab.json"),
            &json!({"Element Metadata": {"GlobalId": "S/1", "Name": "Slab", "Type": "IfcSlab"}}),
        )
        .unwrap();
        write_json(
            &layout.dissected_elements_dir().join("beam.json"),
            &json!({"Element Metadata": {"GlobalId": "B1", "Name": "Beam", "Type": "IfcBeam"}}),
        )
        .unwrap();

        let mut config = Config::default();
        config.paths.taxonomy_root = dir.path().join("databases");
        // beam.json sorts first
        let classifier = ScriptedClassifier::ok(vec![
            json!({"Matched Category": "None"}),
            json!({"Matched Category": "Concrete"}),
            json!({"Matched Materials": ["Reinforced concrete"]}),
        ]);
        let metrics = MetricsCollector::new("test");
        run_match(&config, &layout, &classifier, &metrics).await.unwrap();

        let report = run_bookkeeping(&config, &layout).unwrap();
        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.counter("without material step"), 1);

        let summary: InferenceSummary = read_json(
            &layout
                .bookkeeping_dir()
                .join("Elements")
                .join("S_1_inference.json"),
        )
        .unwrap();
        assert_eq!(summary.id, "S/1");
        assert_eq!(summary.total_steps, 2);
        assert_eq!(
            summary.final_match().map(|(_, names)| names.to_vec()),
            Some(vec!["Reinforced concrete".to_string()])
        );

        let metadata: InferenceMetadata = read_json(&layout.inference_metadata()).unwrap();
        assert_eq!(metadata.records.elements, 2);
        assert_eq!(metadata.records.matched, 1);
        assert_eq!(metadata.tokens_and_cost.category_inferences, 2);
        assert_eq!(metadata.tokens_and_cost.material_inferences, 1);
    }

    #[test]
    fn test_requires_match_output() {
        let dir = TempDir::new().unwrap();
        let layout = WorkLayout::new(dir.path());
        assert!(run_bookkeeping(&Config::default(), &layout).is_err());
    }
}
