use serde_json::Value;
use tracing::info;

use super::{MatchStatus, RecordInfo, TraversalEngine, TraversalSettings};
use crate::ai::classifier::{Classifier, RecordKind};
use crate::ai::metrics::MetricsCollector;
use crate::ai::timeout::call_timeout;
use crate::config::Config;
use crate::constants::traversal::RECORD_FILE;
use crate::dissect::LayerRecord;
use crate::pipeline::{Stage, StageReport, WorkLayout};
use crate::types::utils::{
    file_stem, list_json_files, read_json, reset_dir, sanitize_file_name, write_json,
};
use crate::types::{ElementRecord, LcaError, Result};

/// Id and display name of a record file
fn identify(kind: RecordKind, value: &Value) -> Result<(String, String)> {
    match kind {
        RecordKind::Element => {
            let element: ElementRecord = serde_json::from_value(value.clone())?;
            let id = element
                .record_id()
                .ok_or_else(|| LcaError::parse("element", "missing GlobalId and CompilationGroupID"))?;
            Ok((id.to_string(), element.display_name().to_string()))
        }
        RecordKind::TargetLayer => {
            let layer: LayerRecord = serde_json::from_value(value.clone())?;
            let name = layer.display_name();
            Ok((layer.id, name))
        }
    }
}

fn settings(config: &Config) -> TraversalSettings {
    TraversalSettings {
        max_steps: config.traversal.max_steps,
        include_density: config.prompt.include_density,
        retry: config.retry.clone(),
        category_timeout: call_timeout(config.category_llm.timeout_secs),
        material_timeout: call_timeout(config.material_llm.timeout_secs),
    }
}

/// Classify every element and layer record against the selected taxonomy.
///
/// Calls are issued one at a time. A record whose classification fails after
/// the retries is abandoned with a diagnostic and the batch continues.
pub async fn run_match(
    config: &Config,
    layout: &WorkLayout,
    classifier: &dyn Classifier,
    metrics: &MetricsCollector,
) -> Result<StageReport> {
    let root = config.require_taxonomy_root()?;
    let engine = TraversalEngine::new(classifier, metrics, settings(config));
    let mut report = StageReport::new(Stage::Match);

    for kind in RecordKind::ALL {
        let input_dir = layout.dissect_dir().join(kind.dir_name());
        let output_dir = layout
            .inference_dir(config.database.name)
            .join(kind.dir_name());
        reset_dir(&output_dir)?;

        for path in list_json_files(&input_dir)? {
            let stem = file_stem(&path);
            let context: Value = match read_json(&path) {
                Ok(value) => value,
                Err(e) => {
                    report.skip(stem, e.to_string());
                    continue;
                }
            };
            let (id, name) = match identify(kind, &context) {
                Ok(identity) => identity,
                Err(e) => {
                    report.skip(stem, e.to_string());
                    continue;
                }
            };

            info!("Processing {} {} ({})", kind.dir_name(), name, id);
            let results_dir = output_dir.join(sanitize_file_name(&id));
            reset_dir(&results_dir)?;
            let record = RecordInfo {
                id: id.clone(),
                name: name.clone(),
                kind,
            };
            write_json(&results_dir.join(RECORD_FILE), &record)?;

            match engine.traverse(&root, &context, kind, &results_dir).await {
                Ok(outcome) => {
                    let status = match outcome.status {
                        MatchStatus::Matched if !outcome.materials.is_empty() => "matched",
                        MatchStatus::Matched => "empty",
                        MatchStatus::NoMatch => "no match",
                    };
                    info!(
                        "{} -> {} after {} steps: {:?}",
                        id, status, outcome.steps, outcome.materials
                    );
                    report.count(status, 1);
                    report.processed();
                }
                Err(e) if e.is_timeout() => report.timed_out(id, e.to_string()),
                Err(e) => report.skip(id, format!("classification abandoned: {}", e)),
            }
        }
    }

    info!("{}", metrics.summary().display());
    report.log_summary();
    Ok(report)
}
