use std::sync::Arc;
use tracing::{error, info};

use super::{RunReport, Stage, StageReport, WorkLayout};
use crate::ai::classifier::{Classifier, LlmClassifier};
use crate::ai::metrics::MetricsCollector;
use crate::ai::provider::create_provider;
use crate::aggregate::run_aggregate;
use crate::bookkeeping::run_bookkeeping;
use crate::config::Config;
use crate::dissect::run_dissect;
use crate::lca::{run_emissions, run_indicators};
use crate::quantity::run_quantities;
use crate::rollup::run_rollup;
use crate::traverse::run_match;
use crate::types::{LcaError, Result};
use crate::types::utils::write_json;

/// Classifier backed by the configured category and material providers
pub fn build_classifier(config: &Config) -> Result<Arc<dyn Classifier>> {
    let category = create_provider(&config.category_llm)?;
    let material = create_provider(&config.material_llm)?;
    Ok(Arc::new(LlmClassifier::new(
        category,
        material,
        config.prompt.clone(),
    )))
}

pub struct PipelineRunner {
    config: Config,
    layout: WorkLayout,
    classifier: Option<Arc<dyn Classifier>>,
}

impl PipelineRunner {
    pub fn new(config: Config) -> Self {
        let layout = WorkLayout::new(config.paths.work_dir.clone());
        Self {
            config,
            layout,
            classifier: None,
        }
    }

    /// Use `classifier` instead of building one from the provider configuration
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_layout(mut self, layout: WorkLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &WorkLayout {
        &self.layout
    }

    /// Fail early on inputs the requested stages cannot run without.
    fn preflight(&self, stages: &[Stage]) -> Result<()> {
        self.config.validate()?;
        if stages.contains(&Stage::Quantities) {
            self.config.require_elements_dir()?;
        }
        if stages.contains(&Stage::Match) {
            self.config.require_taxonomy_root()?;
        }
        Ok(())
    }

    /// Run `stages` in order and write `run_report.json`.
    ///
    /// A stage error stops the run; the report written so far is still saved.
    pub async fn run(&self, stages: &[Stage]) -> Result<RunReport> {
        self.preflight(stages)?;

        let mut run = RunReport::new(self.config.database.name.directory_name());
        let metrics = MetricsCollector::new(run.run_id.clone());
        let classifier = match (&self.classifier, stages.contains(&Stage::Match)) {
            (Some(classifier), _) => Some(classifier.clone()),
            (None, true) => Some(build_classifier(&self.config)?),
            (None, false) => None,
        };

        info!(
            "Run {} on {} ({} stages)",
            run.run_id,
            self.config.database.name.directory_name(),
            stages.len()
        );

        for &stage in stages {
            info!("Stage {}/{}: {}", stage.as_u8(), Stage::ALL.len(), stage.name());
            let result = match stage {
                Stage::Match => match &classifier {
                    Some(classifier) => {
                        run_match(&self.config, &self.layout, classifier.as_ref(), &metrics).await
                    }
                    None => Err(LcaError::stage(stage.as_str(), "no classifier available")),
                },
                _ => self.run_sync(stage),
            };

            match result {
                Ok(report) => run.absorb(report),
                Err(e) => {
                    error!("Stage {} failed: {}", stage, e);
                    run.finish();
                    self.write_report(&run)?;
                    return Err(e);
                }
            }
        }

        run.finish();
        self.write_report(&run)?;
        Ok(run)
    }

    fn run_sync(&self, stage: Stage) -> Result<StageReport> {
        let (config, layout) = (&self.config, &self.layout);
        match stage {
            Stage::Quantities => run_quantities(config, layout),
            Stage::Aggregate => run_aggregate(config, layout),
            Stage::Dissect => run_dissect(config, layout),
            Stage::Bookkeeping => run_bookkeeping(config, layout),
            Stage::Indicators => run_indicators(config, layout),
            Stage::Emissions => run_emissions(config, layout),
            Stage::Rollup => run_rollup(config, layout),
            Stage::Match => Err(LcaError::stage(
                stage.as_str(),
                "the match stage needs a classifier and runs asynchronously",
            )),
        }
    }

    fn write_report(&self, run: &RunReport) -> Result<()> {
        let path = self.layout.run_report();
        write_json(&path, run)?;
        info!("Run report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::classifier::RecordKind;
    use crate::lca::LcaRecord;
    use crate::taxonomy::fixtures::write_taxonomy;
    use crate::traverse::scripted::ScriptedClassifier;
    use crate::types::utils::read_json;
    use crate::types::{BoqTable, IndicatorCell, QuantitySource};
    use serde_json::json;
    use tempfile::TempDir;

    const GWP_MIN: &str = "Global Warming Potential Total [kgCO2-eqv] (min)";

    /// Slabs A and C share a grouping key, partition B has only a bounding box
    /// and wall W has three layers.
    fn setup() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let elements = dir.path().join("elements");
        let slab = |id: &str| {
            json!({
                "Element Metadata": {"GlobalId": id, "Name": "Slab", "Type": "IfcSlab", "ObjectType": "Floor 250"},
                "Element Material Data": [{"IfcEntity": "IfcMaterial", "Material Name": "Concrete"}],
                "Element Geometry Data": {"Quantities (IFC)": {"Net Volume": 2.5}}
            })
        };
        write_json(&elements.join("a.json"), &slab("A")).unwrap();
        write_json(&elements.join("c.json"), &slab("C")).unwrap();
        write_json(
            &elements.join("partition.json"),
            &json!({
                "Element Metadata": {"GlobalId": "B", "Name": "Partition", "Type": "IfcWall", "ObjectType": "Partition"},
                "Element Material Data": [{"IfcEntity": "IfcMaterial", "Material Name": "EPS"}],
                "Element Geometry Data": {
                    "Bounding Box Dimensions (OBB - local frame)": {"X": 4.0, "Y": 3.0, "Z": 0.2}
                }
            }),
        )
        .unwrap();
        write_json(
            &elements.join("w.json"),
            &json!({
                "Element Metadata": {"GlobalId": "W", "Name": "Wall", "Type": "IfcWall", "ObjectType": "Ext"},
                "Element Material Data": [{
                    "IfcEntity": "IfcMaterialLayerSetUsage",
                    "Layer Set Name": "Ext",
                    "Layers": [
                        {"Material Name": "Plaster", "Thickness": 0.05, "Thickness unit": "m"},
                        {"Material Name": "Concrete", "Thickness": 0.10, "Thickness unit": "m"},
                        {"Material Name": "Render", "Thickness": 0.05, "Thickness unit": "m"}
                    ]
                }],
                "Element Geometry Data": {"Quantities (IFC)": {"Net Volume": 1.0}}
            }),
        )
        .unwrap();
        write_taxonomy(&dir.path().join("databases").join("KBOB"));

        let mut config = Config::default();
        config.paths.elements = elements;
        config.paths.taxonomy_root = dir.path().join("databases");
        config.paths.work_dir = dir.path().join("work");
        config.retry.base_delay_ms = 1;
        (dir, config)
    }

    #[tokio::test]
    async fn test_full_run() {
        let (_dir, config) = setup();
        // Elements: the group of A and C, then the partition; layers W_L1..W_L3 follow.
        let classifier = Arc::new(ScriptedClassifier::ok(vec![
            json!({"Matched Category": "Concrete"}),
            json!({"Matched Materials": ["Reinforced concrete", "Lean concrete"]}),
            json!({"Matched Category": "Insulation"}),
            json!({"Matched Category": "None"}),
            json!({"Matched Materials": ["EPS"]}),
            json!({"Matched Category": "None"}),
            json!({"Matched Category": "Concrete"}),
            json!({"Matched Materials": ["Reinforced concrete"]}),
            json!({"Matched Category": "Timber"}),
        ]));
        let runner = PipelineRunner::new(config).with_classifier(classifier);

        let run = runner.run(&Stage::ALL).await.unwrap();
        assert_eq!(run.stages.len(), 8);
        assert!(runner.layout().run_report().is_file());

        let table = BoqTable::read(&runner.layout().final_boq()).unwrap();
        let index = table.index();
        assert_eq!(table.rows.len(), 5);

        let partition = index["B"];
        assert_eq!(partition.volume, Some(2.4));
        assert_eq!(partition.volume_source, QuantitySource::BoundingBox);
        // EPS: 3.3 kgCO2 per kg, 20 kg/m3, 2.4 m3
        assert_eq!(partition.indicators[GWP_MIN], IndicatorCell::Value(158.4));

        let group = table.rows.iter().find(|r| r.compiled).unwrap();
        assert_eq!(group.elements_compiled, 2);
        assert_eq!(group.volume, Some(5.0));
        // Lean concrete 0.0624 * 2200 * 5.0 = 686.4 is below reinforced 300 * 5.0
        assert_eq!(group.indicators[GWP_MIN], IndicatorCell::Value(686.4));

        assert_eq!(index["W_L2"].volume, Some(0.5));
        assert_eq!(index["W_L1"].indicators[GWP_MIN], IndicatorCell::NotMatched);
        assert_eq!(index["W_L2"].indicators[GWP_MIN], IndicatorCell::Value(150.0));
        assert_eq!(index["W_L3"].indicators[GWP_MIN], IndicatorCell::NotMatched);

        let layer: LcaRecord = read_json(
            &runner
                .layout()
                .emissions_dir()
                .join(RecordKind::TargetLayer.dir_name())
                .join("W_L2_emissions.json"),
        )
        .unwrap();
        assert_eq!(layer.volume, Some(0.5));
    }

    #[tokio::test]
    async fn test_stage_error_still_writes_report() {
        let (_dir, config) = setup();
        let runner = PipelineRunner::new(config);

        let result = runner.run(&[Stage::Quantities, Stage::Dissect]).await;
        assert!(result.is_err());

        let run: RunReport = read_json(&runner.layout().run_report()).unwrap();
        assert!(run.stages.contains_key(&Stage::Quantities));
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_elements_dir_is_fatal() {
        let (dir, mut config) = setup();
        config.paths.elements = dir.path().join("missing");
        let runner = PipelineRunner::new(config);
        assert!(runner.run(&[Stage::Quantities]).await.is_err());
        assert!(!runner.layout().run_report().exists());
    }

    #[test]
    fn test_match_is_not_a_sync_stage() {
        let (_dir, config) = setup();
        let runner = PipelineRunner::new(config);
        let err = runner.run_sync(Stage::Match).unwrap_err();
        assert!(err.to_string().contains("match"));
    }
}
