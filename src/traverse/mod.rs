//! Taxonomy Traversal Engine
//!
//! Descends the taxonomy tree for one element or layer record with an
//! explicit state machine:
//!
//! ```text
//! AtCategory --(child selected)--> AtCategory | AtMaterial
//! AtCategory --(none / unknown)--> NoMatch, or AtMaterial on a mixed node
//! AtMaterial --(any answer)------> Matched
//! ```
//!
//! Each classification call is written to its step file before the next
//! step starts, so an interrupted traversal leaves steps `1..k-1` on disk.
//! The engine keeps no cache: every run calls the classifier again.

mod stage;

pub use stage::run_match;

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::ai::classifier::{
    Classification, ClassificationKind, ClassificationRequest, Classifier, RecordKind, Selection,
};
use crate::ai::metrics::MetricsCollector;
use crate::ai::provider::TokenUsage;
use crate::ai::timeout::with_timeout;
use crate::config::RetryConfig;
use crate::constants::network::MAX_RETRY_DELAY_SECS;
use crate::taxonomy::{NodeKind, TaxonomyNode};
use crate::types::utils::{round_to, write_json};
use crate::types::{LcaError, Result};

// =============================================================================
// Step log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Category,
    Material,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetadata {
    pub step: usize,
    pub matched_type: StepType,
    pub matched_path: String,
    pub trace: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub token_usage: TokenUsage,
    /// Seconds
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub inference_cost_usd: f64,
}

/// Content of one `step_{n}_*.json` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub llm_response: Value,
    pub llm_metadata: StepMetadata,
}

impl StepRecord {
    pub fn file_name(&self) -> String {
        let suffix = match self.llm_metadata.matched_type {
            StepType::Category => "category",
            StepType::Material => "material_match",
            StepType::None if self.llm_metadata.provider.is_some() => "category",
            StepType::None => "no_match",
        };
        format!("step_{}_{}.json", self.llm_metadata.step, suffix)
    }
}

/// Step files of a record directory in step order
pub fn read_steps(dir: &Path) -> Result<Vec<StepRecord>> {
    let mut steps: Vec<StepRecord> = crate::types::utils::list_json_files(dir)?
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| f.starts_with("step_"))
        })
        .map(|p| crate::types::utils::read_json(p))
        .collect::<Result<_>>()?;
    steps.sort_by_key(|s| s.llm_metadata.step);
    Ok(steps)
}

/// Identity of the record a step-log directory belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordInfo {
    pub id: String,
    pub name: String,
    pub kind: RecordKind,
}

// =============================================================================
// Outcome
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    NoMatch,
}

#[derive(Debug, Clone)]
pub struct TraversalOutcome {
    pub status: MatchStatus,
    /// Selected materials at the leaf; may be empty even when matched
    pub materials: Vec<String>,
    pub trace: Vec<String>,
    pub leaf: Option<PathBuf>,
    pub steps: usize,
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone)]
pub struct TraversalSettings {
    pub max_steps: usize,
    pub include_density: bool,
    pub retry: RetryConfig,
    pub category_timeout: Duration,
    pub material_timeout: Duration,
}

enum State {
    AtCategory(TaxonomyNode),
    AtMaterial(TaxonomyNode),
    NoMatch,
    Matched(TaxonomyNode, Vec<String>),
}

/// State after arriving at a node
fn arrive(node: TaxonomyNode) -> State {
    match node.kind() {
        NodeKind::Materials => State::AtMaterial(node),
        NodeKind::Categories | NodeKind::Mixed if node.has_categories() => State::AtCategory(node),
        NodeKind::Mixed if node.has_materials() => State::AtMaterial(node),
        _ => State::AtCategory(node),
    }
}

pub struct TraversalEngine<'a> {
    classifier: &'a dyn Classifier,
    metrics: &'a MetricsCollector,
    settings: TraversalSettings,
}

impl<'a> TraversalEngine<'a> {
    pub fn new(
        classifier: &'a dyn Classifier,
        metrics: &'a MetricsCollector,
        settings: TraversalSettings,
    ) -> Self {
        Self {
            classifier,
            metrics,
            settings,
        }
    }

    /// Traverse from `root` for one record, writing step files into `results_dir`.
    ///
    /// A classification failure that survives the retries is returned as an
    /// error; steps already taken stay on disk.
    pub async fn traverse(
        &self,
        root: &Path,
        context: &Value,
        record_kind: RecordKind,
        results_dir: &Path,
    ) -> Result<TraversalOutcome> {
        let mut trace: Vec<String> = Vec::new();
        let mut step = 0usize;
        let mut state = arrive(TaxonomyNode::load(root)?);

        loop {
            state = match state {
                State::Matched(node, materials) => {
                    return Ok(TraversalOutcome {
                        status: MatchStatus::Matched,
                        materials,
                        trace,
                        leaf: Some(node.dir().to_path_buf()),
                        steps: step,
                    });
                }
                State::NoMatch => {
                    return Ok(TraversalOutcome {
                        status: MatchStatus::NoMatch,
                        materials: Vec::new(),
                        trace,
                        leaf: None,
                        steps: step,
                    });
                }
                _ if step >= self.settings.max_steps => {
                    step += 1;
                    let message = format!("Step limit of {} reached", self.settings.max_steps);
                    warn!("{}", message);
                    self.write_terminal(results_dir, step, root, &trace, message)?;
                    State::NoMatch
                }
                State::AtCategory(node) => {
                    step += 1;
                    self.category_step(node, context, record_kind, results_dir, step, &mut trace)
                        .await?
                }
                State::AtMaterial(node) => {
                    step += 1;
                    self.material_step(node, context, record_kind, results_dir, step, &trace)
                        .await?
                }
            };
        }
    }

    async fn category_step(
        &self,
        node: TaxonomyNode,
        context: &Value,
        record_kind: RecordKind,
        results_dir: &Path,
        step: usize,
        trace: &mut Vec<String>,
    ) -> Result<State> {
        let options = node.category_options();
        if options.is_empty() {
            let message = "Node has no categories or materials".to_string();
            self.write_terminal(results_dir, step, node.dir(), trace, message)?;
            return Ok(State::NoMatch);
        }

        let request = ClassificationRequest {
            kind: ClassificationKind::Category,
            record_kind,
            context: context.clone(),
            options: options.iter().cloned().map(Value::String).collect(),
            last_category: trace.last().cloned(),
        };
        let started = Instant::now();
        let classification = self.classify(&request).await?;
        let elapsed = started.elapsed();

        let selected = match &classification.selection {
            Selection::Category(name) => name.clone(),
            Selection::Materials(_) => None,
        };
        let child = selected.as_deref().and_then(|name| node.find_category(name));

        let (matched_type, message) = match (&selected, &child) {
            (Some(_), Some(_)) => (StepType::Category, "Match successful".to_string()),
            (Some(name), None) => (StepType::None, format!("No match for '{}' in index", name)),
            (None, _) => (StepType::Category, "No match found".to_string()),
        };
        self.write_step(
            results_dir,
            step,
            matched_type,
            node.dir(),
            trace,
            message.clone(),
            &classification,
            elapsed,
        )?;

        match child {
            Some(entry) => {
                debug!("Step {}: category {}", step, entry.name);
                let next = node.child(&entry)?;
                trace.push(entry.name);
                Ok(arrive(next))
            }
            None if node.kind() == NodeKind::Mixed && node.has_materials() => {
                debug!("Step {}: {}; falling through to materials", step, message);
                Ok(State::AtMaterial(node))
            }
            None => {
                debug!("Step {}: {}", step, message);
                Ok(State::NoMatch)
            }
        }
    }

    async fn material_step(
        &self,
        node: TaxonomyNode,
        context: &Value,
        record_kind: RecordKind,
        results_dir: &Path,
        step: usize,
        trace: &[String],
    ) -> Result<State> {
        let options = node.material_options(self.settings.include_density);
        if options.is_empty() {
            let message = "Leaf node has no materials".to_string();
            self.write_terminal(results_dir, step, node.dir(), trace, message)?;
            return Ok(State::NoMatch);
        }

        let request = ClassificationRequest {
            kind: ClassificationKind::Material,
            record_kind,
            context: context.clone(),
            options,
            last_category: trace.last().cloned(),
        };
        let started = Instant::now();
        let classification = self.classify(&request).await?;
        let elapsed = started.elapsed();

        let materials = match &classification.selection {
            Selection::Materials(names) => names.clone(),
            Selection::Category(_) => Vec::new(),
        };
        let message = if materials.is_empty() {
            "No match found"
        } else {
            "Match successful"
        };
        self.write_step(
            results_dir,
            step,
            StepType::Material,
            node.dir(),
            trace,
            message.to_string(),
            &classification,
            elapsed,
        )?;
        debug!("Step {}: materials {:?}", step, materials);
        Ok(State::Matched(node, materials))
    }

    /// One classification call with timeout and bounded retry
    async fn classify(&self, request: &ClassificationRequest) -> Result<Classification> {
        let timeout = match request.kind {
            ClassificationKind::Category => self.settings.category_timeout,
            ClassificationKind::Material => self.settings.material_timeout,
        };
        let operation = format!("{} classification", request.kind.as_str());
        let classifier = self.classifier;
        let operation_name = operation.as_str();

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.settings.retry.base_delay_ms))
            .with_max_delay(Duration::from_secs(MAX_RETRY_DELAY_SECS))
            .with_max_times(self.settings.retry.max_retries);

        let result = (move || async move {
            with_timeout(timeout, classifier.classify(request), operation_name).await
        })
        .retry(backoff)
        .when(|e: &LcaError| e.is_retryable())
        .notify(|e: &LcaError, delay: Duration| {
            warn!("{} failed, retrying in {:?}: {}", operation_name, delay, e);
        })
        .await;

        match result {
            Ok(classification) => {
                self.metrics.record_call(
                    request.kind,
                    &classification.usage,
                    classification.cost_usd,
                    classification.elapsed_ms,
                );
                Ok(classification)
            }
            Err(e) => {
                self.metrics.record_failure(e.is_timeout());
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_step(
        &self,
        results_dir: &Path,
        step: usize,
        matched_type: StepType,
        node_dir: &Path,
        trace: &[String],
        message: String,
        classification: &Classification,
        elapsed: Duration,
    ) -> Result<()> {
        let record = StepRecord {
            llm_response: classification.raw.clone(),
            llm_metadata: StepMetadata {
                step,
                matched_type,
                matched_path: node_dir.display().to_string(),
                trace: trace.to_vec(),
                message,
                token_usage: classification.usage,
                processing_time: round_to(elapsed.as_secs_f64(), 3),
                provider: Some(classification.provider.clone()),
                model: Some(classification.model.clone()),
                inference_cost_usd: classification.cost_usd,
            },
        };
        write_json(&results_dir.join(record.file_name()), &record)
    }

    fn write_terminal(
        &self,
        results_dir: &Path,
        step: usize,
        node_dir: &Path,
        trace: &[String],
        message: String,
    ) -> Result<()> {
        info!("Step {}: {}", step, message);
        let record = StepRecord {
            llm_response: json!({}),
            llm_metadata: StepMetadata {
                step,
                matched_type: StepType::None,
                matched_path: node_dir.display().to_string(),
                trace: trace.to_vec(),
                message,
                token_usage: TokenUsage::default(),
                processing_time: 0.0,
                provider: None,
                model: None,
                inference_cost_usd: 0.0,
            },
        };
        write_json(&results_dir.join(record.file_name()), &record)
    }
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedClassifier;
    use super::*;
    use crate::taxonomy::fixtures::write_taxonomy;
    use crate::types::{ErrorCategory, LlmError};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn settings() -> TraversalSettings {
        TraversalSettings {
            max_steps: 32,
            include_density: false,
            retry: RetryConfig {
                max_retries: 1,
                base_delay_ms: 1,
            },
            category_timeout: Duration::from_secs(5),
            material_timeout: Duration::from_secs(5),
        }
    }

    fn context() -> Value {
        json!({"Element Metadata": {"Name": "Slab", "Type": "IfcSlab"}})
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_category_then_material() {
        let tax = TempDir::new().unwrap();
        write_taxonomy(tax.path());
        let out = TempDir::new().unwrap();
        let classifier = ScriptedClassifier::ok(vec![
            json!({"Matched Category": "Concrete"}),
            json!({"Matched Materials": ["Reinforced concrete"]}),
        ]);
        let metrics = MetricsCollector::new("test");
        let engine = TraversalEngine::new(&classifier, &metrics, settings());

        let outcome = engine
            .traverse(tax.path(), &context(), RecordKind::Element, out.path())
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Matched);
        assert_eq!(outcome.materials, vec!["Reinforced concrete"]);
        assert_eq!(outcome.trace, vec!["Concrete"]);
        assert_eq!(outcome.leaf.as_deref(), Some(tax.path().join("concrete").as_path()));
        assert_eq!(
            file_names(out.path()),
            vec!["step_1_category.json", "step_2_material_match.json"]
        );

        let steps = read_steps(out.path()).unwrap();
        assert_eq!(steps[1].llm_metadata.trace, vec!["Concrete"]);
        assert_eq!(steps[1].llm_metadata.token_usage.total_tokens, 110);

        let requests = classifier.requests.lock().unwrap();
        assert_eq!(requests[0].options.len(), 3);
        assert_eq!(requests[1].last_category.as_deref(), Some("Concrete"));

        let summary = metrics.summary();
        assert_eq!(summary.category_calls, 1);
        assert_eq!(summary.material_calls, 1);
    }

    #[tokio::test]
    async fn test_unknown_category_is_no_match() {
        let tax = TempDir::new().unwrap();
        write_taxonomy(tax.path());
        let out = TempDir::new().unwrap();
        let classifier = ScriptedClassifier::ok(vec![json!({"Matched Category": "Timber"})]);
        let metrics = MetricsCollector::new("test");
        let engine = TraversalEngine::new(&classifier, &metrics, settings());

        let outcome = engine
            .traverse(tax.path(), &context(), RecordKind::Element, out.path())
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::NoMatch);
        let steps = read_steps(out.path()).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].llm_metadata.matched_type, StepType::None);
        assert_eq!(steps[0].llm_metadata.message, "No match for 'Timber' in index");
    }

    #[tokio::test]
    async fn test_mixed_node_falls_through() {
        let tax = TempDir::new().unwrap();
        write_taxonomy(tax.path());
        let out = TempDir::new().unwrap();
        let classifier = ScriptedClassifier::ok(vec![
            json!({"Matched Category": "Insulation"}),
            json!({"Matched Category": "None"}),
            json!({"Matched Materials": "EPS"}),
        ]);
        let metrics = MetricsCollector::new("test");
        let engine = TraversalEngine::new(&classifier, &metrics, settings());

        let outcome = engine
            .traverse(tax.path(), &context(), RecordKind::TargetLayer, out.path())
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Matched);
        assert_eq!(outcome.materials, vec!["EPS"]);
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.leaf.as_deref(), Some(tax.path().join("insulation").as_path()));
    }

    #[tokio::test]
    async fn test_step_guard() {
        let tax = TempDir::new().unwrap();
        write_taxonomy(tax.path());
        let out = TempDir::new().unwrap();
        let classifier = ScriptedClassifier::ok(vec![json!({"Matched Category": "Metals"})]);
        let metrics = MetricsCollector::new("test");
        let mut settings = settings();
        settings.max_steps = 1;
        let engine = TraversalEngine::new(&classifier, &metrics, settings);

        let outcome = engine
            .traverse(tax.path(), &context(), RecordKind::Element, out.path())
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::NoMatch);
        assert_eq!(
            file_names(out.path()),
            vec!["step_1_category.json", "step_2_no_match.json"]
        );
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let tax = TempDir::new().unwrap();
        write_taxonomy(tax.path());
        let out = TempDir::new().unwrap();
        let parse_error: LcaError =
            LlmError::with_provider(ErrorCategory::ParseError, "invalid JSON", "scripted").into();
        let classifier = ScriptedClassifier::new(vec![
            Err(parse_error),
            Ok(json!({"Matched Category": "Concrete"})),
            Ok(json!({"Matched Materials": []})),
        ]);
        let metrics = MetricsCollector::new("test");
        let engine = TraversalEngine::new(&classifier, &metrics, settings());

        let outcome = engine
            .traverse(tax.path(), &context(), RecordKind::Element, out.path())
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Matched);
        assert!(outcome.materials.is_empty());
        assert_eq!(classifier.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_abandon_after_retries() {
        let tax = TempDir::new().unwrap();
        write_taxonomy(tax.path());
        let out = TempDir::new().unwrap();
        let error = || -> Result<Value> {
            Err(LlmError::with_provider(ErrorCategory::ParseError, "invalid JSON", "scripted").into())
        };
        let classifier = ScriptedClassifier::new(vec![
            Ok(json!({"Matched Category": "Metals"})),
            error(),
            error(),
        ]);
        let metrics = MetricsCollector::new("test");
        let engine = TraversalEngine::new(&classifier, &metrics, settings());

        let result = engine
            .traverse(tax.path(), &context(), RecordKind::Element, out.path())
            .await;
        assert!(result.is_err());
        assert_eq!(file_names(out.path()), vec!["step_1_category.json"]);
        assert_eq!(metrics.summary().failed_calls, 1);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let tax = TempDir::new().unwrap();
        write_taxonomy(tax.path());
        let out = TempDir::new().unwrap();
        let classifier = ScriptedClassifier::new(vec![Err(LlmError::with_provider(
            ErrorCategory::Auth,
            "401",
            "scripted",
        )
        .into())]);
        let metrics = MetricsCollector::new("test");
        let engine = TraversalEngine::new(&classifier, &metrics, settings());

        assert!(
            engine
                .traverse(tax.path(), &context(), RecordKind::Element, out.path())
                .await
                .is_err()
        );
        assert_eq!(classifier.requests.lock().unwrap().len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_traversal_terminates(answers in prop::collection::vec(
            prop::sample::select(vec![
                "Concrete", "Insulation", "Metals", "Steel", "Mineral wool",
                "Timber", "None", "", "EPS", "Glass wool",
            ]),
            0..12,
        )) {
            let tax = TempDir::new().unwrap();
            write_taxonomy(tax.path());
            let out = TempDir::new().unwrap();
            let replies = answers
                .iter()
                .map(|a| json!({"Matched Category": a, "Matched Materials": [a]}))
                .collect();
            let classifier = ScriptedClassifier::ok(replies);
            let metrics = MetricsCollector::new("prop");
            let engine = TraversalEngine::new(&classifier, &metrics, settings());

            let runtime = tokio::runtime::Runtime::new().unwrap();
            let outcome = runtime
                .block_on(engine.traverse(tax.path(), &context(), RecordKind::Element, out.path()))
                .unwrap();
            // Deepest path: root, Metals, Steel leaf
            prop_assert!(outcome.steps <= 3);
            prop_assert_eq!(outcome.status == MatchStatus::Matched, outcome.leaf.is_some());
        }
    }
}
