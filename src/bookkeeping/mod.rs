//! Inference bookkeeping.
//!
//! Folds the step logs of every record into one `<id>_inference.json`
//! summary and writes run-wide totals to `inference_metadata.json`. Only the
//! files on disk are read, so the stage can be re-run after an interrupted
//! match stage.

mod stage;

pub use stage::run_bookkeeping;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::classifier::{ClassificationKind, RecordKind, Selection, parse_selection};
use crate::ai::cost::InferenceFootprint;
use crate::config::{Config, PromptSettings};
use crate::traverse::{RecordInfo, StepRecord, StepType};
use crate::types::round_to;

// =============================================================================
// Per-record summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceStep {
    pub step: usize,
    pub matched_type: StepType,
    /// Selected category, or the selected materials of a material step
    pub matched_name: Vec<String>,
    pub matched_path: String,
    pub message: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub processing_time: f64,
    pub llm_model: Option<String>,
    pub inference_cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    pub step: usize,
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSummary {
    pub id: String,
    pub name: String,
    pub record_kind: RecordKind,
    pub total_steps: usize,
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Seconds
    pub total_processing_time: f64,
    pub total_cost_usd: f64,
    pub inference_steps: Vec<InferenceStep>,
    pub llm_responses_raw: Vec<RawResponse>,
}

/// Names the classifier picked in a logged step
fn matched_names(step: &StepRecord) -> Vec<String> {
    let kind = match step.llm_metadata.matched_type {
        StepType::Material => ClassificationKind::Material,
        StepType::Category => ClassificationKind::Category,
        StepType::None if step.llm_metadata.provider.is_some() => ClassificationKind::Category,
        StepType::None => return Vec::new(),
    };
    match parse_selection(kind, &step.llm_response) {
        Selection::Category(name) => name.into_iter().collect(),
        Selection::Materials(names) => names,
    }
}

impl InferenceSummary {
    pub fn from_steps(record: RecordInfo, steps: &[StepRecord]) -> Self {
        let mut summary = Self {
            id: record.id,
            name: record.name,
            record_kind: record.kind,
            total_steps: steps.len(),
            total_tokens: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_processing_time: 0.0,
            total_cost_usd: 0.0,
            inference_steps: Vec::with_capacity(steps.len()),
            llm_responses_raw: Vec::with_capacity(steps.len()),
        };

        for step in steps {
            let meta = &step.llm_metadata;
            summary.prompt_tokens += u64::from(meta.token_usage.prompt_tokens);
            summary.completion_tokens += u64::from(meta.token_usage.completion_tokens);
            summary.total_processing_time += meta.processing_time;
            summary.total_cost_usd += meta.inference_cost_usd;

            summary.inference_steps.push(InferenceStep {
                step: meta.step,
                matched_type: meta.matched_type,
                matched_name: matched_names(step),
                matched_path: meta.matched_path.clone(),
                message: meta.message.clone(),
                prompt_tokens: meta.token_usage.prompt_tokens,
                completion_tokens: meta.token_usage.completion_tokens,
                processing_time: meta.processing_time,
                llm_model: meta.model.clone(),
                inference_cost_usd: meta.inference_cost_usd,
            });
            summary.llm_responses_raw.push(RawResponse {
                step: meta.step,
                response: step.llm_response.clone(),
            });
        }

        summary.total_tokens = summary.prompt_tokens + summary.completion_tokens;
        summary.total_processing_time = round_to(summary.total_processing_time, 3);
        summary.total_cost_usd = round_to(summary.total_cost_usd, 6);
        summary
    }

    /// Leaf path and materials of the last material step, if any
    pub fn final_match(&self) -> Option<(&str, &[String])> {
        self.inference_steps
            .iter()
            .rev()
            .find(|s| s.matched_type == StepType::Material)
            .map(|s| (s.matched_path.as_str(), s.matched_name.as_slice()))
    }

    pub fn category_steps(&self) -> usize {
        self.inference_steps
            .iter()
            .filter(|s| s.matched_type != StepType::Material && s.llm_model.is_some())
            .count()
    }

    pub fn material_steps(&self) -> usize {
        self.inference_steps
            .iter()
            .filter(|s| s.matched_type == StepType::Material)
            .count()
    }
}

// =============================================================================
// Run metadata
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub elements: usize,
    pub target_layers: usize,
    pub matched: usize,
    pub not_matched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub category_inferences: usize,
    pub material_inferences: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub processing_time_secs: f64,
    pub cost_usd: f64,
}

impl TokenTotals {
    fn add(&mut self, summary: &InferenceSummary) {
        self.category_inferences += summary.category_steps();
        self.material_inferences += summary.material_steps();
        self.prompt_tokens += summary.prompt_tokens;
        self.completion_tokens += summary.completion_tokens;
        self.total_tokens += summary.total_tokens;
        self.processing_time_secs += summary.total_processing_time;
        self.cost_usd += summary.total_cost_usd;
    }

    fn rounded(mut self) -> Self {
        self.processing_time_secs = round_to(self.processing_time_secs, 3);
        self.cost_usd = round_to(self.cost_usd, 3);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub provider: String,
    pub model: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub category_llm: ModelSettings,
    pub material_llm: ModelSettings,
    pub prompt: PromptSettings,
    pub max_retries: usize,
}

impl InferenceSettings {
    pub fn from_config(config: &Config) -> Self {
        let model = |llm: &crate::ai::provider::ProviderConfig| ModelSettings {
            provider: llm.provider.clone(),
            model: llm.model.clone(),
            temperature: llm.temperature,
        };
        Self {
            category_llm: model(&config.category_llm),
            material_llm: model(&config.material_llm),
            prompt: config.prompt.clone(),
            max_retries: config.retry.max_retries,
        }
    }
}

/// Content of `inference_metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceMetadata {
    pub database: String,
    pub generated_at: DateTime<Utc>,
    pub records: RecordCounts,
    pub tokens_and_cost: TokenTotals,
    pub footprint: InferenceFootprint,
    pub settings: InferenceSettings,
}

impl InferenceMetadata {
    pub fn build(config: &Config, summaries: &[InferenceSummary]) -> Self {
        let mut records = RecordCounts::default();
        let mut totals = TokenTotals::default();

        for summary in summaries {
            match summary.record_kind {
                RecordKind::Element => records.elements += 1,
                RecordKind::TargetLayer => records.target_layers += 1,
            }
            match summary.final_match() {
                Some((_, names)) if !names.is_empty() => records.matched += 1,
                _ => records.not_matched += 1,
            }
            totals.add(summary);
        }

        let totals = totals.rounded();
        Self {
            database: config.database.name.directory_name().to_string(),
            generated_at: Utc::now(),
            records,
            footprint: InferenceFootprint::for_tokens(totals.total_tokens),
            tokens_and_cost: totals,
            settings: InferenceSettings::from_config(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::TokenUsage;
    use crate::traverse::StepMetadata;
    use serde_json::json;

    fn step(
        n: usize,
        matched_type: StepType,
        response: Value,
        path: &str,
        usage: TokenUsage,
        cost: f64,
    ) -> StepRecord {
        StepRecord {
            llm_response: response,
            llm_metadata: StepMetadata {
                step: n,
                matched_type,
                matched_path: path.to_string(),
                trace: Vec::new(),
                message: "Match successful".into(),
                token_usage: usage,
                processing_time: 0.5,
                provider: Some("openai".into()),
                model: Some("gpt-4o".into()),
                inference_cost_usd: cost,
            },
        }
    }

    fn info(id: &str, kind: RecordKind) -> RecordInfo {
        RecordInfo {
            id: id.into(),
            name: "Wall".into(),
            kind,
        }
    }

    #[test]
    fn test_summary_totals() {
        let steps = vec![
            step(
                1,
                StepType::Category,
                json!({"Matched Category": "Concrete"}),
                "db/KBOB",
                TokenUsage::new(1000, 20),
                0.0053,
            ),
            step(
                2,
                StepType::Material,
                json!({"Matched Materials": ["Lean concrete", "Reinforced concrete"]}),
                "db/KBOB/concrete",
                TokenUsage::new(800, 40),
                0.0046,
            ),
        ];
        let summary = InferenceSummary::from_steps(info("W1", RecordKind::Element), &steps);

        assert_eq!(summary.total_steps, 2);
        assert_eq!(summary.prompt_tokens, 1800);
        assert_eq!(summary.completion_tokens, 60);
        assert_eq!(summary.total_tokens, 1860);
        assert_eq!(summary.total_processing_time, 1.0);
        assert!((summary.total_cost_usd - 0.0099).abs() < 1e-9);
        assert_eq!(summary.inference_steps[0].matched_name, vec!["Concrete"]);
        assert_eq!(summary.llm_responses_raw.len(), 2);

        let (path, names) = summary.final_match().unwrap();
        assert_eq!(path, "db/KBOB/concrete");
        assert_eq!(names, ["Lean concrete", "Reinforced concrete"]);
        assert_eq!(summary.category_steps(), 1);
        assert_eq!(summary.material_steps(), 1);
    }

    #[test]
    fn test_no_material_step_has_no_final_match() {
        let steps = vec![step(
            1,
            StepType::Category,
            json!({"Matched Category": "None"}),
            "db/KBOB",
            TokenUsage::new(10, 1),
            0.0,
        )];
        let summary = InferenceSummary::from_steps(info("S1", RecordKind::Element), &steps);
        assert!(summary.final_match().is_none());
        assert!(summary.inference_steps[0].matched_name.is_empty());
    }

    #[test]
    fn test_metadata_counts_and_rounding() {
        let matched = InferenceSummary::from_steps(
            info("W1_L1", RecordKind::TargetLayer),
            &[step(
                1,
                StepType::Material,
                json!({"Matched Materials": ["EPS"]}),
                "db/KBOB/insulation",
                TokenUsage::new(500_000, 500_000),
                0.12345,
            )],
        );
        let unmatched = InferenceSummary::from_steps(info("S1", RecordKind::Element), &[]);

        let metadata = InferenceMetadata::build(&Config::default(), &[matched, unmatched]);
        assert_eq!(metadata.database, "KBOB");
        assert_eq!(metadata.records.elements, 1);
        assert_eq!(metadata.records.target_layers, 1);
        assert_eq!(metadata.records.matched, 1);
        assert_eq!(metadata.records.not_matched, 1);
        assert_eq!(metadata.tokens_and_cost.material_inferences, 1);
        assert_eq!(metadata.tokens_and_cost.cost_usd, 0.123);
        assert!((metadata.footprint.energy_kwh - 2.0).abs() < 1e-9);
        assert_eq!(metadata.settings.category_llm.provider, "openai");
    }
}
