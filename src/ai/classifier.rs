//! Classification contract used by the taxonomy traversal.
//!
//! `classify(context, options, settings) -> (selection, usage)`: one call
//! either picks a single child category or selects zero or more materials
//! at a leaf. [`LlmClassifier`] implements it on top of two configured
//! providers, one for category steps and one for material steps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ai::cost::estimate_cost;
use crate::ai::prompt::{build_classification_prompt, prune_context, response_schema};
use crate::ai::provider::{SharedProvider, TokenUsage};
use crate::config::PromptSettings;
use crate::constants::traversal::{CATEGORY_KEY, MATERIALS_KEY};
use crate::types::Result;

/// Step type: single-select category or multi-select material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationKind {
    Category,
    Material,
}

impl ClassificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Material => "material",
        }
    }
}

/// What the context describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Element,
    TargetLayer,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Element, RecordKind::TargetLayer];

    /// Directory holding records of this kind in every stage output
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Element => "Elements",
            Self::TargetLayer => "Target_Layers",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub kind: ClassificationKind,
    pub record_kind: RecordKind,
    /// Serialized element or layer record
    pub context: Value,
    /// Category names, material names, or `{Name, Density}` objects
    pub options: Vec<Value>,
    /// Last category on the path, for material steps
    pub last_category: Option<String>,
}

/// Parsed answer of one classification call
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Category(Option<String>),
    Materials(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub selection: Selection,
    pub raw: Value,
    pub usage: TokenUsage,
    pub elapsed_ms: u64,
    pub provider: String,
    pub model: String,
    pub cost_usd: f64,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<Classification>;

    /// Provider and model used for a step kind
    fn describe(&self, kind: ClassificationKind) -> (String, String);
}

// =============================================================================
// Response parsing
// =============================================================================

fn is_none_answer(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none")
}

/// Read the answer of a classifier reply.
///
/// `null`, `"None"`, `""` and `[]` all mean no category; a list in the
/// category slot contributes its first entry. Materials accept a list or a
/// single string.
pub fn parse_selection(kind: ClassificationKind, content: &Value) -> Selection {
    match kind {
        ClassificationKind::Category => {
            let name = match content.get(CATEGORY_KEY) {
                Some(Value::String(s)) if !is_none_answer(s) => Some(s.trim().to_string()),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|s| !is_none_answer(s))
                    .map(|s| s.trim().to_string()),
                _ => None,
            };
            Selection::Category(name)
        }
        ClassificationKind::Material => {
            let names = match content.get(MATERIALS_KEY) {
                Some(Value::String(s)) if !is_none_answer(s) => vec![s.trim().to_string()],
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.as_str()),
                        Value::Object(map) => map.get("Name").and_then(Value::as_str),
                        _ => None,
                    })
                    .filter(|s| !is_none_answer(s))
                    .map(|s| s.trim().to_string())
                    .collect(),
                _ => Vec::new(),
            };
            Selection::Materials(names)
        }
    }
}

// =============================================================================
// LLM-backed classifier
// =============================================================================

pub struct LlmClassifier {
    category: SharedProvider,
    material: SharedProvider,
    settings: PromptSettings,
}

impl LlmClassifier {
    pub fn new(category: SharedProvider, material: SharedProvider, settings: PromptSettings) -> Self {
        Self {
            category,
            material,
            settings,
        }
    }

    fn provider(&self, kind: ClassificationKind) -> &SharedProvider {
        match kind {
            ClassificationKind::Category => &self.category,
            ClassificationKind::Material => &self.material,
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<Classification> {
        let provider = self.provider(request.kind);
        let context = if self.settings.prune_empty {
            prune_context(&request.context)
        } else {
            request.context.clone()
        };
        let prompt = build_classification_prompt(request, &context, &self.settings);
        let schema = response_schema(request.kind, self.settings.reasoning);

        let response = provider.generate(&prompt, &schema).await?;
        let selection = parse_selection(request.kind, &response.content);
        debug!(
            "{} step answered by {}/{}: {:?}",
            request.kind.as_str(),
            provider.name(),
            provider.model(),
            selection
        );

        Ok(Classification {
            selection,
            cost_usd: estimate_cost(provider.model(), &response.usage),
            usage: response.usage,
            elapsed_ms: response.timing.total_ms,
            provider: response.metadata.provider,
            model: response.metadata.model,
            raw: response.content,
        })
    }

    fn describe(&self, kind: ClassificationKind) -> (String, String) {
        let provider = self.provider(kind);
        (provider.name().to_string(), provider.model().to_string())
    }
}
