//! AI Integration Layer
//!
//! LLM providers, the classification contract used by the taxonomy
//! traversal, prompt assembly, cost estimates and call metrics.

pub mod classifier;
pub mod cost;
pub mod json;
pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;

pub use classifier::{
    Classification, ClassificationKind, ClassificationRequest, Classifier, LlmClassifier,
    RecordKind, Selection, parse_selection,
};
pub use cost::{InferenceFootprint, estimate_cost};
pub use metrics::{MetricsCollector, MetricsSummary};
pub use prompt::PromptBuilder;
pub use provider::{
    LlmProvider, LlmResponse, ProviderConfig, ResponseMetadata, ResponseTiming, SharedProvider,
    TokenUsage, create_provider,
};
pub use timeout::with_timeout;
