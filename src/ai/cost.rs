//! Advisory cost and footprint estimates for classification calls.
//!
//! Estimates are telemetry only and never influence control flow.

use crate::ai::provider::TokenUsage;
use crate::constants::footprint;

/// USD per 1k tokens, (prompt, completion), matched by model-name prefix
const RATES: &[(&str, f64, f64)] = &[
    ("gpt-4", 0.03, 0.06),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4o", 0.005, 0.015),
    ("gpt-4o-mini", 0.000_15, 0.000_6),
    ("gpt-3.5-turbo", 0.001, 0.002),
    ("claude-3-5-sonnet", 0.003, 0.015),
    ("claude-3-5-haiku", 0.000_8, 0.004),
];

/// Per-1k-token rates for a model; the longest matching prefix wins.
pub fn rates_for(model: &str) -> Option<(f64, f64)> {
    RATES
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len())
        .map(|(_, prompt, completion)| (*prompt, *completion))
}

/// Estimated USD cost of one call, 0 for models without a rate.
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> f64 {
    let Some((prompt_rate, completion_rate)) = rates_for(model) else {
        return 0.0;
    };
    let cost = usage.prompt_tokens as f64 * prompt_rate / 1000.0
        + usage.completion_tokens as f64 * completion_rate / 1000.0;
    crate::types::round_to(cost, 6)
}

/// Inference energy and emissions for a token count
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InferenceFootprint {
    pub energy_kwh: f64,
    pub emissions_kg_co2: f64,
}

impl InferenceFootprint {
    pub fn for_tokens(total_tokens: u64) -> Self {
        let energy_kwh = total_tokens as f64 * footprint::KWH_PER_TOKEN;
        Self {
            energy_kwh: crate::types::round_to(energy_kwh, 6),
            emissions_kg_co2: crate::types::round_to(energy_kwh * footprint::KG_CO2_PER_KWH, 6),
        }
    }
}
