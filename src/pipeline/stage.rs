//! Stage identifiers.
//!
//! Stages are numbered 1-8 in execution order:
//! - 1: Quantities - resolve length / area / volume per element
//! - 2: Aggregate - group identical elements, pick representatives
//! - 3: Dissect - split multi-layer elements into layer records
//! - 4: Match - taxonomy traversal with the classifier
//! - 5: Bookkeeping - per-record inference summaries and run metadata
//! - 6: Indicators - join matched materials with indicator records
//! - 7: Emissions - scale indicators by quantities
//! - 8: Rollup - min / mean / max columns and the final report

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Quantities = 1,
    Aggregate = 2,
    Dissect = 3,
    Match = 4,
    Bookkeeping = 5,
    Indicators = 6,
    Emissions = 7,
    Rollup = 8,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Quantities,
        Stage::Aggregate,
        Stage::Dissect,
        Stage::Match,
        Stage::Bookkeeping,
        Stage::Indicators,
        Stage::Emissions,
        Stage::Rollup,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantities => "quantities",
            Self::Aggregate => "aggregate",
            Self::Dissect => "dissect",
            Self::Match => "match",
            Self::Bookkeeping => "bookkeeping",
            Self::Indicators => "indicators",
            Self::Emissions => "emissions",
            Self::Rollup => "rollup",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Quantities => "Quantity Resolution",
            Self::Aggregate => "Element Aggregation",
            Self::Dissect => "Layer Dissection",
            Self::Match => "Material Matching",
            Self::Bookkeeping => "Inference Bookkeeping",
            Self::Indicators => "Indicator Enrichment",
            Self::Emissions => "Emission Calculation",
            Self::Rollup => "Rollup and Report",
        }
    }

    /// Whether the stage issues classification calls
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Match)
    }

    /// Stages from `from` through `to`, inclusive, in execution order
    pub fn range(from: Stage, to: Stage) -> Vec<Stage> {
        Self::ALL
            .into_iter()
            .filter(|s| *s >= from && *s <= to)
            .collect()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
