//! bimlca - Bill of Quantities and LCA for BIM Element Exports
//!
//! Turns per-element JSON exports of an IFC model into a bill of quantities
//! annotated with life-cycle emission indicators. Materials are matched by
//! an LLM walking the category tree of an indicator database (KBOB or
//! Ökobaudat) one level at a time.
//!
//! ## Stages
//!
//! 1. Quantity resolution
//! 2. Element aggregation
//! 3. Layer dissection
//! 4. Material matching
//! 5. Inference bookkeeping
//! 6. Indicator enrichment
//! 7. Emission calculation
//! 8. Rollup and report
//!
//! Stages communicate only through files in the work directory, so any
//! stage can be re-run once its predecessor's outputs exist.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bimlca::{ConfigLoader, PipelineRunner, Stage};
//!
//! let config = ConfigLoader::load(None)?;
//! let report = PipelineRunner::new(config).run(&Stage::ALL).await?;
//! println!("{} diagnostics", report.diagnostics.len());
//! ```
//!
//! ## Modules
//!
//! - [`quantity`], [`aggregate`], [`dissect`]: geometry and BOQ preparation
//! - [`taxonomy`], [`traverse`], [`ai`]: LLM-guided material matching
//! - [`bookkeeping`], [`lca`], [`rollup`]: summaries, indicators and report
//! - [`pipeline`]: stage identifiers, work-directory layout and the runner

pub mod aggregate;
pub mod ai;
pub mod bookkeeping;
pub mod cli;
pub mod config;
pub mod constants;
pub mod dissect;
pub mod lca;
pub mod pipeline;
pub mod quantity;
pub mod rollup;
pub mod taxonomy;
pub mod traverse;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader, DatabaseKind};
pub use types::error::{ErrorCategory, LcaError, Result};
pub use types::{BoqRow, BoqTable, ElementRecord, IndicatorCell, QuantitySource};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{PipelineRunner, RunReport, Stage, StageReport, WorkLayout};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    Classifier, LlmClassifier, LlmProvider, LlmResponse, MetricsCollector, RecordKind,
    create_provider, with_timeout,
};
