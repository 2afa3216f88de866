//! Stage orchestration.
//!
//! Stages run strictly in order and talk only through the work directory;
//! the runner wires configuration, the classifier and the run report.

mod layout;
mod report;
mod runner;
mod stage;

pub use layout::WorkLayout;
pub use report::{Diagnostic, RunReport, StageReport, StageSummary};
pub use runner::{PipelineRunner, build_classifier};
pub use stage::Stage;
