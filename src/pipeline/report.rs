//! Run report: per-stage counts and structured skip diagnostics.
//!
//! Every record a stage skips produces a [`Diagnostic`]; nothing is only
//! printed. The report is written to `run_report.json` at the end of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::stage::Stage;

/// One skipped or degraded record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub input_id: String,
    pub stage: Stage,
    pub reason: String,
}

/// Counts for one stage run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub processed: usize,
    pub skipped: usize,
    pub timed_out: usize,
    /// Stage-specific counters, e.g. `groups` or `layers`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<String, usize>,
}

impl StageSummary {
    pub fn display(&self) -> String {
        let mut line = format!(
            "processed: {}, skipped: {}, timed out: {}",
            self.processed, self.skipped, self.timed_out
        );
        for (key, value) in &self.counters {
            line.push_str(&format!(", {}: {}", key, value));
        }
        line
    }
}

/// Accumulates the outcome of a single stage
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub summary: StageSummary,
    pub diagnostics: Vec<Diagnostic>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            summary: StageSummary::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn processed(&mut self) {
        self.summary.processed += 1;
    }

    /// Record a skipped input and log it
    pub fn skip(&mut self, input_id: impl Into<String>, reason: impl Into<String>) {
        let diagnostic = self.diagnostic(input_id, reason);
        warn!(
            "[{}] skipped {}: {}",
            self.stage, diagnostic.input_id, diagnostic.reason
        );
        self.summary.skipped += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Record a timed-out input; it is not counted as skipped
    pub fn timed_out(&mut self, input_id: impl Into<String>, reason: impl Into<String>) {
        let diagnostic = self.diagnostic(input_id, reason);
        warn!(
            "[{}] timed out {}: {}",
            self.stage, diagnostic.input_id, diagnostic.reason
        );
        self.summary.timed_out += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Record a processed input that still needs review
    pub fn flag(&mut self, input_id: impl Into<String>, reason: impl Into<String>) {
        let diagnostic = self.diagnostic(input_id, reason);
        warn!(
            "[{}] review {}: {}",
            self.stage, diagnostic.input_id, diagnostic.reason
        );
        self.diagnostics.push(diagnostic);
    }

    pub fn count(&mut self, key: &str, by: usize) {
        *self.summary.counters.entry(key.to_string()).or_insert(0) += by;
    }

    pub fn counter(&self, key: &str) -> usize {
        self.summary.counters.get(key).copied().unwrap_or(0)
    }

    fn diagnostic(&self, input_id: impl Into<String>, reason: impl Into<String>) -> Diagnostic {
        Diagnostic {
            input_id: input_id.into(),
            stage: self.stage,
            reason: reason.into(),
        }
    }

    /// Log the final counts line
    pub fn log_summary(&self) {
        info!("[{}] {}", self.stage, self.summary.display());
    }
}

/// Whole-run report written as `run_report.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub database: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: BTreeMap<Stage, StageSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            database: database.into(),
            started_at: Utc::now(),
            finished_at: None,
            stages: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn absorb(&mut self, report: StageReport) {
        self.stages.insert(report.stage, report.summary);
        self.diagnostics.extend(report.diagnostics);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn diagnostics_for(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_report_counts() {
        let mut report = StageReport::new(Stage::Aggregate);
        report.processed();
        report.processed();
        report.skip("broken.json", "invalid JSON");
        report.timed_out("wall-1", "timeout after 120s");
        report.flag("wall-2", "zero total thickness");
        report.count("groups", 3);
        report.count("groups", 1);

        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.timed_out, 1);
        assert_eq!(report.diagnostics.len(), 3);
        assert_eq!(report.counter("groups"), 4);
        assert!(report.summary.display().contains("groups: 4"));
    }

    #[test]
    fn test_run_report_absorbs() {
        let mut run = RunReport::new("kbob");
        let mut stage = StageReport::new(Stage::Dissect);
        stage.skip("x", "missing key");
        run.absorb(stage);
        run.absorb(StageReport::new(Stage::Rollup));
        run.finish();

        assert_eq!(run.stages.len(), 2);
        assert_eq!(run.diagnostics_for(Stage::Dissect).count(), 1);
        assert_eq!(run.diagnostics_for(Stage::Rollup).count(), 0);

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["stages"]["dissect"]["skipped"], 1);
        assert_eq!(json["diagnostics"][0]["stage"], "dissect");
    }
}
