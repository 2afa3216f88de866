use console::style;

use crate::pipeline::RunReport;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", style(label).dim(), value);
    }

    /// Per-stage counts and the first diagnostics of a finished run
    pub fn run_summary(&self, run: &RunReport, max_diagnostics: usize) {
        self.section(&format!("Run {} ({})", run.run_id, run.database));
        for (stage, summary) in &run.stages {
            let line = format!("{:<12} {}", stage.as_str(), summary.display());
            if summary.skipped > 0 || summary.timed_out > 0 {
                self.warning(&line);
            } else {
                self.success(&line);
            }
        }

        if run.diagnostics.is_empty() {
            return;
        }
        self.section(&format!("Diagnostics ({})", run.diagnostics.len()));
        for d in run.diagnostics.iter().take(max_diagnostics) {
            println!("  [{}] {}: {}", d.stage, d.input_id, d.reason);
        }
        if run.diagnostics.len() > max_diagnostics {
            println!(
                "  ... {} more in run_report.json",
                run.diagnostics.len() - max_diagnostics
            );
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
