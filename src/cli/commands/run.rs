//! Run Command
//!
//! Usage:
//!   bimlca run [--from <stage>] [--to <stage>]
//!   bimlca stage <stage>

use crate::cli::{CommandContext, Output};
use crate::pipeline::{PipelineRunner, Stage};
use crate::types::{LcaError, Result};

const MAX_LISTED_DIAGNOSTICS: usize = 20;

/// Run stages `from..=to` in order
pub async fn run(ctx: &CommandContext, from: Stage, to: Stage) -> Result<()> {
    if from > to {
        return Err(LcaError::Config(format!(
            "--from {} comes after --to {}",
            from, to
        )));
    }
    execute(ctx, &Stage::range(from, to)).await
}

/// Run a single stage against the existing work directory
pub async fn stage(ctx: &CommandContext, stage: Stage) -> Result<()> {
    execute(ctx, &[stage]).await
}

async fn execute(ctx: &CommandContext, stages: &[Stage]) -> Result<()> {
    let out = Output::new();
    out.header(&format!(
        "bimlca: {} against {}",
        stages
            .iter()
            .map(Stage::as_str)
            .collect::<Vec<_>>()
            .join(" → "),
        ctx.config.database.name.directory_name()
    ));

    let runner = PipelineRunner::new(ctx.config.clone()).with_layout(ctx.layout.clone());
    let report = runner.run(stages).await?;

    out.run_summary(&report, MAX_LISTED_DIAGNOSTICS);
    if stages.contains(&Stage::Rollup) {
        out.success(&format!(
            "Final bill of quantities: {}",
            ctx.layout.final_boq().display()
        ));
    }
    out.info(&format!("Run report: {}", ctx.layout.run_report().display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.work_dir = dir.path().join("work");
        let ctx = CommandContext::from_config(config, None);

        let err = run(&ctx, Stage::Rollup, Stage::Quantities).await.unwrap_err();
        assert!(err.to_string().contains("--from rollup"));
        assert!(!ctx.layout.run_report().exists());
    }
}
