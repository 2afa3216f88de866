//! Check Command
//!
//! Verifies inputs, the selected taxonomy and both LLM endpoints before a
//! long run, and lists which stage outputs already exist in the work
//! directory.

use std::path::PathBuf;

use crate::ai::provider::create_provider;
use crate::cli::{CommandContext, Output};
use crate::config::Config;
use crate::pipeline::{Stage, WorkLayout};
use crate::taxonomy::TaxonomyNode;
use crate::types::utils::list_json_files;
use crate::types::{LcaError, Result};

/// Primary output of each stage, used to tell which stages can be resumed from
fn stage_outputs(config: &Config, layout: &WorkLayout) -> Vec<(Stage, PathBuf)> {
    vec![
        (Stage::Quantities, layout.quantities_boq()),
        (Stage::Aggregate, layout.aggregate_boq()),
        (Stage::Dissect, layout.dissect_boq()),
        (Stage::Match, layout.inference_dir(config.database.name)),
        (Stage::Bookkeeping, layout.inference_metadata()),
        (Stage::Indicators, layout.indicators_dir()),
        (Stage::Emissions, layout.emissions_dir()),
        (Stage::Rollup, layout.final_boq()),
    ]
}

pub async fn run(ctx: &CommandContext, skip_llm: bool) -> Result<()> {
    let out = Output::new();
    let config = &ctx.config;
    let mut failures = 0usize;

    out.section("Inputs");
    match config.require_elements_dir() {
        Ok(dir) => {
            let count = list_json_files(dir)?.len();
            out.success(&format!("{} element files in {}", count, dir.display()));
        }
        Err(e) => {
            out.error(&e.to_string());
            failures += 1;
        }
    }

    match config
        .require_taxonomy_root()
        .and_then(|root| TaxonomyNode::load(&root))
    {
        Ok(root) => out.success(&format!(
            "{} taxonomy at {} ({} top-level categories)",
            config.database.name.directory_name(),
            root.dir().display(),
            root.category_options().len()
        )),
        Err(e) => {
            out.error(&e.to_string());
            failures += 1;
        }
    }

    out.section("Work directory");
    out.field("root", ctx.layout.root().display());
    for (stage, path) in stage_outputs(config, &ctx.layout) {
        if path.exists() {
            out.success(&format!("{} {}", stage.as_u8(), stage.name()));
        } else {
            out.info(&format!("{} {} (not run)", stage.as_u8(), stage.name()));
        }
    }

    if !skip_llm {
        out.section("LLM endpoints");
        for (label, llm) in [
            ("category", &config.category_llm),
            ("material", &config.material_llm),
        ] {
            let provider = match create_provider(llm) {
                Ok(provider) => provider,
                Err(e) => {
                    out.error(&format!("{}: {}", label, e));
                    failures += 1;
                    continue;
                }
            };
            match provider.health_check().await {
                Ok(true) => out.success(&format!(
                    "{}: {} / {}",
                    label,
                    provider.name(),
                    provider.model()
                )),
                Ok(false) => {
                    out.error(&format!("{}: {} is not reachable", label, provider.name()));
                    failures += 1;
                }
                Err(e) => {
                    out.error(&format!("{}: {}", label, e));
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        return Err(LcaError::Config(format!("{} check(s) failed", failures)));
    }
    out.success("Ready to run");
    Ok(())
}
