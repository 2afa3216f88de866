use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bimlca::cli::CommandContext;
use bimlca::cli::commands;
use bimlca::config::DatabaseKind;
use bimlca::pipeline::Stage;

#[derive(Parser)]
#[command(name = "bimlca")]
#[command(
    version,
    about = "Bill of quantities and life-cycle emissions for BIM element exports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file merged over the global and project configs
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Indicator database, overrides database.name
    #[arg(long, short, global = true, env = "BIMLCA_DATABASE")]
    database: Option<DatabaseKind>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline, all stages by default
    Run {
        #[arg(long, value_enum, default_value = "quantities", help = "First stage to run")]
        from: Stage,
        #[arg(long, value_enum, default_value = "rollup", help = "Last stage to run")]
        to: Stage,
    },

    /// Run one stage against the existing work directory
    Stage {
        #[arg(value_enum)]
        stage: Stage,
    },

    /// Check inputs, taxonomy and LLM endpoints
    Check {
        #[arg(long, help = "Skip the LLM endpoint health checks")]
        offline: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Print JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Write bimlca.toml into the current directory
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mbimlca encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!("\x1b[33mStage outputs written so far are kept in the work directory.\x1b[0m");
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Commands that work without a loadable configuration
    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigAction::Path => return Ok(commands::config::path()?),
            ConfigAction::Init { force } => return Ok(commands::config::init(*force)?),
            ConfigAction::Show { .. } => {}
        }
    }

    let ctx = CommandContext::load(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Run { from, to } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::run::run(&ctx, from, to))?;
        }
        Commands::Stage { stage } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::run::stage(&ctx, stage))?;
        }
        Commands::Check { offline } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::check::run(&ctx, offline))?;
        }
        Commands::Config { action } => {
            if let ConfigAction::Show { json } = action {
                commands::config::show(&ctx, json)?;
            }
        }
    }

    Ok(())
}
