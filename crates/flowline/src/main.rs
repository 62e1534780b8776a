//! Flowline - workflow execution engine
//!
//! Main entry point for the Flowline CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use console::Style;
use flowline_config::{LoggingSection, load_config_with_options, user_config_dir};

mod commands;

use commands::{blocks, import, keygen, resume, run, secrets, show, vars};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Flowline - run block-graph workflows from the command line
#[derive(Parser)]
#[command(name = "flowline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config directory (default: ~/.config/flowline)
    #[arg(long, global = true, env = "FLOWLINE_CONFIG_DIR")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a run of a workflow
    Run(run::RunArgs),

    /// Resume a run suspended on a waitForInput block
    Resume(resume::ResumeArgs),

    /// Import a workflow definition (JSON or TOML)
    Import(import::ImportArgs),

    /// Show a run and its steps, or list recent runs
    Show(show::ShowArgs),

    /// Manage encrypted credentials
    Secrets(secrets::SecretsArgs),

    /// Manage plaintext variables
    Vars(vars::VarsArgs),

    /// Generate the age identity used to encrypt credentials
    Keygen(keygen::KeygenArgs),

    /// List the registered block kinds
    Blocks(blocks::BlocksArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = cli
        .config
        .clone()
        .or_else(user_config_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let loaded = load_config_with_options(None, Some(&config_dir))
        .context("Failed to load configuration")?;
    if cli.verbose {
        let dim = Style::new().dim();
        for path in loaded.loaded_from() {
            eprintln!("{}", dim.apply_to(format!("Config: {}", path.display())));
        }
    }
    let config = loaded.config;

    // Console (human-readable) + rotating JSON file
    let logging = config.logging();
    let log_dir = config.log_dir_in(&config_dir);
    let _guard = init_tracing(&logging, log_dir, cli.verbose);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        config,
        config_dir,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Resume(args) => resume::run(args, &ctx).await,
        Commands::Import(args) => import::run(args, &ctx).await,
        Commands::Show(args) => show::run(args, &ctx).await,
        Commands::Secrets(args) => secrets::run(args, &ctx).await,
        Commands::Vars(args) => vars::run(args, &ctx).await,
        Commands::Keygen(args) => keygen::run(args, &ctx).await,
        Commands::Blocks(args) => blocks::run(args, &ctx).await,
    }
}

const CRATES: [&str; 5] = [
    "flowline",
    "flowline_engine",
    "flowline_store",
    "flowline_config",
    "flowline_types",
];

fn crate_filter(level: &str, fallback: &str) -> String {
    let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{}={}", c, level)).collect();
    directives.push(fallback.to_string());
    directives.join(",")
}

/// Install the console layer and, when enabled, a daily JSON file layer.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(
    logging: &LoggingSection,
    log_dir: PathBuf,
    verbose: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let console_filter = if verbose {
        EnvFilter::new(crate_filter("debug", "info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(crate_filter(&logging.level, "warn")))
    };

    let (file_layer, guard) = if logging.file {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "flowline.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new(crate_filter("trace", "info")));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
