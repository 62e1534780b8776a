//! CLI command handlers.

pub mod blocks;
pub mod import;
pub mod keygen;
pub mod resume;
pub mod run;
pub mod secrets;
pub mod show;
pub mod vars;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use console::{Style, style};
use flowline_config::FlowlineConfig;
use flowline_engine::{AgeCipher, EngineConfig, SecretCipher, Services, WorkflowEngine};
use flowline_store::SqliteStore;
use flowline_types::{Run, RunSnapshot, RunStatus, Session, Step, StepStatus};
use serde_json::Value;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: FlowlineConfig,
    /// Directory holding `config.toml`, the identity and logs by default.
    pub config_dir: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn open_store(&self) -> Result<Arc<SqliteStore>> {
        let path = self.config.database_path()?;
        let store = SqliteStore::open(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Arc::new(store))
    }

    pub fn identity_path(&self) -> PathBuf {
        self.config.identity_path_in(&self.config_dir)
    }

    /// The configured age identity; fails when none has been generated.
    pub fn load_cipher(&self) -> Result<AgeCipher> {
        let path = self.identity_path();
        if !path.exists() {
            bail!(
                "No identity at {} (run `flowline keygen` first)",
                path.display()
            );
        }
        Ok(AgeCipher::from_file(&path)?)
    }

    /// An engine over the on-disk store.
    ///
    /// Without an identity file the engine gets a throwaway key; it can run
    /// workflows but not decrypt stored credentials.
    pub fn engine(&self) -> Result<WorkflowEngine> {
        let store = self.open_store()?;
        let cipher = if self.identity_path().exists() {
            self.load_cipher()?
        } else {
            tracing::debug!(path = %self.identity_path().display(), "No identity, using ephemeral key");
            AgeCipher::generate().0
        };
        let cipher: Arc<dyn SecretCipher> = Arc::new(cipher);
        let services = Services::from_config(&self.config, cipher)?;
        Ok(WorkflowEngine::new(
            store,
            services,
            EngineConfig::from(&self.config.engine()),
        ))
    }
}

/// Parse a JSON object given on the command line.
pub fn parse_input(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--input must be valid JSON")?;
    if !value.is_object() {
        bail!("--input must be a JSON object");
    }
    Ok(value)
}

pub fn session(tenant: Option<String>, user: Option<String>) -> Session {
    Session {
        user_id: user,
        tenant_id: tenant,
        ..Default::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

pub fn status_style(status: RunStatus) -> Style {
    match status {
        RunStatus::Success => Style::new().green(),
        RunStatus::Error => Style::new().red(),
        RunStatus::WaitingBlock => Style::new().yellow(),
        _ => Style::new().cyan(),
    }
}

pub fn print_step(step: &Step) {
    let dim = Style::new().dim();
    let marker = match step.status {
        StepStatus::Success => Style::new().green().apply_to("✓"),
        StepStatus::Error => Style::new().red().apply_to("✗"),
        _ => Style::new().cyan().apply_to("…"),
    };
    let from = step
        .from_block_id
        .as_deref()
        .map(|f| format!(" (from {})", f))
        .unwrap_or_default();
    println!("  {} {}{}", marker, step.block_id, dim.apply_to(from));
    if let Some(error) = &step.error {
        println!("      {}", Style::new().red().apply_to(error));
    }
}

/// Print a snapshot as JSON or as a human-readable summary.
pub fn print_snapshot(ctx: &Context, snapshot: &RunSnapshot) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    print_run_header(&snapshot.run);
    println!();

    for step in &snapshot.steps {
        print_step(step);
    }

    let run = &snapshot.run;
    if ctx.verbose && !run.output.is_null() {
        println!();
        println!("{}", Style::new().dim().apply_to("Output:"));
        println!("{}", serde_json::to_string_pretty(&run.output)?);
    }
    Ok(())
}

pub fn print_run_header(run: &Run) {
    println!("{} {}", style("Run").bold(), run.id);
    println!("{}", Style::new().dim().apply_to("─".repeat(50)));
    println!(
        "Workflow: {}  Status: {}  Duration: {}ms",
        run.workflow_id,
        status_style(run.status).apply_to(run.status),
        run.duration_ms
    );
    if let Some(block) = &run.waiting_block_id {
        println!("Waiting on: {}", style(block).yellow());
    }
    if let Some(error) = &run.error {
        println!("{} {}", Style::new().red().apply_to("Error:"), error);
    }
}

pub fn print_error(message: impl std::fmt::Display) {
    let red = Style::new().red();
    eprintln!("{} {}", red.apply_to("Error:"), message);
}
