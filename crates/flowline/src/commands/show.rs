//! Show command - inspect runs.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use flowline_store::ExecutionStorage;

use super::{Context, print_snapshot, status_style};

/// Arguments for the show command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Run ID (omit to list recent runs)
    pub run: Option<String>,

    /// Only list runs of this workflow
    #[arg(long)]
    pub workflow: Option<String>,

    /// Maximum runs to list
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Run the show command.
pub async fn run(args: ShowArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;

    if let Some(run_id) = args.run {
        let snapshot = store.snapshot(&run_id)?;
        return print_snapshot(ctx, &snapshot);
    }

    let runs = store.list_runs(args.workflow.as_deref(), args.limit)?;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Recent Runs").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();

    if runs.is_empty() {
        println!("{}", dim.apply_to("No runs found"));
    }
    for run in &runs {
        println!(
            "{} {:<14} {} {}",
            dim.apply_to(run.created_at.format("%Y-%m-%d %H:%M:%S")),
            status_style(run.status).apply_to(run.status),
            run.id,
            dim.apply_to(format!("({})", run.workflow_id))
        );
    }
    Ok(())
}
