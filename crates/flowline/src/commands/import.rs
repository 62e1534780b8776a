//! Import command - load a workflow definition into the store.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use flowline_engine::BlockGraph;
use flowline_store::WorkflowStorage;
use flowline_types::{Workflow, WorkflowStatus};

use super::Context;

/// Arguments for the import command.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Workflow file (`.toml`, otherwise parsed as JSON)
    pub file: PathBuf,

    /// Override the workflow's status (draft, live, archived)
    #[arg(long)]
    pub status: Option<WorkflowStatus>,
}

/// Run the import command.
pub async fn run(args: ImportArgs, ctx: &Context) -> Result<()> {
    let mut workflow = read_workflow(&args.file)?;
    if let Some(status) = args.status {
        workflow.status = status;
    }
    for block in &mut workflow.blocks {
        if block.workflow_id.is_empty() {
            block.workflow_id = workflow.id.clone();
        }
    }

    // Rejects unknown kinds, missing triggers and unlabeled branch edges.
    let graph = BlockGraph::build(&workflow)?;

    let store = ctx.open_store()?;
    store.save_workflow(&workflow)?;
    tracing::info!(workflow_id = %workflow.id, blocks = graph.len(), "Workflow imported");

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        println!(
            "{} Imported {} {}",
            green.apply_to("✓"),
            workflow.name,
            dim.apply_to(format!("({}, {} blocks, {})", workflow.id, graph.len(), workflow.status))
        );
    }
    Ok(())
}

fn read_workflow(path: &Path) -> Result<Workflow> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let workflow = if is_toml {
        toml::from_str(&contents).with_context(|| format!("Invalid TOML in {}", path.display()))?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?
    };
    Ok(workflow)
}
