//! Run command - start a workflow run.

use std::collections::HashSet;

use anyhow::Result;
use clap::Args;
use console::Style;
use flowline_engine::{StartRequest, WorkflowEngine};
use flowline_types::{RunSnapshot, TriggerType, new_id};

use super::{Context, parse_input, print_run_header, print_snapshot, print_step, session};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow ID
    pub workflow: String,

    /// Trigger payload as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub input: String,

    /// Tenant the run belongs to (defaults to the workflow's tenant)
    #[arg(long)]
    pub tenant: Option<String>,

    /// User starting the run
    #[arg(long)]
    pub user: Option<String>,

    /// How the run was triggered (manual, api, stream)
    #[arg(long, default_value = "manual")]
    pub trigger: TriggerType,

    /// Print steps as they complete
    #[arg(short, long)]
    pub watch: bool,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let input = parse_input(&args.input)?;
    let engine = ctx.engine()?;

    let request = StartRequest::new(args.workflow, input)
        .with_session(session(args.tenant, args.user))
        .with_trigger(args.trigger);

    if args.watch && !ctx.json_output {
        let snapshot = watch(&engine, request).await?;
        print_run_header(&snapshot.run);
        return Ok(());
    }

    let snapshot = engine.start(request).await?;
    print_snapshot(ctx, &snapshot)
}

/// Start the run while printing each step as its snapshot arrives.
async fn watch(engine: &WorkflowEngine, request: StartRequest) -> Result<RunSnapshot> {
    let run_id = new_id();
    let mut updates = engine.subscribe(&run_id)?;
    let dim = Style::new().dim();
    println!("{}", dim.apply_to(format!("Watching run {}", run_id)));

    let start = engine.start(request.with_run_id(run_id));
    tokio::pin!(start);

    let mut printed = HashSet::new();
    let snapshot = loop {
        tokio::select! {
            result = &mut start => break result?,
            Some(update) = updates.next() => print_finished(&update, &mut printed),
        }
    };
    print_finished(&snapshot, &mut printed);
    println!();
    Ok(snapshot)
}

/// Print finished steps not yet in `printed`.
fn print_finished(snapshot: &RunSnapshot, printed: &mut HashSet<String>) {
    for step in snapshot.steps.iter().filter(|s| s.finished_at.is_some()) {
        if printed.insert(step.id.clone()) {
            print_step(step);
        }
    }
}
