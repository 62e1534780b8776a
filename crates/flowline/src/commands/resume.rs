//! Resume command - continue a suspended run.

use anyhow::Result;
use clap::Args;

use super::{Context, parse_input, print_snapshot, session};

/// Arguments for the resume command.
#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run ID
    pub run: String,

    /// Payload for the waiting block as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub input: String,

    /// Tenant resuming the run
    #[arg(long)]
    pub tenant: Option<String>,

    /// User resuming the run
    #[arg(long)]
    pub user: Option<String>,
}

/// Run the resume command.
pub async fn run(args: ResumeArgs, ctx: &Context) -> Result<()> {
    let input = parse_input(&args.input)?;
    let engine = ctx.engine()?;

    let snapshot = engine
        .resume(&args.run, input, session(args.tenant, args.user))
        .await?;
    print_snapshot(ctx, &snapshot)
}
