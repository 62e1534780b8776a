//! Blocks command - print the block registry.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use flowline_engine::{FieldSpec, catalog};

use super::Context;

/// Arguments for the blocks command.
#[derive(Args, Debug)]
pub struct BlocksArgs {
    /// Show a single block kind
    pub kind: Option<String>,
}

/// Run the blocks command.
pub async fn run(args: BlocksArgs, ctx: &Context) -> Result<()> {
    let specs: Vec<_> = catalog()
        .iter()
        .filter(|s| args.kind.as_deref().is_none_or(|k| s.kind.as_str() == k))
        .collect();

    if specs.is_empty()
        && let Some(kind) = &args.kind
    {
        anyhow::bail!("Unknown block kind '{}'", kind);
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&specs)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{}", style("Block Kinds").bold());
    println!("{}", dim.apply_to("─".repeat(50)));

    for spec in specs {
        println!();
        println!(
            "{} {}",
            style(spec.kind.as_str()).cyan().bold(),
            dim.apply_to(format!("[{:?}]", spec.kind.family()))
        );
        println!("  {}", spec.description);
        if !spec.inputs.is_empty() {
            println!("  {} {}", dim.apply_to("in: "), fields(spec.inputs));
        }
        if !spec.outputs.is_empty() {
            println!("  {} {}", dim.apply_to("out:"), fields(spec.outputs));
        }
        if !spec.labels.is_empty() {
            println!("  {} {}", dim.apply_to("edges:"), spec.labels.join(", "));
        }
    }
    Ok(())
}

fn fields(specs: &[FieldSpec]) -> String {
    specs
        .iter()
        .map(|f| {
            let marker = if f.required { "" } else { "?" };
            format!("{}{}: {:?}", f.name, marker, f.field_type)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
