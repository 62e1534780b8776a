//! Vars command - plaintext variables exposed as `$vars`.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use flowline_store::SecretStorage;
use flowline_types::Variable;

use super::Context;

/// Arguments for the vars command.
#[derive(Args, Debug)]
pub struct VarsArgs {
    #[command(subcommand)]
    pub command: VarsCommand,
}

#[derive(Subcommand, Debug)]
pub enum VarsCommand {
    /// Set a variable
    Set {
        name: String,
        value: String,

        /// Owning tenant (omit for a global variable)
        #[arg(long)]
        tenant: Option<String>,
    },

    /// List variables and their values
    List {
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Delete a variable
    Delete {
        name: String,

        #[arg(long)]
        tenant: Option<String>,
    },
}

/// Run the vars command.
pub async fn run(args: VarsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let green = Style::new().green();
    let dim = Style::new().dim();

    match args.command {
        VarsCommand::Set {
            name,
            value,
            tenant,
        } => {
            store.set_variable(&Variable::new(tenant, &name, value))?;
            if !ctx.json_output {
                println!("{} Variable set: {}", green.apply_to("✓"), name);
            }
        }
        VarsCommand::List { tenant } => {
            let variables = store.list_variables(tenant.as_deref())?;
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&variables)?);
            } else {
                println!("{}", style("Variables").bold());
                println!("{}", dim.apply_to("─".repeat(50)));
                println!();
                if variables.is_empty() {
                    println!("{}", dim.apply_to("No variables found"));
                }
                for variable in &variables {
                    println!("  {} = {}", variable.name, variable.value);
                }
            }
        }
        VarsCommand::Delete { name, tenant } => {
            if store.delete_variable(tenant.as_deref(), &name)? {
                if !ctx.json_output {
                    println!("{} Variable deleted: {}", green.apply_to("✓"), name);
                }
            } else {
                super::print_error(format!("No variable named '{}'", name));
            }
        }
    }

    Ok(())
}
