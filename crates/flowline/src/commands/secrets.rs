//! Secrets command - encrypted credentials exposed as `$credentials`.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use flowline_engine::SecretCipher;
use flowline_store::SecretStorage;
use flowline_types::Credential;
use serde::Serialize;

use super::Context;

/// Arguments for the secrets command.
#[derive(Args, Debug)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// Encrypt and store a credential
    Set {
        /// Credential name
        name: String,

        /// Plaintext value
        value: String,

        /// Owning tenant (omit for a global credential)
        #[arg(long)]
        tenant: Option<String>,
    },

    /// List credential names
    List {
        /// Tenant to list (omit for global credentials)
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Delete a credential
    Delete {
        /// Credential name
        name: String,

        #[arg(long)]
        tenant: Option<String>,
    },
}

/// Listing row; values are never printed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialEntry<'a> {
    name: &'a str,
    tenant_id: Option<&'a str>,
    updated_at: String,
}

/// Run the secrets command.
pub async fn run(args: SecretsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let green = Style::new().green();
    let dim = Style::new().dim();

    match args.command {
        SecretsCommand::Set {
            name,
            value,
            tenant,
        } => {
            let cipher = ctx.load_cipher()?;
            let encrypted = cipher.encrypt(&value)?;
            store.set_credential(&Credential::new(tenant.clone(), &name, encrypted))?;
            tracing::info!(name = %name, tenant = ?tenant, "Credential stored");
            if !ctx.json_output {
                println!("{} Credential set: {}", green.apply_to("✓"), name);
            }
        }
        SecretsCommand::List { tenant } => {
            let credentials = store.list_credentials(tenant.as_deref())?;
            let entries: Vec<_> = credentials
                .iter()
                .map(|c| CredentialEntry {
                    name: &c.name,
                    tenant_id: c.tenant_id.as_deref(),
                    updated_at: c.updated_at.to_rfc3339(),
                })
                .collect();

            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{}", style("Credentials").bold());
                println!("{}", dim.apply_to("─".repeat(50)));
                println!();
                if entries.is_empty() {
                    println!("{}", dim.apply_to("No credentials found"));
                }
                for entry in &entries {
                    println!("  {} {}", entry.name, dim.apply_to(&entry.updated_at));
                }
            }
        }
        SecretsCommand::Delete { name, tenant } => {
            if store.delete_credential(tenant.as_deref(), &name)? {
                if !ctx.json_output {
                    println!("{} Credential deleted: {}", green.apply_to("✓"), name);
                }
            } else {
                super::print_error(format!("No credential named '{}'", name));
            }
        }
    }

    Ok(())
}
