//! Keygen command - create the age identity for credentials.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::Style;
use flowline_engine::AgeCipher;

use super::Context;

/// Arguments for the keygen command.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Overwrite an existing identity (existing credentials become unreadable)
    #[arg(long)]
    pub force: bool,
}

/// Run the keygen command.
pub async fn run(args: KeygenArgs, ctx: &Context) -> Result<()> {
    let path = ctx.identity_path();
    if path.exists() && !args.force {
        bail!(
            "Identity already exists at {} (use --force to replace it)",
            path.display()
        );
    }

    let (cipher, secret) = AgeCipher::generate();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = format!(
        "# created: {}\n# public key: {}\n{}\n",
        flowline_types::now().to_rfc3339(),
        cipher.public_key(),
        secret
    );
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), "Generated identity");

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({
                "path": path,
                "publicKey": cipher.public_key(),
            })
        );
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        println!(
            "{} Identity written to {}",
            green.apply_to("✓"),
            dim.apply_to(path.display())
        );
        println!("Public key: {}", cipher.public_key());
    }
    Ok(())
}
