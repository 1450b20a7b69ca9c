//! `nodeprov profile add` command.

use clap::Args;
use nodeprov_core::{persist_and_reload, ProvisionConfig};

#[derive(Args)]
pub struct ProfileAddArgs {
    /// Profile names
    #[arg(required = true)]
    pub names: Vec<String>,
}

pub async fn execute(
    args: ProfileAddArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = super::open_node_db(config)?;
    for name in &args.names {
        db.add_profile(name)?;
        tracing::info!(profile = %name, "Added profile");
    }
    persist_and_reload(&db, &super::reloader(config))?;
    println!("Added {} profile(s)", args.names.len());
    Ok(())
}
