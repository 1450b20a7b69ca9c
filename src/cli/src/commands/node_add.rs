//! `nodeprov node add` command.

use clap::Args;
use nodeprov_core::{persist_and_reload, ProvisionConfig};

#[derive(Args)]
pub struct NodeAddArgs {
    /// Node names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Profile the new nodes use (default: `default`, when it exists)
    #[arg(short, long)]
    pub profile: Option<String>,
}

pub async fn execute(
    args: NodeAddArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = super::open_node_db(config)?;
    let profile = match args.profile {
        Some(profile) => Some(profile),
        None => db.profile("default").map(|p| p.id.clone()),
    };
    for name in &args.names {
        db.add_node(name, profile.as_deref())?;
        tracing::info!(node = %name, profile = ?profile, "Added node");
    }
    persist_and_reload(&db, &super::reloader(config))?;
    println!("Added {} node(s)", args.names.len());
    Ok(())
}
