//! `nodeprov profile delete` command.

use clap::Args;
use nodeprov_core::{commit_confirmed, ProvisionConfig};

use crate::prompt::LineConfirm;

#[derive(Args)]
pub struct ProfileDeleteArgs {
    /// Profile names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn execute(
    args: ProfileDeleteArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = super::open_node_db(config)?;
    for name in &args.names {
        db.delete_profile(name)?;
    }

    let question = format!(
        "Are you sure you want to delete {} profile(s)",
        args.names.len()
    );
    let committed = commit_confirmed(
        &db,
        &mut LineConfirm::stdin(),
        &super::reloader(config),
        args.yes,
        &question,
    )?;
    if committed {
        println!("Deleted {} profile(s)", args.names.len());
    }
    Ok(())
}
