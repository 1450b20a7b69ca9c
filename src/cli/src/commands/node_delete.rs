//! `nodeprov node delete` command.

use clap::Args;
use nodeprov_core::{commit_confirmed, ProvisionConfig};

use crate::prompt::LineConfirm;

#[derive(Args)]
pub struct NodeDeleteArgs {
    /// Node names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn execute(
    args: NodeDeleteArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = super::open_node_db(config)?;
    for name in &args.names {
        db.delete_node(name)?;
    }

    let question = format!("Are you sure you want to delete {} node(s)", args.names.len());
    if commit_confirmed(
        &db,
        &mut LineConfirm::stdin(),
        &super::reloader(config),
        args.yes,
        &question,
    )? {
        println!("Deleted {} node(s)", args.names.len());
    }
    Ok(())
}
