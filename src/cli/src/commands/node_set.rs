//! `nodeprov node set` command.

use clap::Args;
use nodeprov_core::{apply_to_nodes, commit_changes, ProvisionConfig, Selection};

use super::set_flags::SetFlags;
use crate::prompt::LineConfirm;

#[derive(Args)]
pub struct NodeSetArgs {
    /// Nodes to modify
    #[arg(required_unless_present = "all")]
    pub names: Vec<String>,

    /// Modify all nodes
    #[arg(short, long)]
    pub all: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Bind the nodes to this profile (UNSET detaches them)
    #[arg(short, long)]
    pub profile: Option<String>,

    #[command(flatten)]
    pub flags: SetFlags,
}

pub async fn execute(
    args: NodeSetArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = args.flags.to_request()?;
    let mut db = super::open_node_db(config)?;

    let selection = if args.all {
        println!("\n*** WARNING: This command will modify all nodes! ***\n");
        Selection::All
    } else {
        Selection::Named(args.names.clone())
    };
    let modified = apply_to_nodes(&mut db, &selection, &request, args.profile.as_deref())?;

    commit_changes(
        &db,
        &mut LineConfirm::stdin(),
        &super::reloader(config),
        args.yes,
        modified.len(),
        "node",
    )?;
    Ok(())
}
