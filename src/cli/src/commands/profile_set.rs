//! `nodeprov profile set` command.

use clap::Args;
use nodeprov_core::{apply_to_profiles, commit_changes, ProvisionConfig, Selection};

use super::set_flags::SetFlags;
use crate::prompt::LineConfirm;

#[derive(Args)]
pub struct ProfileSetArgs {
    /// Profiles to modify (default: the `default` profile)
    pub names: Vec<String>,

    /// Modify all profiles
    #[arg(short, long)]
    pub all: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub flags: SetFlags,
}

pub async fn execute(
    args: ProfileSetArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = args.flags.to_request()?;
    let mut db = super::open_node_db(config)?;

    if args.all {
        println!("\n*** WARNING: This command will modify all profiles! ***\n");
    }
    let selection = Selection::for_profiles(args.all, &args.names);
    let modified = apply_to_profiles(&mut db, &selection, &request)?;

    commit_changes(
        &db,
        &mut LineConfirm::stdin(),
        &super::reloader(config),
        args.yes,
        modified.len(),
        "profile",
    )?;
    Ok(())
}
