//! `nodeprov profile list` command.

use clap::Args;
use nodeprov_core::{resolve_node, Node, ProvisionConfig};

use crate::output;

#[derive(Args)]
pub struct ProfileListArgs {
    /// Profile names (default: all)
    pub names: Vec<String>,

    /// Show every field
    #[arg(short, long)]
    pub all: bool,
}

pub async fn execute(
    args: ProfileListArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open_node_db(config)?;
    let profiles: Vec<_> = db
        .profiles()
        .filter(|p| args.names.is_empty() || args.names.contains(&p.id))
        .collect();

    if args.all {
        let mut table = output::new_table(&["PROFILE", "FIELD", "SOURCE", "VALUE"]);
        for profile in profiles {
            // A bare node on this profile shows what the profile contributes.
            let bare = Node::new(profile.id.as_str()).with_profile(profile.id.as_str());
            let effective = resolve_node(&bare, Some(profile), &config.defaults);
            for (field, value, source) in effective.rows().into_iter().skip(1) {
                table.add_row(vec![
                    profile.id.clone(),
                    field,
                    source.to_string(),
                    output::or_dash(&value).to_string(),
                ]);
            }
        }
        println!("{table}");
        return Ok(());
    }

    let mut table = output::new_table(&["PROFILE NAME", "COMMENT/DESCRIPTION"]);
    for profile in profiles {
        table.add_row(vec![
            profile.id.clone(),
            output::or_dash(&profile.config.comment.get()).to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
