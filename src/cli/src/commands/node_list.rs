//! `nodeprov node list` command.

use clap::Args;
use nodeprov_core::ProvisionConfig;

use crate::output;

#[derive(Args)]
pub struct NodeListArgs {
    /// Node names (default: all)
    pub names: Vec<String>,

    /// Show every effective field with its source
    #[arg(short, long)]
    pub all: bool,
}

pub async fn execute(
    args: NodeListArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open_node_db(config)?;
    let ids: Vec<String> = if args.names.is_empty() {
        db.nodes().map(|n| n.id.clone()).collect()
    } else {
        args.names.clone()
    };

    if args.all {
        let mut table = output::new_table(&["NODE", "FIELD", "SOURCE", "VALUE"]);
        for id in &ids {
            let effective = db.effective_node(id, &config.defaults)?;
            for (field, value, source) in effective.rows() {
                table.add_row(vec![
                    id.clone(),
                    field,
                    source.to_string(),
                    output::or_dash(&value).to_string(),
                ]);
            }
        }
        println!("{table}");
        return Ok(());
    }

    let mut table = output::new_table(&["NODE NAME", "PROFILE", "CONTAINER", "NETWORK"]);
    for id in &ids {
        let effective = db.effective_node(id, &config.defaults)?;
        let primary = effective
            .netdevs
            .iter()
            .find(|(_, nd)| nd.value.primary)
            .map(|(name, nd)| format!("{name}:{}", nd.value.device))
            .unwrap_or_default();
        table.add_row(vec![
            id.clone(),
            output::or_dash(effective.profile.as_deref().unwrap_or_default()).to_string(),
            output::or_dash(&effective.container_name.value).to_string(),
            output::or_dash(&primary).to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
