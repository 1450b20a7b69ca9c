//! `nodeprov container list` command.

use clap::Args;
use nodeprov_core::ProvisionConfig;
use nodeprov_runtime::ContainerStore;

use crate::output;

#[derive(Args)]
pub struct ContainerListArgs {
    /// Only show container names
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(
    args: ContainerListArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = ContainerStore::new(&config.container_root);
    let names = store.list()?;

    if args.quiet {
        for name in &names {
            println!("{name}");
        }
        return Ok(());
    }

    let db = super::open_node_db(config)?;
    let mut table = output::new_table(&["CONTAINER NAME", "NODES", "PATH"]);
    for name in &names {
        let users = db
            .nodes()
            .filter(|n| {
                db.effective_node(&n.id, &config.defaults)
                    .map(|eff| eff.container_name.value == *name)
                    .unwrap_or(false)
            })
            .count();
        table.add_row(vec![
            name.clone(),
            users.to_string(),
            store.rootfs_dir(name).display().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
