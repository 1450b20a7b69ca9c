//! `nodeprov container import` command.

use clap::Args;
use nodeprov_core::ProvisionConfig;
use nodeprov_runtime::{ImportOptions, Importer};

#[derive(Args)]
pub struct ContainerImportArgs {
    /// Source: docker://REFERENCE, a root filesystem directory, or a tarball
    pub source: String,

    /// Container name
    pub name: String,

    /// Replace an existing container
    #[arg(short, long, conflicts_with = "update")]
    pub force: bool,

    /// Import on top of an existing container
    #[arg(short, long)]
    pub update: bool,
}

pub async fn execute(
    args: ContainerImportArgs,
    config: &ProvisionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let importer = Importer::from_config(config);
    let options = ImportOptions {
        force: args.force,
        update: args.update,
    };

    println!("Importing {} as {}...", args.source, args.name);
    let report = importer.import(&args.source, &args.name, options).await?;

    match report.image_id {
        Some(id) => println!("Imported: {} ({}, {})", report.name, id, report.rootfs.display()),
        None => println!("Imported: {} ({})", report.name, report.rootfs.display()),
    }
    Ok(())
}
