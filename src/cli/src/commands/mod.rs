//! CLI command definitions and dispatch.

mod container_import;
mod container_list;
mod node_add;
mod node_delete;
mod node_list;
mod node_set;
mod profile_add;
mod profile_delete;
mod profile_list;
mod profile_set;
mod set_flags;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nodeprov_core::{NodeDb, ProvisionConfig};

use crate::reload::PidFileReloader;

/// nodeprov: cluster node provisioning.
#[derive(Parser)]
#[command(name = "nodeprov", version, about)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: $NODEPROV_CONFIG or /etc/nodeprov/nodeprov.conf)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Manage container root filesystems
    #[command(subcommand)]
    Container(ContainerCommand),
    /// Manage node profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Manage nodes
    #[command(subcommand)]
    Node(NodeCommand),
}

#[derive(Subcommand)]
pub enum ContainerCommand {
    /// Import a container from a registry, directory or tarball
    Import(container_import::ContainerImportArgs),
    /// List imported containers
    List(container_list::ContainerListArgs),
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Add new profiles
    Add(profile_add::ProfileAddArgs),
    /// Delete profiles
    Delete(profile_delete::ProfileDeleteArgs),
    /// List profiles
    List(profile_list::ProfileListArgs),
    /// Configure profile properties
    Set(profile_set::ProfileSetArgs),
}

#[derive(Subcommand)]
pub enum NodeCommand {
    /// Add new nodes
    Add(node_add::NodeAddArgs),
    /// Delete nodes
    Delete(node_delete::NodeDeleteArgs),
    /// List nodes
    List(node_list::NodeListArgs),
    /// Configure node properties
    Set(node_set::NodeSetArgs),
}

/// Open the node database named by the configuration.
pub(crate) fn open_node_db(config: &ProvisionConfig) -> Result<NodeDb, Box<dyn std::error::Error>> {
    Ok(NodeDb::load(&config.node_db)?)
}

pub(crate) fn reloader(config: &ProvisionConfig) -> PidFileReloader {
    PidFileReloader::new(&config.pid_file)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: &ProvisionConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Container(cmd) => match cmd {
            ContainerCommand::Import(args) => container_import::execute(args, config).await,
            ContainerCommand::List(args) => container_list::execute(args, config).await,
        },
        Command::Profile(cmd) => match cmd {
            ProfileCommand::Add(args) => profile_add::execute(args, config).await,
            ProfileCommand::Delete(args) => profile_delete::execute(args, config).await,
            ProfileCommand::List(args) => profile_list::execute(args, config).await,
            ProfileCommand::Set(args) => profile_set::execute(args, config).await,
        },
        Command::Node(cmd) => match cmd {
            NodeCommand::Add(args) => node_add::execute(args, config).await,
            NodeCommand::Delete(args) => node_delete::execute(args, config).await,
            NodeCommand::List(args) => node_list::execute(args, config).await,
            NodeCommand::Set(args) => node_set::execute(args, config).await,
        },
    }
}
