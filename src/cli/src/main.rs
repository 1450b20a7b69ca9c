//! nodeprov CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nodeprov_cli::commands::{dispatch, Cli};
use nodeprov_core::ProvisionConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ProvisionConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // RUST_LOG wins, then -v, then the configured level
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "warn".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli, &config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
