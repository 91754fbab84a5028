// Omni Node - Entry point
// Principle: Features change by height, never by surprise

#![allow(dead_code)]

mod cli;
mod contracts;
mod genesis;
mod node;
mod storage;
mod types;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::config::NodeConfig;
use cli::runner::{list_activations, run_replay, show_property, show_status};
use cli::{Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_filter = if cli.verbose {
        "debug"
    } else {
        &cli.log_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    print_banner();

    match cli.command {
        Commands::Replay(cmd) => {
            let config = node_config(&cmd.chain)?.with_client_version(cmd.client_version);
            if let Err(e) = run_replay(&config, &cmd.blocks, !cmd.no_checkpoint) {
                error!("Replay failed: {}", e);
                return Err(anyhow::anyhow!("Replay failed: {}", e));
            }
        }

        Commands::Status(cmd) => {
            let config = node_config(&cmd.chain)?;
            show_status(&config, cmd.feature, cmd.height, &cmd.format)?;
        }

        Commands::Activations(cmd) => {
            let config = node_config(&cmd.chain)?;
            list_activations(&config, &cmd.format)?;
        }

        Commands::Property(cmd) => {
            let config = node_config(&cmd.chain)?;
            show_property(&config, cmd.id)?;
        }

        Commands::Purge(cmd) => {
            let path = node_config(&cmd.chain)?.base_path;

            if !cmd.yes {
                println!("This will delete all chain data at: {}", path.display());
                println!("Are you sure? [y/N]");

                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            if path.exists() {
                std::fs::remove_dir_all(&path)?;
                info!("Purged chain data at: {}", path.display());
            } else {
                info!("No data to purge at: {}", path.display());
            }
        }
    }

    Ok(())
}

fn node_config(args: &cli::ChainArgs) -> anyhow::Result<NodeConfig> {
    NodeConfig::from_chain_args(args).map_err(|e| {
        error!("Configuration error: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })
}

/// Print the Omni banner
fn print_banner() {
    println!(r#"
    ╔═══════════════════════════════════════════════════╗
    ║                                                   ║
    ║    ██████╗ ███╗   ███╗███╗   ██╗██╗               ║
    ║   ██╔═══██╗████╗ ████║████╗  ██║██║               ║
    ║   ██║   ██║██╔████╔██║██╔██╗ ██║██║               ║
    ║   ██║   ██║██║╚██╔╝██║██║╚██╗██║██║               ║
    ║   ╚██████╔╝██║ ╚═╝ ██║██║ ╚████║██║               ║
    ║    ╚═════╝ ╚═╝     ╚═╝╚═╝  ╚═══╝╚═╝               ║
    ║                                                   ║
    ║        Feature Activation • Fixed Issuance        ║
    ║                                                   ║
    ╚═══════════════════════════════════════════════════╝
    "#);
    println!("    Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}
