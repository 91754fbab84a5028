// CLI - Command Line Interface for the Omni node
// Principle: Simple, clear, composable commands

pub mod config;
pub mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Omni Node - Meta-protocol feature activation and issuance
#[derive(Parser, Debug)]
#[command(name = "omni-node")]
#[command(author = "Omni Core Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Omni meta-protocol node - feature activation replay and queries")]
#[command(long_about = r#"
Replays decoded meta-protocol blocks through the feature activation engine
and the fixed issuance handler, persisting checkpoints between runs.

Replay a block file on regtest:
  omni-node replay --blocks blocks.json --chain regtest

Query a feature after replay:
  omni-node status --feature 1 --chain regtest

List pending and completed activations:
  omni-node activations --chain regtest
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "OMNI_LOG")]
    pub log_level: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay blocks from a JSON file
    Replay(ReplayCmd),

    /// Show a feature's status
    Status(StatusCmd),

    /// List pending and completed activations
    Activations(ActivationsCmd),

    /// Show a created property
    Property(PropertyCmd),

    /// Purge chain data
    Purge(PurgeCmd),
}

/// Chain selection shared by every command
#[derive(Parser, Debug, Clone)]
pub struct ChainArgs {
    /// Chain preset (regtest, main) or path to a chain config file
    #[arg(long, default_value = "regtest", env = "OMNI_CHAIN")]
    pub chain: String,

    /// Base path for chain data
    #[arg(short = 'd', long, env = "OMNI_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Additional authorized sender (can be specified multiple times)
    #[arg(long = "admin", value_name = "ADDRESS")]
    pub admins: Vec<String>,

    /// Sender whose feature messages are ignored (can be specified multiple times)
    #[arg(long = "ignore", value_name = "ADDRESS")]
    pub ignored: Vec<String>,
}

impl ChainArgs {
    /// Get the base path, defaulting to platform-specific data directory
    pub fn get_base_path(&self, chain_name: &str) -> PathBuf {
        if let Some(ref path) = self.base_path {
            path.clone()
        } else {
            let data_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("omni");

            data_dir.join("chains").join(chain_name)
        }
    }
}

/// Replay blocks
#[derive(Parser, Debug)]
pub struct ReplayCmd {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// JSON file holding an array of blocks
    #[arg(long)]
    pub blocks: PathBuf,

    /// Do not read or write checkpoints
    #[arg(long)]
    pub no_checkpoint: bool,

    /// Client version to judge activations against
    #[arg(long)]
    pub client_version: Option<u32>,
}

/// Show a feature's status
#[derive(Parser, Debug)]
pub struct StatusCmd {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Feature identifier
    #[arg(long)]
    pub feature: u32,

    /// Height to check usability at (latest checkpoint if not specified)
    #[arg(long)]
    pub height: Option<u64>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// List activations
#[derive(Parser, Debug)]
pub struct ActivationsCmd {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Show a property
#[derive(Parser, Debug)]
pub struct PropertyCmd {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Property identifier
    #[arg(long)]
    pub id: u32,
}

/// Purge chain data
#[derive(Parser, Debug)]
pub struct PurgeCmd {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}
