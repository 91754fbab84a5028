// CLI Configuration - Convert CLI args to node config
// Principle: Clear mapping between user input and internal configuration

use crate::cli::ChainArgs;
use crate::genesis::{ChainConfig, ChainConfigError};
use crate::types::{Address, AddressError, ClientVersion, CLIENT_VERSION};
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete node configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Chain configuration, CLI overrides applied
    pub chain: ChainConfig,
    /// Base data path
    pub base_path: PathBuf,
    /// Version activations are judged against
    pub client_version: ClientVersion,
}

impl NodeConfig {
    pub fn from_chain_args(args: &ChainArgs) -> Result<Self, ConfigError> {
        let mut chain = match args.chain.as_str() {
            "regtest" | "main" | "mainnet" => ChainConfig::named(&args.chain)?,
            path => Self::load_chain_config(path)?,
        };

        for raw in &args.admins {
            let address = Address::parse(raw).map_err(|e| ConfigError::InvalidAddress(raw.clone(), e))?;
            info!("Authorizing additional sender {}", address);
            chain.activation.allowed_senders.push(address);
        }
        for raw in &args.ignored {
            let address = Address::parse(raw).map_err(|e| ConfigError::InvalidAddress(raw.clone(), e))?;
            info!("Ignoring sender {}", address);
            chain.activation.ignored_senders.push(address);
        }

        Ok(Self {
            base_path: args.get_base_path(&chain.chain_name),
            chain,
            client_version: CLIENT_VERSION,
        })
    }

    pub fn with_client_version(mut self, client_version: Option<ClientVersion>) -> Self {
        if let Some(version) = client_version {
            self.client_version = version;
        }
        self
    }

    /// Checkpoint database location
    pub fn checkpoint_path(&self) -> PathBuf {
        self.base_path.join("checkpoints")
    }

    fn load_chain_config(path: &str) -> Result<ChainConfig, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::ChainConfigNotFound(path.to_string()));
        }
        Ok(ChainConfig::from_file(path)?)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Chain config not found: {0}")]
    ChainConfigNotFound(String),

    #[error("Chain config error: {0}")]
    Chain(#[from] ChainConfigError),

    #[error("Invalid address {0}: {1}")]
    InvalidAddress(String, AddressError),
}
