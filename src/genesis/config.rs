// Chain configuration - Activation parameters per network
use crate::contracts::activation::{ActivationEngine, ActivationError, ActivationRules};
use crate::contracts::authorization::AuthorizationGate;
use crate::types::{Address, BlockNumber, ClientVersion, FeatureId, CLIENT_VERSION};
use serde::{Deserialize, Serialize};

/// Regtest admin sender
pub const REGTEST_ADMIN: &str = "moSfCMqU8rjB99n7Rm5pBgRvRGevyKVJzY";

/// Mainnet admin sender
pub const MAINNET_ADMIN: &str = "3Bt8ov2BnrG8kjN6XZxsb1nnqFZqp9Tv4D";

/// Mainnet: activations need two weeks of notice
pub const MAINNET_MIN_ACTIVATION_NOTICE: BlockNumber = 2_048;

/// Mainnet: activations may not be scheduled more than twelve weeks out
pub const MAINNET_MAX_ACTIVATION_WINDOW: BlockNumber = 12_288;

/// Chain configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain name
    pub chain_name: String,

    /// Activation message handling
    pub activation: ActivationConfig,

    /// Features live from block 0
    #[serde(default)]
    pub genesis_features: Vec<GenesisFeature>,

    /// Host-side state retention
    pub storage: StorageConfig,
}

/// Activation message handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Senders allowed to (de)activate features
    pub allowed_senders: Vec<Address>,

    /// Senders never honored, even if allowed
    #[serde(default)]
    pub ignored_senders: Vec<Address>,

    /// Minimum blocks between a message and its activation height
    #[serde(default)]
    pub min_activation_notice: BlockNumber,

    /// Maximum blocks between a message and its activation height
    #[serde(default)]
    pub max_activation_window: Option<BlockNumber>,
}

/// Feature live from genesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisFeature {
    pub feature_id: FeatureId,
    #[serde(default)]
    pub min_client_version: ClientVersion,
}

/// Host-side state retention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// In-memory snapshots kept for reorgs
    pub reorg_depth: usize,

    /// Blocks between persisted checkpoints (0 disables)
    pub checkpoint_interval: BlockNumber,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reorg_depth: 100,
            checkpoint_interval: 1_000,
        }
    }
}

impl ChainConfig {
    /// Regression-test network: no notice, no window, issuance live from genesis
    pub fn regtest() -> Result<Self, ChainConfigError> {
        Ok(Self {
            chain_name: "regtest".to_string(),
            activation: ActivationConfig {
                allowed_senders: vec![Address::parse(REGTEST_ADMIN)?],
                ignored_senders: vec![],
                min_activation_notice: 0,
                max_activation_window: None,
            },
            genesis_features: vec![GenesisFeature {
                feature_id: crate::types::FEATURE_FIXED_ISSUANCE,
                min_client_version: 0,
            }],
            storage: StorageConfig {
                reorg_depth: 100,
                checkpoint_interval: 100,
            },
        })
    }

    /// Main network
    pub fn mainnet() -> Result<Self, ChainConfigError> {
        Ok(Self {
            chain_name: "main".to_string(),
            activation: ActivationConfig {
                allowed_senders: vec![Address::parse(MAINNET_ADMIN)?],
                ignored_senders: vec![],
                min_activation_notice: MAINNET_MIN_ACTIVATION_NOTICE,
                max_activation_window: Some(MAINNET_MAX_ACTIVATION_WINDOW),
            },
            genesis_features: vec![GenesisFeature {
                feature_id: crate::types::FEATURE_FIXED_ISSUANCE,
                min_client_version: 0,
            }],
            storage: StorageConfig::default(),
        })
    }

    /// Preset by name
    pub fn named(name: &str) -> Result<Self, ChainConfigError> {
        match name {
            "regtest" => Self::regtest(),
            "main" | "mainnet" => Self::mainnet(),
            other => Err(ChainConfigError::UnknownChain(other.to_string())),
        }
    }

    /// Load from a JSON file
    pub fn from_file(path: &str) -> Result<Self, ChainConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChainConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ChainConfigError::Parse(e.to_string()))
    }

    /// Save to a JSON file
    pub fn to_file(&self, path: &str) -> Result<(), ChainConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ChainConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ChainConfigError::Io(e.to_string()))
    }

    /// Activation rules for a client running `client_version`
    pub fn rules(&self, client_version: ClientVersion) -> ActivationRules {
        ActivationRules {
            min_activation_notice: self.activation.min_activation_notice,
            max_activation_window: self.activation.max_activation_window,
            client_version,
        }
    }

    pub fn gate(&self) -> AuthorizationGate {
        AuthorizationGate::from_lists(
            self.activation.allowed_senders.iter().cloned(),
            self.activation.ignored_senders.iter().cloned(),
        )
    }

    /// Fresh engine at genesis, genesis features seeded
    pub fn build_engine(&self) -> Result<ActivationEngine, ActivationError> {
        self.build_engine_for(CLIENT_VERSION)
    }

    pub fn build_engine_for(&self, client_version: ClientVersion) -> Result<ActivationEngine, ActivationError> {
        let mut engine = ActivationEngine::new(self.gate(), self.rules(client_version));
        for feature in &self.genesis_features {
            engine.seed_genesis_feature(feature.feature_id, feature.min_client_version)?;
        }
        Ok(engine)
    }
}

/// Chain configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ChainConfigError {
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Invalid address in chain config: {0}")]
    InvalidAddress(#[from] crate::types::AddressError),

    #[error("Failed to read chain config: {0}")]
    Io(String),

    #[error("Failed to parse chain config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FEATURE_FIXED_ISSUANCE;
    use tempfile::TempDir;

    #[test]
    fn test_regtest_config() {
        let config = ChainConfig::regtest().unwrap();
        assert_eq!(config.chain_name, "regtest");
        assert_eq!(config.activation.min_activation_notice, 0);
        assert!(config.activation.max_activation_window.is_none());

        let admin = Address::parse(REGTEST_ADMIN).unwrap();
        assert!(config.gate().is_authorized(&admin));
    }

    #[test]
    fn test_mainnet_config() {
        let config = ChainConfig::mainnet().unwrap();
        let rules = config.rules(CLIENT_VERSION);
        assert_eq!(rules.earliest(100), 100 + MAINNET_MIN_ACTIVATION_NOTICE);
        assert_eq!(rules.latest(100), Some(100 + MAINNET_MAX_ACTIVATION_WINDOW));
    }

    #[test]
    fn test_named_presets() {
        assert!(ChainConfig::named("regtest").is_ok());
        assert!(ChainConfig::named("mainnet").is_ok());
        assert!(matches!(
            ChainConfig::named("nope"),
            Err(ChainConfigError::UnknownChain(_))
        ));
    }

    #[test]
    fn test_engine_seeds_genesis_features() {
        let engine = ChainConfig::regtest().unwrap().build_engine().unwrap();
        assert!(engine.is_feature_live(FEATURE_FIXED_ISSUANCE, 0));
        assert_eq!(engine.tip(), None);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.json");
        let path = path.to_str().unwrap();

        let mut config = ChainConfig::regtest().unwrap();
        config.activation.ignored_senders = vec![Address::parse(REGTEST_ADMIN).unwrap()];
        config.to_file(path).unwrap();

        let loaded = ChainConfig::from_file(path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.gate().is_authorized(&Address::parse(REGTEST_ADMIN).unwrap()));
    }
}
