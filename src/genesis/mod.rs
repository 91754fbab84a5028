// Genesis - Chain configuration and genesis feature set
pub mod config;

pub use config::{ChainConfig, ChainConfigError, GenesisFeature, StorageConfig};
