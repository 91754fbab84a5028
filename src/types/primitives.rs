// Primitives - Minimal base types shared by every layer
use serde::{Deserialize, Serialize};
use std::fmt;

/// Universal hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Hash data with Blake3
    pub fn hash(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Hash(*hash.as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Ledger block height
pub type BlockNumber = u64;

/// Client/protocol version, encoded as major * 1_000_000 + minor * 1_000 + patch
pub type ClientVersion = u32;

/// Version of this client
pub const CLIENT_VERSION: ClientVersion = 1_000_000;

/// Property (token) identifier
pub type PropertyId = u32;

/// Identifier of one gated protocol feature
///
/// Ids are assigned out-of-band. Zero is never a valid feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(u16);

impl FeatureId {
    /// Build a feature id from a raw decoded value, rejecting zero and out-of-range values
    pub fn new(raw: u32) -> Option<Self> {
        match u16::try_from(raw) {
            Ok(0) | Err(_) => None,
            Ok(id) => Some(FeatureId(id)),
        }
    }

    /// Compile-time constructor for well-known ids
    pub const fn from_u16(id: u16) -> Self {
        assert!(id != 0, "feature id must be non-zero");
        FeatureId(id)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "feature:{}", self.0)
    }
}

/// Render a packed client version as `major.minor.patch`
pub fn format_client_version(version: ClientVersion) -> String {
    format!(
        "{}.{}.{}",
        version / 1_000_000,
        (version / 1_000) % 1_000,
        version % 1_000
    )
}
