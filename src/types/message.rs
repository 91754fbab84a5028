// Message - Decoded feature activation/deactivation messages
// Principle: Two explicit variants, consumed by a pure function
use super::address::Address;
use super::primitives::{BlockNumber, ClientVersion, FeatureId};
use serde::{Deserialize, Serialize};

/// Admin request to turn a feature on at a future height
///
/// Fields are raw as decoded from the ledger; the engine validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationMessage {
    pub sender: Address,
    pub feature_id: u32,
    pub activation_block: BlockNumber,
    pub min_client_version: ClientVersion,
}

/// Admin request to turn a feature off immediately
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivationMessage {
    pub sender: Address,
    pub feature_id: u32,
}

/// Feature message as produced by the transaction-parsing layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureMessage {
    Activation(ActivationMessage),
    Deactivation(DeactivationMessage),
}

impl FeatureMessage {
    /// Convenience constructor for an activation
    pub fn activation(
        sender: Address,
        feature_id: u32,
        activation_block: BlockNumber,
        min_client_version: ClientVersion,
    ) -> Self {
        FeatureMessage::Activation(ActivationMessage {
            sender,
            feature_id,
            activation_block,
            min_client_version,
        })
    }

    /// Convenience constructor for a deactivation
    pub fn deactivation(sender: Address, feature_id: u32) -> Self {
        FeatureMessage::Deactivation(DeactivationMessage { sender, feature_id })
    }

    pub fn sender(&self) -> &Address {
        match self {
            FeatureMessage::Activation(m) => &m.sender,
            FeatureMessage::Deactivation(m) => &m.sender,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeatureMessage::Activation(_) => "activation",
            FeatureMessage::Deactivation(_) => "deactivation",
        }
    }
}

/// Accepted activation waiting for its height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub feature_id: FeatureId,
    pub activation_block: BlockNumber,
    pub min_client_version: ClientVersion,
    pub sender: Address,
    /// Height of the block that carried the message
    pub received_at_block: BlockNumber,
}

/// Accepted deactivation. Never queued, applied in the block that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivationRecord {
    pub feature_id: FeatureId,
    pub sender: Address,
    pub received_at_block: BlockNumber,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        Address::parse("moSfCMqU8rjB99n7Rm5pBgRvRGevyKVJzY").unwrap()
    }

    #[test]
    fn test_message_accessors() {
        let activation = FeatureMessage::activation(admin(), 1, 400, 1);
        assert_eq!(activation.sender(), &admin());
        assert_eq!(activation.kind(), "activation");

        let deactivation = FeatureMessage::deactivation(admin(), 7);
        assert_eq!(deactivation.sender(), &admin());
        assert_eq!(deactivation.kind(), "deactivation");
    }
}
