// Block - Decoded meta-protocol payloads of one ledger block
// The raw ledger transactions are parsed upstream; only typed calls reach the node.
use super::address::Address;
use super::message::FeatureMessage;
use super::primitives::{BlockNumber, ClientVersion, PropertyId};
use serde::{Deserialize, Serialize};

/// One ledger block, reduced to its meta-protocol transactions in ledger order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: BlockNumber,

    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Block with no meta-protocol transactions
    pub fn empty(height: BlockNumber) -> Self {
        Self {
            height,
            transactions: Vec::new(),
        }
    }

    pub fn new(height: BlockNumber, transactions: Vec<Transaction>) -> Self {
        Self { height, transactions }
    }
}

/// Meta-protocol transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender as authenticated by the ledger
    pub sender: Address,

    /// Decoded call
    pub call: TransactionCall,
}

impl Transaction {
    pub fn new(sender: Address, call: TransactionCall) -> Self {
        Self { sender, call }
    }

    /// Decoded payload, feature messages carrying the transaction sender
    pub fn payload(&self) -> Payload<'_> {
        match &self.call {
            TransactionCall::Activation {
                feature_id,
                activation_block,
                min_client_version,
            } => Payload::Feature(FeatureMessage::activation(
                self.sender.clone(),
                *feature_id,
                *activation_block,
                *min_client_version,
            )),
            TransactionCall::Deactivation { feature_id } => {
                Payload::Feature(FeatureMessage::deactivation(self.sender.clone(), *feature_id))
            }
            TransactionCall::IssuanceFixed(request) => Payload::IssuanceFixed(request),
        }
    }

    /// Feature message carried by this transaction, if any
    pub fn feature_message(&self) -> Option<FeatureMessage> {
        match self.payload() {
            Payload::Feature(message) => Some(message),
            Payload::IssuanceFixed(_) => None,
        }
    }
}

/// Transaction payload as routed by the block processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    Feature(FeatureMessage),
    IssuanceFixed(&'a FixedIssuance),
}

/// Meta-protocol calls understood by this node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionCall {
    /// Schedule a feature activation
    Activation {
        feature_id: u32,
        activation_block: BlockNumber,
        min_client_version: ClientVersion,
    },

    /// Deactivate a feature now
    Deactivation { feature_id: u32 },

    /// Create a fixed-supply property
    IssuanceFixed(FixedIssuance),
}

/// Parameters of a fixed-supply property issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIssuance {
    /// 1 = main ecosystem, 2 = test ecosystem
    pub ecosystem: u8,
    /// 1 = indivisible, 2 = divisible
    pub property_type: u16,
    /// Must be 0 for a new property
    #[serde(default)]
    pub previous_property_id: PropertyId,
    pub category: String,
    pub subcategory: String,
    pub name: String,
    pub url: String,
    pub data: String,
    /// Decimal amount string, e.g. "3000" or "0.5"
    pub amount: String,
}
