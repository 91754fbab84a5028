// Block Processor - Host loop driving the activation engine
//
// Per block:
// - Open the block in the activation engine (promotions run first)
// - Dispatch each transaction in ledger order
// - Keep the post-block state for reorgs, persist it every N blocks
//
// Rejected transactions are recorded in the receipt. Any error (a fatal
// engine fault or a failed checkpoint write) leaves the state at the previous block.

use crate::contracts::activation::{ActivationEngine, ActivationError, MessageEffect, Promotion};
use crate::contracts::issuance::{IssuanceError, Property, PropertyRegistry};
use crate::genesis::ChainConfig;
use crate::storage::{Checkpoint, CheckpointError, CheckpointStore};
use crate::types::{
    Block, BlockNumber, ClientVersion, FeatureId, Payload, PropertyId, Transaction, CLIENT_VERSION,
};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Persisted checkpoints kept after pruning
pub const MAX_STORED_CHECKPOINTS: usize = 16;

// =============================================================================
// RECEIPTS
// =============================================================================

/// Why a transaction had no effect
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    #[error("{0}")]
    Activation(#[from] ActivationError),

    #[error("{0}")]
    Issuance(#[from] IssuanceError),
}

/// Effect of one applied transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEffect {
    Feature(MessageEffect),
    PropertyCreated(PropertyId),
}

/// What happened in one connected block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReceipt {
    pub height: BlockNumber,
    pub promoted: Vec<Promotion>,
    /// Applied transactions with their index in the block
    pub applied: Vec<(usize, TransactionEffect)>,
    /// Rejected transactions with their index in the block
    pub rejected: Vec<(usize, TransactionError)>,
}

impl BlockReceipt {
    /// Properties created in this block
    pub fn created_properties(&self) -> Vec<PropertyId> {
        self.applied
            .iter()
            .filter_map(|(_, effect)| match effect {
                TransactionEffect::PropertyCreated(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Features that went live this block but need a newer client
    pub fn unsupported_features(&self) -> Vec<FeatureId> {
        let promoted = self
            .promoted
            .iter()
            .filter(|p| !p.supported)
            .map(|p| p.record.feature_id);
        let immediate = self.applied.iter().filter_map(|(_, effect)| match effect {
            TransactionEffect::Feature(MessageEffect::ActivatedNow { record, supported: false }) => {
                Some(record.feature_id)
            }
            _ => None,
        });
        promoted.chain(immediate).collect()
    }
}

// =============================================================================
// PROCESSOR
// =============================================================================

/// Block processor errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Activation engine fault: {0}")]
    Activation(#[from] ActivationError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Cannot disconnect to block {target}: tip is {tip:?}")]
    NotBelowTip { target: BlockNumber, tip: Option<BlockNumber> },

    #[error("Reorg too deep: no state kept for block {target}")]
    ReorgTooDeep { target: BlockNumber },
}

/// Sequential block processor
pub struct BlockProcessor {
    engine: ActivationEngine,
    properties: PropertyRegistry,

    /// Post-block states, oldest first
    recent: VecDeque<Checkpoint>,
    reorg_depth: usize,

    checkpoints: Option<CheckpointStore>,
    checkpoint_interval: BlockNumber,
}

impl BlockProcessor {
    /// Processor at genesis for this client
    pub fn new(config: &ChainConfig) -> Result<Self, ProcessorError> {
        Self::with_client_version(config, CLIENT_VERSION)
    }

    pub fn with_client_version(
        config: &ChainConfig,
        client_version: ClientVersion,
    ) -> Result<Self, ProcessorError> {
        Ok(Self {
            engine: config.build_engine_for(client_version)?,
            properties: PropertyRegistry::new(),
            recent: VecDeque::new(),
            reorg_depth: config.storage.reorg_depth,
            checkpoints: None,
            checkpoint_interval: config.storage.checkpoint_interval,
        })
    }

    /// Attach a checkpoint store, resuming from its latest checkpoint if any
    pub fn attach_checkpoints(&mut self, store: CheckpointStore) -> Result<Option<BlockNumber>, ProcessorError> {
        let resumed = match store.latest()? {
            Some(checkpoint) => {
                let height = checkpoint.height;
                info!("Resuming from checkpoint at block {}", height);
                self.restore(checkpoint);
                self.recent.clear();
                Some(height)
            }
            None => None,
        };
        self.checkpoints = Some(store);
        Ok(resumed)
    }

    /// Connect the next block. On error the processor is left at the previous block.
    pub fn connect_block(&mut self, block: &Block) -> Result<BlockReceipt, ProcessorError> {
        let before = self.checkpoint();
        let result = self.apply_block(block);
        if let Err(e) = &result {
            warn!("Block {} not connected, state kept at {:?}: {}", block.height, before.features.tip, e);
            self.restore(before);
        }
        result
    }

    fn apply_block(&mut self, block: &Block) -> Result<BlockReceipt, ProcessorError> {
        let height = block.height;
        let promoted = self.engine.begin_block(height)?;
        let mut receipt = BlockReceipt {
            height,
            promoted,
            ..Default::default()
        };

        for (index, tx) in block.transactions.iter().enumerate() {
            match self.apply_transaction(height, tx) {
                Ok(effect) => receipt.applied.push((index, effect)),
                Err(TransactionError::Activation(e)) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    debug!("Block {} tx {} rejected: {}", height, index, e);
                    receipt.rejected.push((index, e));
                }
            }
        }

        self.commit(height)?;
        Ok(receipt)
    }

    fn apply_transaction(
        &mut self,
        height: BlockNumber,
        tx: &Transaction,
    ) -> Result<TransactionEffect, TransactionError> {
        match tx.payload() {
            Payload::Feature(message) => {
                Ok(TransactionEffect::Feature(self.engine.process_message(&message)?))
            }
            Payload::IssuanceFixed(request) => {
                let id = self
                    .properties
                    .issue_fixed(&tx.sender, request, height, &self.engine)?;
                Ok(TransactionEffect::PropertyCreated(id))
            }
        }
    }

    /// Record post-block state for reorgs and persistence
    fn commit(&mut self, height: BlockNumber) -> Result<(), ProcessorError> {
        let persist = self.checkpoints.is_some()
            && self.checkpoint_interval > 0
            && height % self.checkpoint_interval == 0;
        if self.reorg_depth == 0 && !persist {
            return Ok(());
        }

        let checkpoint = self.checkpoint();
        if let (true, Some(store)) = (persist, &self.checkpoints) {
            store.save(&checkpoint)?;
            store.prune(MAX_STORED_CHECKPOINTS)?;
        }
        if self.reorg_depth > 0 {
            self.recent.push_back(checkpoint);
            while self.recent.len() > self.reorg_depth {
                self.recent.pop_front();
            }
        }
        Ok(())
    }

    /// Save the current state to the attached store, if any
    pub fn persist(&self) -> Result<Option<BlockNumber>, ProcessorError> {
        match (&self.checkpoints, self.engine.tip()) {
            (Some(store), Some(tip)) => {
                store.save(&self.checkpoint())?;
                Ok(Some(tip))
            }
            _ => Ok(None),
        }
    }

    /// Roll back so that `target` is the tip
    pub fn disconnect_to(&mut self, target: BlockNumber) -> Result<(), ProcessorError> {
        let tip = self.engine.tip();
        match tip {
            Some(t) if t == target => return Ok(()),
            Some(t) if t > target => {}
            _ => return Err(ProcessorError::NotBelowTip { target, tip }),
        }

        let in_memory = self.recent.iter().rposition(|c| c.height == target);
        let checkpoint = match in_memory {
            Some(pos) => self.recent[pos].clone(),
            None => {
                let stored = match &self.checkpoints {
                    Some(store) => store.load(target)?,
                    None => None,
                };
                match stored {
                    Some(c) => c,
                    None => {
                        warn!("Cannot disconnect to block {}: state not retained", target);
                        return Err(ProcessorError::ReorgTooDeep { target });
                    }
                }
            }
        };

        // Nothing in memory changes until the store agrees
        if let Some(store) = &self.checkpoints {
            store.truncate_above(target)?;
        }
        match in_memory {
            Some(pos) => self.recent.truncate(pos + 1),
            None => self.recent.clear(),
        }
        info!("Disconnected to block {} from {}", target, tip.unwrap_or(target));
        self.restore(checkpoint);
        Ok(())
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.engine.restore(checkpoint.features);
        self.properties = checkpoint.properties;
    }

    /// Current state as a checkpoint (height 0 before the first block)
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            height: self.engine.tip().unwrap_or(0),
            features: self.engine.snapshot(),
            properties: self.properties.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn engine(&self) -> &ActivationEngine {
        &self.engine
    }

    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    pub fn get_property(&self, property_id: PropertyId) -> Result<&Property, IssuanceError> {
        self.properties.get_property(property_id)
    }

    pub fn tip(&self) -> Option<BlockNumber> {
        self.engine.tip()
    }
}
