// Checkpoints - Persisted processor state at committed heights
use super::db::{Database, DatabaseError, WriteOp};
use crate::contracts::activation::{RegistrySnapshot, SnapshotError};
use crate::contracts::issuance::PropertyRegistry;
use crate::types::{BlockNumber, Hash};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Storage key prefixes
const PREFIX_CHECKPOINT: &[u8] = b"checkpoint:";
const KEY_LATEST_CHECKPOINT: &[u8] = b"latest_checkpoint";

/// Full processor state after block `height`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub height: BlockNumber,
    pub features: RegistrySnapshot,
    pub properties: PropertyRegistry,
}

impl Checkpoint {
    /// Digest of the feature state alone
    pub fn feature_digest(&self) -> Result<Hash, SnapshotError> {
        self.features.digest()
    }
}

fn checkpoint_key(height: BlockNumber) -> Vec<u8> {
    let mut key = PREFIX_CHECKPOINT.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}

/// Checkpoint store backed by RocksDB
pub struct CheckpointStore {
    db: Database,
}

impl CheckpointStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Persist a checkpoint and move the latest pointer to it
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let value = bincode::serialize(checkpoint)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))?;
        let height = bincode::serialize(&checkpoint.height)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))?;

        self.db.batch_write(vec![
            WriteOp::Put {
                key: checkpoint_key(checkpoint.height),
                value,
            },
            WriteOp::Put {
                key: KEY_LATEST_CHECKPOINT.to_vec(),
                value: height,
            },
        ])?;
        debug!("Checkpoint saved at block {}", checkpoint.height);
        Ok(())
    }

    pub fn load(&self, height: BlockNumber) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.db.get(&checkpoint_key(height))? {
            Some(data) => {
                let checkpoint: Checkpoint = bincode::deserialize(&data)
                    .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
                Ok(Some(checkpoint))
            }
            None => Ok(None),
        }
    }

    pub fn latest_height(&self) -> Result<Option<BlockNumber>, CheckpointError> {
        match self.db.get(KEY_LATEST_CHECKPOINT)? {
            Some(data) => {
                let height: BlockNumber = bincode::deserialize(&data)
                    .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
                Ok(Some(height))
            }
            None => Ok(None),
        }
    }

    pub fn latest(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.latest_height()? {
            Some(height) => self.load(height),
            None => Ok(None),
        }
    }

    /// Heights of all stored checkpoints, ascending
    pub fn heights(&self) -> Result<Vec<BlockNumber>, CheckpointError> {
        self.db
            .prefix_keys(PREFIX_CHECKPOINT)?
            .iter()
            .map(|key| {
                let raw: [u8; 8] = key[PREFIX_CHECKPOINT.len()..]
                    .try_into()
                    .map_err(|_| CheckpointError::CorruptKey(hex::encode(key)))?;
                Ok(BlockNumber::from_be_bytes(raw))
            })
            .collect()
    }

    /// Delete every checkpoint above `height`; the latest pointer follows
    pub fn truncate_above(&self, height: BlockNumber) -> Result<usize, CheckpointError> {
        let heights = self.heights()?;
        let (keep, drop): (Vec<BlockNumber>, Vec<BlockNumber>) =
            heights.into_iter().partition(|h| *h <= height);
        if drop.is_empty() {
            return Ok(0);
        }

        let mut ops: Vec<WriteOp> = drop
            .iter()
            .map(|h| WriteOp::Delete { key: checkpoint_key(*h) })
            .collect();
        match keep.last() {
            Some(h) => ops.push(WriteOp::Put {
                key: KEY_LATEST_CHECKPOINT.to_vec(),
                value: bincode::serialize(h)
                    .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))?,
            }),
            None => ops.push(WriteOp::Delete {
                key: KEY_LATEST_CHECKPOINT.to_vec(),
            }),
        }

        self.db.batch_write(ops)?;
        Ok(drop.len())
    }

    /// Keep only the newest `keep` checkpoints
    pub fn prune(&self, keep: usize) -> Result<usize, CheckpointError> {
        let heights = self.heights()?;
        if heights.len() <= keep {
            return Ok(0);
        }
        let excess = heights.len() - keep;
        let ops = heights[..excess]
            .iter()
            .map(|h| WriteOp::Delete { key: checkpoint_key(*h) })
            .collect();
        self.db.batch_write(ops)?;
        debug!("Pruned {} checkpoints", excess);
        Ok(excess)
    }
}

/// Checkpoint errors
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Corrupt checkpoint key: {0}")]
    CorruptKey(String),
}
