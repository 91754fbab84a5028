// Storage - Persistence layer (RocksDB checkpoints)
// Principle: Restart and reorg from a known-good height

pub mod db;
pub mod checkpoint;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use db::{Database, DatabaseError, WriteOp};
