// Node - Sequential block processing for the meta-protocol
pub mod processor;

pub use processor::{
    BlockProcessor, BlockReceipt, ProcessorError, TransactionEffect, TransactionError,
};
