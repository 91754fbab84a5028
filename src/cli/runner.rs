// Runner - Command execution logic
// Principle: Load state, act, report; the processor does the work

use crate::cli::config::NodeConfig;
use crate::contracts::activation::MessageEffect;
use crate::contracts::issuance::IssuanceError;
use crate::node::{BlockProcessor, BlockReceipt, ProcessorError, TransactionEffect};
use crate::storage::{CheckpointError, CheckpointStore};
use crate::types::{
    feature_name, format_client_version, Block, BlockNumber, FeatureId, Hash, StatusChange,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// Summary of a replay run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub resumed_from: Option<BlockNumber>,
    pub connected: usize,
    pub skipped: usize,
    pub tip: Option<BlockNumber>,
    pub digest: Hash,
}

/// Replay a JSON block file through the processor
pub fn run_replay(
    config: &NodeConfig,
    blocks_path: &Path,
    use_checkpoints: bool,
) -> Result<ReplaySummary, RunnerError> {
    info!("⛓️  Chain: {}", config.chain.chain_name);
    info!("📦 Blocks: {}", blocks_path.display());
    info!("🔖 Client version: {}", format_client_version(config.client_version));

    let content = std::fs::read_to_string(blocks_path)
        .map_err(|e| RunnerError::Io(format!("Failed to read block file: {}", e)))?;
    let blocks: Vec<Block> = serde_json::from_str(&content)
        .map_err(|e| RunnerError::BlockFile(e.to_string()))?;

    let mut processor = BlockProcessor::with_client_version(&config.chain, config.client_version)?;
    let resumed_from = if use_checkpoints {
        info!("📁 Data path: {}", config.base_path.display());
        std::fs::create_dir_all(&config.base_path)
            .map_err(|e| RunnerError::Io(format!("Failed to create data dir: {}", e)))?;
        let store = CheckpointStore::open(config.checkpoint_path())?;
        processor.attach_checkpoints(store)?
    } else {
        None
    };

    let mut connected = 0;
    let mut skipped = 0;
    for block in &blocks {
        if processor.tip().map_or(false, |tip| block.height <= tip) {
            debug!("Skipping block {}: already applied", block.height);
            skipped += 1;
            continue;
        }
        let receipt = processor.connect_block(block)?;
        report_receipt(&receipt);
        connected += 1;
    }

    if use_checkpoints {
        if let Some(tip) = processor.persist()? {
            info!("💾 Checkpoint saved at block {}", tip);
        }
    }

    let digest = processor
        .checkpoint()
        .feature_digest()
        .map_err(|e| RunnerError::State(e.to_string()))?;

    let summary = ReplaySummary {
        resumed_from,
        connected,
        skipped,
        tip: processor.tip(),
        digest,
    };

    println!("Connected blocks:     {}", summary.connected);
    if summary.skipped > 0 {
        println!("Skipped blocks:       {}", summary.skipped);
    }
    match summary.tip {
        Some(tip) => println!("Tip:                  {}", tip),
        None => println!("Tip:                  (genesis)"),
    }
    println!("Pending activations:  {}", processor.engine().pending_activations().len());
    println!("Properties:           {}", processor.properties().len());
    println!("Feature state digest: {}", summary.digest.to_hex());

    Ok(summary)
}

fn report_receipt(receipt: &BlockReceipt) {
    for promotion in &receipt.promoted {
        info!(
            "✅ Block {}: {} ({}) activated",
            receipt.height,
            promotion.record.feature_id,
            feature_name(promotion.record.feature_id)
        );
    }
    for (index, effect) in &receipt.applied {
        match effect {
            TransactionEffect::Feature(MessageEffect::Scheduled { record, .. }) => info!(
                "🗓️  Block {} tx {}: {} scheduled for block {}",
                receipt.height, index, record.feature_id, record.activation_block
            ),
            TransactionEffect::Feature(MessageEffect::ActivatedNow { record, .. }) => info!(
                "✅ Block {} tx {}: {} activated immediately",
                receipt.height, index, record.feature_id
            ),
            TransactionEffect::Feature(MessageEffect::Deactivated(record)) => info!(
                "⛔ Block {} tx {}: {} deactivated",
                receipt.height, index, record.feature_id
            ),
            TransactionEffect::PropertyCreated(id) => info!(
                "🪙 Block {} tx {}: property {} created",
                receipt.height, index, id
            ),
        }
    }
    for (index, error) in &receipt.rejected {
        warn!("⚠️  Block {} tx {} rejected: {}", receipt.height, index, error);
    }
    for feature_id in receipt.unsupported_features() {
        warn!(
            "🚨 Block {}: {} ({}) is live but this client is too old to honor it. Upgrade required.",
            receipt.height,
            feature_id,
            feature_name(feature_id)
        );
    }
}

/// Processor restored from the latest checkpoint
fn load_processor(config: &NodeConfig) -> Result<BlockProcessor, RunnerError> {
    let mut processor = BlockProcessor::with_client_version(&config.chain, config.client_version)?;
    let path = config.checkpoint_path();
    if !path.exists() {
        warn!("No chain data at {}: showing genesis state", config.base_path.display());
        return Ok(processor);
    }
    let store = CheckpointStore::open(path)?;
    if processor.attach_checkpoints(store)?.is_none() {
        warn!("No checkpoint found: showing genesis state");
    }
    Ok(processor)
}

/// Print one feature's status
pub fn show_status(
    config: &NodeConfig,
    raw_feature: u32,
    height: Option<BlockNumber>,
    format: &str,
) -> Result<(), RunnerError> {
    let feature_id = FeatureId::new(raw_feature).ok_or(RunnerError::InvalidFeature(raw_feature))?;
    let processor = load_processor(config)?;
    let engine = processor.engine();

    let at = height.or(engine.tip()).unwrap_or(0);
    let status = engine.get_status(feature_id);
    let usable = engine.is_feature_live(feature_id, at);
    let pending: Vec<BlockNumber> = engine
        .pending_for(feature_id)
        .iter()
        .map(|r| r.activation_block)
        .collect();
    let history = engine.registry().history(feature_id);

    match format {
        "json" => {
            let json = serde_json::json!({
                "featureid": feature_id.value(),
                "featurename": feature_name(feature_id),
                "active": status.active,
                "minimumversion": status.min_client_version,
                "activationblock": status.activated_at_block,
                "deactivationblock": status.deactivated_at_block,
                "usable": usable,
                "height": at,
                "pending": pending,
                "history": history,
            });
            let output = serde_json::to_string_pretty(&json)
                .map_err(|e| RunnerError::State(e.to_string()))?;
            println!("{}", output);
        }
        "text" => {
            println!("Feature:          {} ({})", feature_id, feature_name(feature_id));
            println!("Active:           {}", status.active);
            println!("Minimum version:  {}", format_client_version(status.min_client_version));
            if let Some(block) = status.activated_at_block {
                println!("Activated at:     {}", block);
            }
            if let Some(block) = status.deactivated_at_block {
                println!("Deactivated at:   {}", block);
            }
            println!("{:<18}{}", format!("Usable at {}:", at), usable);
            if !pending.is_empty() {
                println!("Pending at:       {:?}", pending);
            }
            if !history.is_empty() {
                println!("History:");
            }
            for change in history {
                match change {
                    StatusChange::Activated { at, min_client_version } => println!(
                        "  block {:<10} activated (min client {})",
                        at,
                        format_client_version(*min_client_version)
                    ),
                    StatusChange::Deactivated { at } => {
                        println!("  block {:<10} deactivated", at)
                    }
                }
            }
        }
        other => return Err(RunnerError::UnknownFormat(other.to_string())),
    }
    Ok(())
}

/// Print pending and completed activations
pub fn list_activations(config: &NodeConfig, format: &str) -> Result<(), RunnerError> {
    let processor = load_processor(config)?;
    let engine = processor.engine();
    let pending = engine.pending_activations();
    let completed = engine.completed_activations();

    match format {
        "json" => {
            let json = serde_json::json!({
                "pending": pending,
                "completed": completed,
            });
            let output = serde_json::to_string_pretty(&json)
                .map_err(|e| RunnerError::State(e.to_string()))?;
            println!("{}", output);
        }
        "text" => {
            println!("Pending activations ({}):", pending.len());
            for record in &pending {
                println!(
                    "  {} ({}) at block {}, min client {}, received in block {}",
                    record.feature_id,
                    feature_name(record.feature_id),
                    record.activation_block,
                    format_client_version(record.min_client_version),
                    record.received_at_block
                );
            }
            println!("Completed activations ({}):", completed.len());
            for activation in &completed {
                println!(
                    "  {} ({}) at block {}, min client {}",
                    activation.feature_id,
                    feature_name(activation.feature_id),
                    activation.activated_at_block,
                    format_client_version(activation.min_client_version)
                );
            }
        }
        other => return Err(RunnerError::UnknownFormat(other.to_string())),
    }
    Ok(())
}

/// Print one property as JSON
pub fn show_property(config: &NodeConfig, property_id: u32) -> Result<(), RunnerError> {
    let processor = load_processor(config)?;
    let property = processor.get_property(property_id)?;

    let json = serde_json::json!({
        "propertyid": property.property_id,
        "issuer": property.issuer.as_str(),
        "category": property.category,
        "subcategory": property.subcategory,
        "name": property.name,
        "url": property.url,
        "data": property.data,
        "divisible": property.divisible,
        "totaltokens": property.total_tokens_display(),
        "creationblock": property.creation_block,
    });
    let output = serde_json::to_string_pretty(&json)
        .map_err(|e| RunnerError::State(e.to_string()))?;
    println!("{}", output);
    Ok(())
}

/// Runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid block file: {0}")]
    BlockFile(String),

    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("{0}")]
    Property(#[from] IssuanceError),

    #[error("Invalid feature id: {0}")]
    InvalidFeature(u32),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("State error: {0}")]
    State(String),
}
