// Activation Engine - Feature activation state machine
// Principle: One writer, one block at a time, every message judged on its own
//
// Per block:
//   1. begin_block(h)     - sequencing check, then promotion of records due at h
//   2. process_message(m) - authorize, shape-validate, admit (in ledger order)
//
// Per-message failures reject only that message. Sequencing and queue
// consistency faults are fatal and returned to the host untouched.

use super::authorization::AuthorizationGate;
use super::queue::PendingActivationQueue;
use super::registry::FeatureRegistry;
use crate::types::{
    feature_name, format_client_version, ActivationMessage, ActivationRecord, Address,
    BlockNumber, ClientVersion, CompletedActivation, DeactivationMessage, DeactivationRecord,
    FeatureId, FeatureMessage, FeatureStatus, Hash, CLIENT_VERSION,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

// =============================================================================
// RULES
// =============================================================================

/// Height rules for admitting activations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRules {
    /// Minimum distance between the carrying block and the activation height
    pub min_activation_notice: BlockNumber,

    /// Maximum distance, if bounded
    pub max_activation_window: Option<BlockNumber>,

    /// Version of the client running this engine
    pub client_version: ClientVersion,
}

impl Default for ActivationRules {
    fn default() -> Self {
        Self {
            min_activation_notice: 0,
            max_activation_window: None,
            client_version: CLIENT_VERSION,
        }
    }
}

impl ActivationRules {
    /// Earliest admissible activation height for a message in block `current`
    pub fn earliest(&self, current: BlockNumber) -> BlockNumber {
        current.saturating_add(self.min_activation_notice)
    }

    /// Latest admissible activation height, if bounded
    pub fn latest(&self, current: BlockNumber) -> Option<BlockNumber> {
        self.max_activation_window
            .map(|window| current.saturating_add(window))
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Activation engine errors
///
/// The first three variants reject a single message; the rest are faults
/// the host must not swallow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("Unauthorized sender: {sender}")]
    UnauthorizedSender { sender: Address },

    #[error("Invalid feature id: {raw}")]
    InvalidFeatureId { raw: u32 },

    #[error("Invalid activation height {requested} in block {current} (earliest {earliest})")]
    InvalidActivationHeight {
        requested: BlockNumber,
        current: BlockNumber,
        earliest: BlockNumber,
        latest: Option<BlockNumber>,
    },

    #[error("Internal consistency error: {feature_id} queued for block {record_height} while processing block {block_height}")]
    InternalConsistency {
        feature_id: FeatureId,
        record_height: BlockNumber,
        block_height: BlockNumber,
    },

    #[error("Non-sequential block: expected {expected}, got {got}")]
    NonSequentialBlock { expected: BlockNumber, got: BlockNumber },

    #[error("No block in progress")]
    NoBlockInProgress,
}

impl ActivationError {
    /// Must block processing halt?
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ActivationError::InternalConsistency { .. }
                | ActivationError::NonSequentialBlock { .. }
                | ActivationError::NoBlockInProgress
        )
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// A queued activation that reached its height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub record: ActivationRecord,
    /// This client meets the record's minimum version
    pub supported: bool,
}

/// Effect of one accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEffect {
    /// Activation queued for a future height
    Scheduled {
        record: ActivationRecord,
        replaced: Option<ActivationRecord>,
    },

    /// Activation targeted the current height and was applied in place
    ActivatedNow {
        record: ActivationRecord,
        supported: bool,
    },

    /// Deactivation applied to the current height
    Deactivated(DeactivationRecord),
}

/// What happened while processing one block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOutcome {
    pub height: BlockNumber,
    pub promoted: Vec<Promotion>,
    pub accepted: Vec<MessageEffect>,
    /// Rejected messages with their index in the block
    pub rejected: Vec<(usize, ActivationError)>,
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Complete engine state at a committed height
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub tip: Option<BlockNumber>,
    pub registry: FeatureRegistry,
    pub queue: PendingActivationQueue,
}

impl RegistrySnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::EncodeFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize(bytes).map_err(|e| SnapshotError::DecodeFailed(e.to_string()))
    }

    /// Blake3 digest of the encoded snapshot
    pub fn digest(&self) -> Result<Hash, SnapshotError> {
        Ok(Hash::hash(&self.to_bytes()?))
    }
}

/// Snapshot encoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Snapshot decoding failed: {0}")]
    DecodeFailed(String),
}

// =============================================================================
// ENGINE
// =============================================================================

/// Activation state machine
///
/// Owns the registry and the pending queue. Not internally synchronized:
/// the host serializes every mutating call.
#[derive(Debug, Clone)]
pub struct ActivationEngine {
    gate: AuthorizationGate,
    rules: ActivationRules,
    registry: FeatureRegistry,
    queue: PendingActivationQueue,
    tip: Option<BlockNumber>,
}

impl ActivationEngine {
    pub fn new(gate: AuthorizationGate, rules: ActivationRules) -> Self {
        Self {
            gate,
            rules,
            registry: FeatureRegistry::new(),
            queue: PendingActivationQueue::new(),
            tip: None,
        }
    }

    /// Mark a feature live from genesis (block 0). Only valid before the first block.
    pub fn seed_genesis_feature(
        &mut self,
        feature_id: FeatureId,
        min_client_version: ClientVersion,
    ) -> Result<(), ActivationError> {
        if let Some(tip) = self.tip {
            return Err(ActivationError::NonSequentialBlock { expected: tip + 1, got: 0 });
        }
        self.registry.apply_activation(feature_id, 0, min_client_version);
        debug!("Genesis feature {} ({}) live from block 0", feature_id, feature_name(feature_id));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Block processing
    // -------------------------------------------------------------------------

    /// Process one block's feature messages in ledger order
    pub fn process_block(
        &mut self,
        height: BlockNumber,
        messages: &[FeatureMessage],
    ) -> Result<BlockOutcome, ActivationError> {
        let promoted = self.begin_block(height)?;
        let mut outcome = BlockOutcome {
            height,
            promoted,
            ..Default::default()
        };

        for (index, message) in messages.iter().enumerate() {
            match self.process_message(message) {
                Ok(effect) => outcome.accepted.push(effect),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => outcome.rejected.push((index, e)),
            }
        }

        Ok(outcome)
    }

    /// Open block `height`: check sequencing and promote due activations
    ///
    /// Must run before any feature-gated handler looks at this block.
    pub fn begin_block(&mut self, height: BlockNumber) -> Result<Vec<Promotion>, ActivationError> {
        if let Some(tip) = self.tip {
            let expected = tip.saturating_add(1);
            if height != expected {
                error!("Refusing block {}: expected {}", height, expected);
                return Err(ActivationError::NonSequentialBlock { expected, got: height });
            }
        }

        self.check_queue_consistency(height)?;

        let mut promoted = Vec::new();
        for record in self.queue.take_due(height) {
            self.registry
                .apply_activation(record.feature_id, height, record.min_client_version);
            let supported = self.report_activation(&record, height);
            promoted.push(Promotion { record, supported });
        }

        self.tip = Some(height);
        Ok(promoted)
    }

    /// Validate and admit one message into the block in progress
    pub fn process_message(&mut self, message: &FeatureMessage) -> Result<MessageEffect, ActivationError> {
        let height = self.tip.ok_or(ActivationError::NoBlockInProgress)?;

        let result = self.admit(height, message);
        if let Err(e) = &result {
            info!(
                "Rejected {} from {} in block {}: {}",
                message.kind(),
                message.sender(),
                height,
                e
            );
        }
        result
    }

    fn admit(&mut self, height: BlockNumber, message: &FeatureMessage) -> Result<MessageEffect, ActivationError> {
        if !self.gate.is_authorized(message.sender()) {
            return Err(ActivationError::UnauthorizedSender {
                sender: message.sender().clone(),
            });
        }

        match message {
            FeatureMessage::Activation(m) => self.admit_activation(height, m),
            FeatureMessage::Deactivation(m) => self.admit_deactivation(height, m),
        }
    }

    fn admit_activation(
        &mut self,
        height: BlockNumber,
        message: &ActivationMessage,
    ) -> Result<MessageEffect, ActivationError> {
        let feature_id = FeatureId::new(message.feature_id)
            .ok_or(ActivationError::InvalidFeatureId { raw: message.feature_id })?;

        let earliest = self.rules.earliest(height);
        let latest = self.rules.latest(height);
        let requested = message.activation_block;
        if requested < earliest || latest.map_or(false, |l| requested > l) {
            return Err(ActivationError::InvalidActivationHeight {
                requested,
                current: height,
                earliest,
                latest,
            });
        }

        let record = ActivationRecord {
            feature_id,
            activation_block: requested,
            min_client_version: message.min_client_version,
            sender: message.sender.clone(),
            received_at_block: height,
        };

        // Only reachable with a zero notice window
        if requested == height {
            self.registry
                .apply_activation(feature_id, height, record.min_client_version);
            let supported = self.report_activation(&record, height);
            return Ok(MessageEffect::ActivatedNow { record, supported });
        }

        info!(
            "Scheduled {} ({}) for block {} (min client {})",
            feature_id,
            feature_name(feature_id),
            requested,
            format_client_version(record.min_client_version)
        );
        let replaced = self.queue.insert(record.clone());
        if let Some(old) = &replaced {
            debug!(
                "Replaced pending activation of {} received in block {}",
                old.feature_id, old.received_at_block
            );
        }
        Ok(MessageEffect::Scheduled { record, replaced })
    }

    fn admit_deactivation(
        &mut self,
        height: BlockNumber,
        message: &DeactivationMessage,
    ) -> Result<MessageEffect, ActivationError> {
        let feature_id = FeatureId::new(message.feature_id)
            .ok_or(ActivationError::InvalidFeatureId { raw: message.feature_id })?;

        self.registry.apply_deactivation(feature_id, height);
        info!(
            "Deactivated {} ({}) at block {}",
            feature_id,
            feature_name(feature_id),
            height
        );

        Ok(MessageEffect::Deactivated(DeactivationRecord {
            feature_id,
            sender: message.sender.clone(),
            received_at_block: height,
        }))
    }

    /// Every queued record must target `height` or later, and records
    /// filed under `height` must carry it
    fn check_queue_consistency(&self, height: BlockNumber) -> Result<(), ActivationError> {
        let stale = self
            .queue
            .earliest_height()
            .filter(|earliest| *earliest < height)
            .and_then(|earliest| self.queue.due_at(earliest).next());
        let misfiled = self
            .queue
            .due_at(height)
            .find(|r| r.activation_block != height);

        if let Some(record) = stale.or(misfiled) {
            error!(
                "Queue inconsistency: {} queued for block {} at block {}",
                record.feature_id, record.activation_block, height
            );
            return Err(ActivationError::InternalConsistency {
                feature_id: record.feature_id,
                record_height: record.activation_block,
                block_height: height,
            });
        }
        Ok(())
    }

    /// Log an applied activation; returns whether this client supports it
    fn report_activation(&self, record: &ActivationRecord, height: BlockNumber) -> bool {
        let supported = self.rules.client_version >= record.min_client_version;
        if supported {
            info!(
                "Feature {} ({}) live at block {}",
                record.feature_id,
                feature_name(record.feature_id),
                height
            );
        } else {
            warn!(
                "Feature {} ({}) live at block {} requires client {} (running {}): please upgrade",
                record.feature_id,
                feature_name(record.feature_id),
                height,
                format_client_version(record.min_client_version),
                format_client_version(self.rules.client_version)
            );
        }
        supported
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn get_status(&self, feature_id: FeatureId) -> FeatureStatus {
        self.registry.get_status(feature_id)
    }

    pub fn is_usable(
        &self,
        feature_id: FeatureId,
        at_block: BlockNumber,
        client_version: ClientVersion,
    ) -> bool {
        self.registry.is_usable(feature_id, at_block, client_version)
    }

    /// Is the feature usable at `at_block` by this client?
    pub fn is_feature_live(&self, feature_id: FeatureId, at_block: BlockNumber) -> bool {
        self.is_usable(feature_id, at_block, self.rules.client_version)
    }

    pub fn pending_activations(&self) -> Vec<ActivationRecord> {
        self.queue.iter().cloned().collect()
    }

    /// Queued activations of one feature, in height order
    pub fn pending_for(&self, feature_id: FeatureId) -> Vec<ActivationRecord> {
        self.queue.pending_for(feature_id).into_iter().cloned().collect()
    }

    pub fn completed_activations(&self) -> Vec<CompletedActivation> {
        self.registry.completed_activations()
    }

    /// Last processed block
    pub fn tip(&self) -> Option<BlockNumber> {
        self.tip
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    // -------------------------------------------------------------------------
    // Reorg support
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            tip: self.tip,
            registry: self.registry.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Replace all state with `snapshot`; gate and rules are kept
    pub fn restore(&mut self, snapshot: RegistrySnapshot) {
        debug!("Restoring activation state to tip {:?}", snapshot.tip);
        self.tip = snapshot.tip;
        self.registry = snapshot.registry;
        self.queue = snapshot.queue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn admin() -> Address {
        addr("moSfCMqU8rjB99n7Rm5pBgRvRGevyKVJzY")
    }

    fn stranger() -> Address {
        addr("mxwV8Kc2rLCrWkcxtTgKUTXJvrm7AWkqVT")
    }

    fn f(id: u32) -> FeatureId {
        FeatureId::new(id).unwrap()
    }

    fn engine() -> ActivationEngine {
        ActivationEngine::new(AuthorizationGate::new(admin()), ActivationRules::default())
    }

    /// Process empty blocks up to and including `to`
    fn advance(engine: &mut ActivationEngine, to: BlockNumber) {
        let from = engine.tip().map_or(0, |t| t + 1);
        for h in from..=to {
            engine.process_block(h, &[]).unwrap();
        }
    }

    #[test]
    fn test_activation_is_deferred() {
        let mut engine = engine();
        advance(&mut engine, 201);

        let outcome = engine
            .process_block(202, &[FeatureMessage::activation(admin(), 1, 400, 1)])
            .unwrap();
        assert!(matches!(outcome.accepted[0], MessageEffect::Scheduled { replaced: None, .. }));
        assert_eq!(engine.pending_activations().len(), 1);

        advance(&mut engine, 399);
        assert!(!engine.is_usable(f(1), 399, 1));
        assert!(!engine.get_status(f(1)).active);

        let outcome = engine.process_block(400, &[]).unwrap();
        assert_eq!(outcome.promoted.len(), 1);
        assert!(outcome.promoted[0].supported);
        assert!(engine.is_usable(f(1), 400, 1));
        assert!(engine.pending_activations().is_empty());
        assert_eq!(engine.get_status(f(1)).activated_at_block, Some(400));
    }

    #[test]
    fn test_unauthorized_sender_rejected() {
        let mut engine = engine();
        let outcome = engine
            .process_block(10, &[FeatureMessage::activation(stranger(), 1, 20, 0)])
            .unwrap();

        assert!(outcome.accepted.is_empty());
        assert_eq!(
            outcome.rejected,
            vec![(0, ActivationError::UnauthorizedSender { sender: stranger() })]
        );
        assert!(engine.pending_activations().is_empty());
    }

    #[test]
    fn test_rejection_is_local_to_message() {
        let mut engine = engine();
        let messages = vec![
            FeatureMessage::deactivation(stranger(), 1),
            FeatureMessage::activation(admin(), 0, 20, 0),
            FeatureMessage::activation(admin(), 2, 20, 0),
        ];

        let outcome = engine.process_block(10, &messages).unwrap();
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[1], (1, ActivationError::InvalidFeatureId { raw: 0 }));
        assert_eq!(engine.pending_activations()[0].feature_id, f(2));
    }

    #[test]
    fn test_past_activation_height_rejected() {
        let mut engine = engine();
        let outcome = engine
            .process_block(50, &[FeatureMessage::activation(admin(), 1, 49, 0)])
            .unwrap();

        assert!(matches!(
            outcome.rejected[0].1,
            ActivationError::InvalidActivationHeight { requested: 49, current: 50, .. }
        ));
    }

    #[test]
    fn test_same_height_activation_applies_immediately() {
        let mut engine = engine();
        let outcome = engine
            .process_block(50, &[FeatureMessage::activation(admin(), 1, 50, 0)])
            .unwrap();

        assert!(matches!(outcome.accepted[0], MessageEffect::ActivatedNow { supported: true, .. }));
        assert!(engine.is_feature_live(f(1), 50));
        assert!(engine.pending_activations().is_empty());
    }

    #[test]
    fn test_notice_window() {
        let rules = ActivationRules {
            min_activation_notice: 10,
            max_activation_window: Some(100),
            client_version: CLIENT_VERSION,
        };
        let mut engine = ActivationEngine::new(AuthorizationGate::new(admin()), rules);
        let messages = vec![
            FeatureMessage::activation(admin(), 1, 59, 0),
            FeatureMessage::activation(admin(), 1, 60, 0),
            FeatureMessage::activation(admin(), 2, 150, 0),
            FeatureMessage::activation(admin(), 2, 151, 0),
        ];

        let outcome = engine.process_block(50, &messages).unwrap();
        let rejected: Vec<usize> = outcome.rejected.iter().map(|(i, _)| *i).collect();
        assert_eq!(rejected, vec![0, 3]);
        assert_eq!(engine.pending_activations().len(), 2);
    }

    #[test]
    fn test_deactivation_does_not_clear_queue() {
        let mut engine = engine();
        engine
            .process_block(10, &[FeatureMessage::activation(admin(), 1, 20, 0)])
            .unwrap();
        engine
            .process_block(11, &[FeatureMessage::deactivation(admin(), 1)])
            .unwrap();

        assert!(!engine.is_feature_live(f(1), 11));
        assert_eq!(engine.pending_activations().len(), 1);

        advance(&mut engine, 20);
        assert!(engine.is_feature_live(f(1), 20));
        assert!(!engine.is_feature_live(f(1), 19));
    }

    #[test]
    fn test_promotion_order_by_feature_id() {
        let mut engine = engine();
        let messages = vec![
            FeatureMessage::activation(admin(), 9, 12, 0),
            FeatureMessage::activation(admin(), 3, 12, 0),
            FeatureMessage::activation(admin(), 5, 12, 0),
        ];
        engine.process_block(10, &messages).unwrap();
        engine.process_block(11, &[]).unwrap();

        let outcome = engine.process_block(12, &[]).unwrap();
        let order: Vec<u16> = outcome.promoted.iter().map(|p| p.record.feature_id.value()).collect();
        assert_eq!(order, vec![3, 5, 9]);
    }

    #[test]
    fn test_unsupported_feature_still_activates() {
        let mut engine = engine();
        engine
            .process_block(10, &[FeatureMessage::activation(admin(), 4, 11, CLIENT_VERSION + 1)])
            .unwrap();

        let outcome = engine.process_block(11, &[]).unwrap();
        assert_eq!(outcome.promoted.len(), 1);
        assert!(!outcome.promoted[0].supported);
        assert!(engine.get_status(f(4)).active);
        assert!(!engine.is_feature_live(f(4), 11));
        assert!(engine.is_usable(f(4), 11, CLIENT_VERSION + 1));
    }

    #[test]
    fn test_non_sequential_block_is_fatal() {
        let mut engine = engine();
        engine.process_block(10, &[]).unwrap();

        let err = engine.process_block(12, &[]).unwrap_err();
        assert_eq!(err, ActivationError::NonSequentialBlock { expected: 11, got: 12 });
        assert!(err.is_fatal());
        assert_eq!(engine.tip(), Some(10));
    }

    #[test]
    fn test_message_without_block_is_fatal() {
        let mut engine = engine();
        let err = engine
            .process_message(&FeatureMessage::deactivation(admin(), 1))
            .unwrap_err();
        assert_eq!(err, ActivationError::NoBlockInProgress);
    }

    #[test]
    fn test_stale_queue_entry_is_fatal() {
        let mut engine = engine();
        engine
            .process_block(10, &[FeatureMessage::activation(admin(), 1, 12, 0)])
            .unwrap();

        // Simulate a host restoring a snapshot whose tip skips the record's height
        let mut snapshot = engine.snapshot();
        snapshot.tip = Some(12);
        engine.restore(snapshot);

        let before = engine.snapshot();
        let err = engine.process_block(13, &[]).unwrap_err();
        assert!(matches!(
            err,
            ActivationError::InternalConsistency { record_height: 12, block_height: 13, .. }
        ));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut engine = engine();
        engine
            .process_block(10, &[FeatureMessage::activation(admin(), 1, 15, 0)])
            .unwrap();
        let snapshot = engine.snapshot();

        advance(&mut engine, 15);
        engine.process_block(16, &[FeatureMessage::deactivation(admin(), 1)]).unwrap();
        assert_ne!(engine.snapshot(), snapshot);

        engine.restore(snapshot.clone());
        assert_eq!(engine.tip(), Some(10));
        assert_eq!(engine.pending_activations().len(), 1);
        assert_eq!(engine.get_status(f(1)), FeatureStatus::never_activated());
        assert_eq!(engine.snapshot(), snapshot);
    }

    #[test]
    fn test_snapshot_bytes_roundtrip() {
        let mut engine = engine();
        engine.seed_genesis_feature(f(1), 0).unwrap();
        engine
            .process_block(10, &[FeatureMessage::activation(admin(), 2, 15, 3)])
            .unwrap();

        let snapshot = engine.snapshot();
        let decoded = RegistrySnapshot::from_bytes(&snapshot.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.digest().unwrap(), snapshot.digest().unwrap());
    }

    #[test]
    fn test_genesis_seed_only_before_first_block() {
        let mut engine = engine();
        engine.seed_genesis_feature(f(1), 0).unwrap();
        assert!(engine.is_feature_live(f(1), 0));

        engine.process_block(1, &[]).unwrap();
        assert!(engine.seed_genesis_feature(f(2), 0).is_err());
    }
}
