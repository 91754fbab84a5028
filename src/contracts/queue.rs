// Pending Activation Queue - Accepted activations waiting for their height
// Layout: activation_block -> { feature_id -> record }, the persisted form as-is

use crate::types::{ActivationRecord, BlockNumber, FeatureId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Queue of admitted, not yet promoted activations
///
/// Keyed by `(activation_block, feature_id)`. Admitting a second record with
/// the same key replaces the first; records for one feature at different
/// heights coexist and are promoted independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingActivationQueue {
    by_height: BTreeMap<BlockNumber, BTreeMap<FeatureId, ActivationRecord>>,
}

impl PendingActivationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the record it replaced (same height and feature)
    pub fn insert(&mut self, record: ActivationRecord) -> Option<ActivationRecord> {
        self.by_height
            .entry(record.activation_block)
            .or_default()
            .insert(record.feature_id, record)
    }

    /// Lowest queued activation height
    pub fn earliest_height(&self) -> Option<BlockNumber> {
        self.by_height.keys().next().copied()
    }

    /// Records filed under `height`, ascending by feature id
    pub fn due_at(&self, height: BlockNumber) -> impl Iterator<Item = &ActivationRecord> {
        self.by_height.get(&height).into_iter().flat_map(|due| due.values())
    }

    /// Remove and return every record due at `height`, ascending by feature id
    pub fn take_due(&mut self, height: BlockNumber) -> Vec<ActivationRecord> {
        self.by_height
            .remove(&height)
            .map(|due| due.into_values().collect())
            .unwrap_or_default()
    }

    /// All queued records in promotion order (height, then feature id)
    pub fn iter(&self) -> impl Iterator<Item = &ActivationRecord> {
        self.by_height.values().flat_map(|due| due.values())
    }

    /// Queued records for one feature, in height order
    pub fn pending_for(&self, feature_id: FeatureId) -> Vec<&ActivationRecord> {
        self.by_height
            .values()
            .filter_map(|due| due.get(&feature_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_height.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_height.is_empty()
    }
}
