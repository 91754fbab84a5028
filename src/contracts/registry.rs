// Feature Registry - Authoritative, height-indexed record of feature status
// Principle: Answers for past heights never change once given
//
// The registry keeps two views per feature:
// - the current `FeatureStatus` summary, as of the latest applied change
// - the ordered list of `StatusChange`s, used to answer queries at any height
//
// Changes are appended in processing order (block height, then promotion
// before messages, then transaction order), so the last change at or before
// a height is the one that governs it.

use crate::types::{
    BlockNumber, ClientVersion, CompletedActivation, FeatureId, FeatureStatus, StatusChange,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-feature state: summary plus full history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct FeatureEntry {
    status: FeatureStatus,
    history: Vec<StatusChange>,
}

impl FeatureEntry {
    /// Append a change unless it repeats the last one
    fn record(&mut self, change: StatusChange) -> bool {
        if self.history.last() == Some(&change) {
            return false;
        }
        debug_assert!(
            self.history.last().map_or(true, |last| last.height() <= change.height()),
            "status changes must be appended in height order"
        );
        self.history.push(change);
        true
    }

    /// Change governing `height`, if any
    fn governing(&self, height: BlockNumber) -> Option<&StatusChange> {
        self.history.iter().rev().find(|c| c.height() <= height)
    }
}

/// Feature registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRegistry {
    features: BTreeMap<FeatureId, FeatureEntry>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status; unknown ids read as never activated
    pub fn get_status(&self, feature_id: FeatureId) -> FeatureStatus {
        self.features
            .get(&feature_id)
            .map(|entry| entry.status)
            .unwrap_or_else(FeatureStatus::never_activated)
    }

    /// Mark a feature live from `activation_block`
    ///
    /// Applying the same activation twice at the same height leaves the
    /// registry unchanged. Returns whether anything changed.
    pub fn apply_activation(
        &mut self,
        feature_id: FeatureId,
        activation_block: BlockNumber,
        min_client_version: ClientVersion,
    ) -> bool {
        let entry = self.features.entry(feature_id).or_default();
        entry.status.active = true;
        entry.status.activated_at_block = Some(activation_block);
        entry.status.min_client_version = min_client_version;
        entry.record(StatusChange::Activated {
            at: activation_block,
            min_client_version,
        })
    }

    /// Mark a feature unusable from `at_block` on. Idempotent.
    pub fn apply_deactivation(&mut self, feature_id: FeatureId, at_block: BlockNumber) -> bool {
        let entry = self.features.entry(feature_id).or_default();
        entry.status.active = false;
        entry.status.deactivated_at_block = Some(at_block);
        entry.record(StatusChange::Deactivated { at: at_block })
    }

    /// Is the feature usable at `at_block` by a client running `client_version`?
    pub fn is_usable(
        &self,
        feature_id: FeatureId,
        at_block: BlockNumber,
        client_version: ClientVersion,
    ) -> bool {
        self.features
            .get(&feature_id)
            .and_then(|entry| entry.governing(at_block))
            .map_or(false, |change| change.permits(client_version))
    }

    /// Full history of one feature
    pub fn history(&self, feature_id: FeatureId) -> &[StatusChange] {
        self.features
            .get(&feature_id)
            .map(|entry| entry.history.as_slice())
            .unwrap_or(&[])
    }

    /// Every activation ever applied, in application order per feature
    /// and feature id order across features
    pub fn completed_activations(&self) -> Vec<CompletedActivation> {
        let mut completed: Vec<CompletedActivation> = self
            .features
            .iter()
            .flat_map(|(feature_id, entry)| {
                entry.history.iter().filter_map(move |change| match change {
                    StatusChange::Activated { at, min_client_version } => Some(CompletedActivation {
                        feature_id: *feature_id,
                        activated_at_block: *at,
                        min_client_version: *min_client_version,
                    }),
                    StatusChange::Deactivated { .. } => None,
                })
            })
            .collect();
        // Stable: equal heights keep feature id order
        completed.sort_by_key(|c| c.activated_at_block);
        completed
    }
}
