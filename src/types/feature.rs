// Feature - Status of gated protocol features
// Principle: A feature's past is never rewritten, only appended to
use super::primitives::{BlockNumber, ClientVersion, FeatureId};
use serde::{Deserialize, Serialize};

// =============================================================================
// KNOWN FEATURES
// =============================================================================

/// Fixed-supply property issuance
pub const FEATURE_FIXED_ISSUANCE: FeatureId = FeatureId::from_u16(1);
/// Managed-supply property issuance (grant/revoke)
pub const FEATURE_MANAGED_ISSUANCE: FeatureId = FeatureId::from_u16(2);
/// Crowdsale property issuance
pub const FEATURE_CROWDSALE: FeatureId = FeatureId::from_u16(3);
/// Distributed token exchange
pub const FEATURE_METADEX: FeatureId = FeatureId::from_u16(4);
/// Send all tokens of an ecosystem in one transaction
pub const FEATURE_SEND_ALL: FeatureId = FeatureId::from_u16(5);

/// Human-readable feature name, for logs and listings
pub fn feature_name(feature_id: FeatureId) -> &'static str {
    match feature_id.value() {
        1 => "Fixed-supply property issuance",
        2 => "Managed-supply property issuance",
        3 => "Crowdsale property issuance",
        4 => "Distributed token exchange",
        5 => "Send all",
        _ => "Unknown feature",
    }
}

// =============================================================================
// FEATURE STATUS
// =============================================================================

/// Current status of one feature, as of the registry's tip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureStatus {
    /// Feature is currently live
    pub active: bool,

    /// Minimum client version required to honor the feature
    pub min_client_version: ClientVersion,

    /// Height of the most recent activation
    pub activated_at_block: Option<BlockNumber>,

    /// Height of the most recent deactivation
    pub deactivated_at_block: Option<BlockNumber>,
}

impl FeatureStatus {
    /// Status of a feature that was never mentioned
    pub fn never_activated() -> Self {
        Self::default()
    }
}

/// One entry of a feature's height-ordered history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChange {
    /// Feature became live at `at`
    Activated {
        at: BlockNumber,
        min_client_version: ClientVersion,
    },

    /// Feature stopped being live at `at`
    Deactivated { at: BlockNumber },
}

impl StatusChange {
    /// Height at which the change took effect
    pub fn height(&self) -> BlockNumber {
        match self {
            StatusChange::Activated { at, .. } => *at,
            StatusChange::Deactivated { at } => *at,
        }
    }

    /// Does this change leave the feature usable for `client_version`?
    pub fn permits(&self, client_version: ClientVersion) -> bool {
        match self {
            StatusChange::Activated { min_client_version, .. } => {
                client_version >= *min_client_version
            }
            StatusChange::Deactivated { .. } => false,
        }
    }
}

/// A feature activation that was applied to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedActivation {
    pub feature_id: FeatureId,
    pub activated_at_block: BlockNumber,
    pub min_client_version: ClientVersion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_feature_names() {
        assert_eq!(feature_name(FEATURE_FIXED_ISSUANCE), "Fixed-supply property issuance");
        assert_eq!(feature_name(FEATURE_SEND_ALL), "Send all");
        assert_eq!(feature_name(FeatureId::new(999).unwrap()), "Unknown feature");
    }

    #[test]
    fn test_never_activated_default() {
        let status = FeatureStatus::never_activated();
        assert!(!status.active);
        assert_eq!(status.min_client_version, 0);
        assert_eq!(status.activated_at_block, None);
        assert_eq!(status.deactivated_at_block, None);
    }

    #[test]
    fn test_status_change_permits() {
        let activated = StatusChange::Activated { at: 10, min_client_version: 5 };
        assert!(activated.permits(5));
        assert!(!activated.permits(4));
        assert_eq!(activated.height(), 10);

        let deactivated = StatusChange::Deactivated { at: 12 };
        assert!(!deactivated.permits(u32::MAX));
        assert_eq!(deactivated.height(), 12);
    }
}
