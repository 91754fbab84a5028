// Authorization - Who may turn protocol features on and off
// Principle: A pure predicate, configured once per chain

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sender authorization gate
///
/// An address is authorized when it is allow-listed and not ignore-listed.
/// The ignore-list lets an operator stop honoring a compromised admin key
/// without waiting for a new allow-list to be distributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGate {
    allowed: BTreeSet<Address>,
    ignored: BTreeSet<Address>,
}

impl AuthorizationGate {
    /// Gate with a single administrative sender
    pub fn new(admin: Address) -> Self {
        let mut allowed = BTreeSet::new();
        allowed.insert(admin);
        Self {
            allowed,
            ignored: BTreeSet::new(),
        }
    }

    /// Gate built from configured allow and ignore lists
    pub fn from_lists(
        allowed: impl IntoIterator<Item = Address>,
        ignored: impl IntoIterator<Item = Address>,
    ) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            ignored: ignored.into_iter().collect(),
        }
    }

    /// Is `sender` permitted to issue activation/deactivation messages?
    pub fn is_authorized(&self, sender: &Address) -> bool {
        self.allowed.contains(sender) && !self.ignored.contains(sender)
    }
}
