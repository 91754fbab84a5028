// Tests module
// Activation invariants: property tests over random admin message histories
// Scenarios: feature-gated issuance end to end through the block processor
// Reorg: disconnect, replay and checkpoint recovery

pub mod activation_invariants;
