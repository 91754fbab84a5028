// Contracts - Protocol logic embedded in the node
// Principle: No deployable code, everything is hardcoded and auditable

pub mod authorization;
pub mod queue;
pub mod registry;
pub mod activation;
pub mod issuance;
