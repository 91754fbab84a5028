// Core types of the meta-protocol node
// Principle: Minimal, auditable, deterministic

pub mod primitives;
pub mod address;
pub mod feature;
pub mod message;
pub mod block;

pub use primitives::*;
pub use address::*;
pub use feature::*;
pub use message::*;
pub use block::*;
