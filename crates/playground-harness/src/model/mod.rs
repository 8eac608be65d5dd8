//! Reference model for model-based testing.
//!
//! The model keeps snapshots in a plain sorted vector and recomputes every
//! answer by linear scan. It serves as the oracle against which the
//! controller's buffer and cursor are verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod world;

pub use operation::{ModelEpoch, Operation, OperationResult};
pub use world::{ModelWorld, ObservableState};
