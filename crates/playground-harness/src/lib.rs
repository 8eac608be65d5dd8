//! Model-based testing harness for playground state synchronization.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the epoch
//! buffer and the view cursor. Operations are applied to both the model and
//! a real [`RoomController`](playground_core::RoomController), and their
//! observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;

pub use model::{ModelEpoch, ModelWorld, ObservableState, Operation, OperationResult};
