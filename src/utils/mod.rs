//! # Utility Functions (`utils`)
//!
//! Provides helpers around the optimizers, currently checkpointing.

pub mod serialization;

pub use serialization::{load_state, save_state, SerializationError};
