//! # Optimizer Checkpoints
//!
//! Saves and restores an optimizer's auxiliary slots and iteration counter.
//! Uses `serde` for serialization and `bincode` as the binary format.
//! Parameter values belong to the model and are not part of the checkpoint.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::debug;

use crate::optim::{OptimError, Optimizer, OptimizerState};

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error (Bincode): {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Optimizer Error: {0}")]
    Optim(#[from] OptimError),
}

// --- Save Function ---

/// Saves the state of `optimizer` to a file.
///
/// # Arguments
/// * `optimizer`: The optimizer whose slots and iteration counter should be saved.
/// * `path`: The file path where the state will be saved.
pub fn save_state<P: AsRef<Path>>(
    optimizer: &dyn Optimizer,
    path: P,
) -> Result<(), SerializationError> {
    let state = optimizer.state_dict();

    let file = File::create(path.as_ref())?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &state)?;

    debug!(
        "{}: saved state at iteration {} to {}",
        state.optimizer,
        state.iterations,
        path.as_ref().display()
    );
    Ok(())
}

// --- Load Function ---

/// Loads a state file into `optimizer`.
///
/// The optimizer must be of the same type and already built for the same
/// parameters, registered in the same order, as the one that was saved.
pub fn load_state<P: AsRef<Path>>(
    optimizer: &mut dyn Optimizer,
    path: P,
) -> Result<(), SerializationError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    let state: OptimizerState = bincode::deserialize_from(reader)?;

    optimizer.load_state_dict(&state)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::config::SgdConfig;
    use crate::optim::SGD;

    #[test]
    fn missing_file_is_an_io_error() {
        let mut sgd = SGD::new(SgdConfig::default()).unwrap();
        let path = std::env::temp_dir().join("gradstep-missing-checkpoint.bin");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            load_state(&mut sgd, &path),
            Err(SerializationError::Io(_))
        ));
    }
}
