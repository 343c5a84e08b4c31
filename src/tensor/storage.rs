//! # Tensor Storage
//!
//! Defines the underlying memory storage for Tensors.
//! Currently, this uses `ndarray::ArrayD` for CPU storage.

use ndarray::ArrayD;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::TensorData;

/// Represents the CPU memory backing a Tensor.
///
/// It wraps the actual `ndarray` array within synchronization primitives
/// (`Arc<RwLock<...>>`) so the model that owns a parameter and every
/// optimizer updating it see the same values.
#[derive(Debug, Clone)]
pub struct CpuStorage {
    data: Arc<RwLock<ArrayD<TensorData>>>,
}

impl CpuStorage {
    /// Creates a new `CpuStorage` instance from an existing `ndarray::ArrayD`.
    pub fn new(array_data: ArrayD<TensorData>) -> Self {
        CpuStorage {
            data: Arc::new(RwLock::new(array_data)),
        }
    }

    /// Provides read access to the underlying `ndarray`.
    /// Locks the `RwLock` for reading. Panics if the lock is poisoned.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.data.read().expect("CPU Storage RwLock poisoned (read)")
    }

    /// Provides write access to the underlying `ndarray`.
    /// Locks the `RwLock` for writing. Panics if the lock is poisoned.
    pub fn write_lock(&self) -> RwLockWriteGuard<'_, ArrayD<TensorData>> {
        self.data.write().expect("CPU Storage RwLock poisoned (write)")
    }

    /// Swaps in `array_data` and returns the previous contents.
    ///
    /// Unlike [`write_lock`](Self::write_lock) this recovers a poisoned lock,
    /// so it is safe to call while unwinding.
    pub(crate) fn replace(&self, array_data: ArrayD<TensorData>) -> ArrayD<TensorData> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, array_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn clones_share_the_same_buffer() {
        let a = CpuStorage::new(ArrayD::zeros(IxDyn(&[2])));
        let b = a.clone();
        b.write_lock()[[1]] = 4.0;
        assert_eq!(a.read_lock()[[1]], 4.0);
    }

    #[test]
    fn replace_returns_previous_contents() {
        let storage = CpuStorage::new(ArrayD::zeros(IxDyn(&[3])));
        let old = storage.replace(ArrayD::from_elem(IxDyn(&[3]), 1.5));
        assert!(old.iter().all(|&x| x == 0.0));
        assert!(storage.read_lock().iter().all(|&x| x == 1.5));
    }
}
