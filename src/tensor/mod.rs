//! # Tensor Module
//!
//! Parameter storage shared between the caller's model and the optimizers.
//! A [`Tensor`] is a cheap handle: clones share the same data and the same
//! [`TensorId`], which is what optimizers use to find a parameter's slots.

use ndarray::{ArrayD, IxDyn};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};

pub mod ops;
pub mod storage;

pub use storage::CpuStorage;

#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("ndarray error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
}

// Define a type alias for the underlying data type (e.g., f32)
pub type TensorData = f32;

/// Process-unique identity of a tensor, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(usize);

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_TENSOR_ID: AtomicUsize = AtomicUsize::new(0);

impl TensorId {
    fn next() -> Self {
        TensorId(NEXT_TENSOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// # Tensor
///
/// A named, mutable, fixed-shape array of [`TensorData`]. Models own their
/// parameters as `Tensor`s; optimizers read and overwrite the values in place
/// but never create or destroy parameters.
#[derive(Clone, Debug)]
pub struct Tensor {
    storage: CpuStorage,
    // Shape information (redundant with ndarray but useful for quick access)
    shape: Vec<usize>,
    id: TensorId,
    name: Option<Arc<str>>,
}

impl Tensor {
    /// Creates a new Tensor from an ndarray::ArrayD.
    pub fn new(data: ArrayD<TensorData>) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            storage: CpuStorage::new(data),
            shape,
            id: TensorId::next(),
            name: None,
        }
    }

    /// Creates a new named Tensor. The name is only used for display and logs.
    pub fn named(name: &str, data: ArrayD<TensorData>) -> Self {
        Tensor {
            name: Some(Arc::from(name)),
            ..Tensor::new(data)
        }
    }

    /// Creates a Tensor of the given shape from row-major values.
    pub fn from_vec(shape: &[usize], values: Vec<TensorData>) -> Result<Self, TensorError> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Ok(Tensor::new(data))
    }

    /// Identity shared by this tensor and all of its clones.
    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Provides read-only access to the underlying data.
    /// Note: This locks the RwLock for reading.
    pub fn data(&self) -> RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.storage.read_lock()
    }

    /// Provides mutable access to the underlying data.
    /// The shape must not be changed through this guard; outside the crate
    /// values are written through [`Tensor::assign`].
    /// Note: This locks the RwLock for writing.
    pub(crate) fn data_mut(&self) -> RwLockWriteGuard<'_, ArrayD<TensorData>> {
        self.storage.write_lock()
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> ArrayD<TensorData> {
        self.data().clone()
    }

    /// Copies the values in row-major order.
    pub fn to_vec(&self) -> Vec<TensorData> {
        self.data().iter().copied().collect()
    }

    /// Overwrites the tensor's values. The shape must match.
    pub fn assign(&self, values: &ArrayD<TensorData>) -> Result<(), TensorError> {
        ops::ensure_same_shape(&self.shape, values.shape())?;
        self.data_mut().assign(values);
        Ok(())
    }

    /// Swaps the whole buffer, returning the previous contents.
    /// Callers are responsible for keeping the shape unchanged.
    pub(crate) fn replace_data(&self, values: ArrayD<TensorData>) -> ArrayD<TensorData> {
        self.storage.replace(values)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "'{}' {} {:?}", name, self.id, self.shape),
            None => write!(f, "{} {:?}", self.id, self.shape),
        }
    }
}

// --- Helper functions ---

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::new(ArrayD::zeros(IxDyn(shape)))
}

/// Helper to create a tensor filled with ones.
pub fn ones(shape: &[usize]) -> Tensor {
    Tensor::new(ArrayD::ones(IxDyn(shape)))
}

/// Helper to create a tensor filled with `value`.
pub fn full(shape: &[usize], value: TensorData) -> Tensor {
    Tensor::new(ArrayD::from_elem(IxDyn(shape), value))
}
