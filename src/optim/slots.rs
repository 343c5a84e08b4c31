//! # Auxiliary State Slots
//!
//! Every optimizer keeps its per-parameter state (momentum, running averages,
//! the previous parameter value, ...) in a [`SlotTable`]. Parameters are
//! registered once with [`SlotTable::allocate`]; each receives a
//! [`ParamHandle`] (its position in registration order) and one array per
//! declared slot, with the parameter's shape.

use std::collections::HashMap;

use log::{debug, warn};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use super::OptimError;
use crate::tensor::ops::ensure_same_shape;
use crate::tensor::{Tensor, TensorData, TensorId};

/// How a slot is filled when its parameter is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotInit {
    Zeros,
    /// A copy of the parameter's value at registration time.
    CopyOfParam,
}

/// A named slot an optimizer declares for every parameter it manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: &'static str,
    pub init: SlotInit,
}

impl SlotSpec {
    pub const fn zeros(name: &'static str) -> Self {
        SlotSpec {
            name,
            init: SlotInit::Zeros,
        }
    }

    pub const fn copy_of_param(name: &'static str) -> Self {
        SlotSpec {
            name,
            init: SlotInit::CopyOfParam,
        }
    }

    fn materialize(&self, param: &Tensor) -> ArrayD<TensorData> {
        match self.init {
            SlotInit::Zeros => ArrayD::zeros(IxDyn(param.shape())),
            SlotInit::CopyOfParam => param.data_clone(),
        }
    }
}

/// Stable index of a registered parameter inside one optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamHandle(usize);

impl ParamHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Allocation state of a [`SlotTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unallocated,
    Allocated,
}

#[derive(Debug)]
struct ParamSlots {
    shape: Vec<usize>,
    values: Vec<ArrayD<TensorData>>,
}

/// Slot storage for one optimizer instance.
#[derive(Debug)]
pub struct SlotTable {
    specs: &'static [SlotSpec],
    handles: HashMap<TensorId, ParamHandle>,
    entries: Vec<ParamSlots>,
    lifecycle: Lifecycle,
}

impl SlotTable {
    pub fn new(specs: &'static [SlotSpec]) -> Self {
        SlotTable {
            specs,
            handles: HashMap::new(),
            entries: Vec::new(),
            lifecycle: Lifecycle::Unallocated,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_allocated(&self) -> bool {
        self.lifecycle == Lifecycle::Allocated
    }

    /// Number of registered parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|spec| spec.name)
    }

    /// Registers `params` and creates their slots.
    ///
    /// Only the first call does anything; once the table is `Allocated`,
    /// later calls leave every slot untouched, including for parameters the
    /// first call did not name.
    pub fn allocate(&mut self, optimizer: &str, params: &[Tensor]) {
        if self.is_allocated() {
            let unknown = params
                .iter()
                .filter(|param| !self.handles.contains_key(&param.id()))
                .count();
            if unknown > 0 {
                warn!(
                    "{optimizer}: slots already allocated, ignoring {unknown} new parameter(s)"
                );
            } else {
                debug!("{optimizer}: slots already allocated");
            }
            return;
        }

        for param in params {
            if self.handles.contains_key(&param.id()) {
                continue;
            }
            let handle = ParamHandle(self.entries.len());
            let values = self
                .specs
                .iter()
                .map(|spec| spec.materialize(param))
                .collect();
            self.entries.push(ParamSlots {
                shape: param.shape().to_vec(),
                values,
            });
            self.handles.insert(param.id(), handle);
        }
        self.lifecycle = Lifecycle::Allocated;
        debug!(
            "{optimizer}: allocated {} slot(s) for {} parameter(s)",
            self.specs.len(),
            self.entries.len()
        );
    }

    pub fn handle(&self, param: &Tensor) -> Result<ParamHandle, OptimError> {
        self.handles
            .get(&param.id())
            .copied()
            .ok_or(OptimError::UnregisteredParameter { id: param.id() })
    }

    /// Checks that `param` is registered and that a gradient of `grad_shape`
    /// can be applied to it.
    pub fn check(&self, param: &Tensor, grad_shape: &[usize]) -> Result<ParamHandle, OptimError> {
        let handle = self.handle(param)?;
        let entry = &self.entries[handle.0];
        ensure_same_shape(&entry.shape, param.data().shape())?;
        ensure_same_shape(&entry.shape, grad_shape)?;
        Ok(handle)
    }

    /// The slots of a registered parameter, in declaration order.
    pub fn values(&self, param: &Tensor) -> Result<&[ArrayD<TensorData>], OptimError> {
        let handle = self.handle(param)?;
        Ok(&self.entries[handle.0].values)
    }

    /// Mutable access to exactly `N` slots of `param`, after validating the
    /// gradient shape against the parameter.
    pub fn slots_for<const N: usize>(
        &mut self,
        param: &Tensor,
        grad_shape: &[usize],
    ) -> Result<&mut [ArrayD<TensorData>; N], OptimError> {
        let handle = self.check(param, grad_shape)?;
        let values = &mut self.entries[handle.0].values;
        let found = values.len();
        <&mut [ArrayD<TensorData>; N]>::try_from(values.as_mut_slice()).map_err(|_| {
            OptimError::IncompatibleState(format!("expected {N} slot(s), found {found}"))
        })
    }

    /// A copy of one named slot of `param`.
    pub fn value(
        &self,
        optimizer: &'static str,
        param: &Tensor,
        name: &str,
    ) -> Result<ArrayD<TensorData>, OptimError> {
        let index = self
            .specs
            .iter()
            .position(|spec| spec.name == name)
            .ok_or_else(|| OptimError::UnknownSlot {
                optimizer,
                slot: name.to_string(),
            })?;
        Ok(self.values(param)?[index].clone())
    }

    /// Slot values of every registered parameter, indexed by handle.
    pub fn export(&self) -> Vec<Vec<ArrayD<TensorData>>> {
        self.entries.iter().map(|entry| entry.values.clone()).collect()
    }

    /// Overwrites the slots with previously exported values.
    ///
    /// The table must already be allocated for the same parameters, in the
    /// same order, with the same slot names.
    pub fn import(
        &mut self,
        slot_names: &[String],
        values: &[Vec<ArrayD<TensorData>>],
    ) -> Result<(), OptimError> {
        if !self.is_allocated() {
            return Err(OptimError::IncompatibleState(
                "slots must be allocated before loading state".to_string(),
            ));
        }
        if !self.slot_names().eq(slot_names.iter().map(String::as_str)) {
            return Err(OptimError::IncompatibleState(format!(
                "slot names {slot_names:?} do not match {:?}",
                self.slot_names().collect::<Vec<_>>()
            )));
        }
        if values.len() != self.entries.len() {
            return Err(OptimError::IncompatibleState(format!(
                "state holds {} parameter(s), optimizer manages {}",
                values.len(),
                self.entries.len()
            )));
        }
        for (entry, loaded) in self.entries.iter().zip(values) {
            if loaded.len() != entry.values.len() {
                return Err(OptimError::IncompatibleState(format!(
                    "expected {} slot(s) per parameter, found {}",
                    entry.values.len(),
                    loaded.len()
                )));
            }
            for value in loaded {
                ensure_same_shape(&entry.shape, value.shape())?;
            }
        }
        for (entry, loaded) in self.entries.iter_mut().zip(values) {
            entry.values.clone_from(loaded);
        }
        Ok(())
    }
}

/// Serializable snapshot of an optimizer: slot values plus the iteration
/// counter. Parameters are identified by registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    /// Optimizer type name (e.g., "Adam", "NAG") for validation on load.
    pub optimizer: String,
    pub iterations: u64,
    pub slot_names: Vec<String>,
    /// `params[handle][slot]`
    pub params: Vec<Vec<ArrayD<TensorData>>>,
}
