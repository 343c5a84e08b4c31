#![allow(dead_code)]

use gradstep::tensor::TensorData;
use ndarray::{ArrayD, IxDyn};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn filled(shape: &[usize], value: TensorData) -> ArrayD<TensorData> {
    ArrayD::from_elem(IxDyn(shape), value)
}
