mod common;

use std::panic::{self, AssertUnwindSafe};

use approx::assert_abs_diff_eq;
use gradstep::optim::config::{MomentumConfig, NadianConfig};
use gradstep::optim::{Loss, Momentum, Nadian, OptimError, Optimizer, NAG};
use gradstep::tensor::{full, Tensor, TensorData};
use ndarray::ArrayD;

use common::init_logger;

fn config() -> MomentumConfig {
    MomentumConfig {
        learning_rate: 0.1,
        mu: 0.9,
    }
}

/// Gradient of `w^4 / 4`, recording where it was evaluated.
fn cubic_tape(
    points: &mut Vec<TensorData>,
) -> impl FnMut(&[Tensor]) -> Result<Vec<ArrayD<TensorData>>, OptimError> + '_ {
    move |params: &[Tensor]| {
        points.push(params[0].to_vec()[0]);
        Ok(params.iter().map(|p| p.data().mapv(|w| w * w * w)).collect())
    }
}

#[test]
fn nag_takes_gradient_at_look_ahead_point() {
    init_logger();
    let w = full(&[1], 1.0);
    let mut nag = NAG::new(config()).unwrap();
    let mut points = Vec::new();
    {
        let mut tape = cubic_tape(&mut points);
        nag.minimize(Loss::Value(0.25), &[w.clone()], Some(&mut tape))
            .unwrap();
        assert_abs_diff_eq!(w.to_vec()[0], 0.9, epsilon = 1e-6);

        nag.minimize(Loss::Value(0.25), &[w.clone()], Some(&mut tape))
            .unwrap();
    }

    // point = 0.9 + 0.9 * (0.9 - 1.0) = 0.81
    assert_abs_diff_eq!(points[1], 0.81, epsilon = 1e-6);
    // w = 0.81 - 0.1 * 0.81^3
    assert_abs_diff_eq!(w.to_vec()[0], 0.756_855_9, epsilon = 1e-6);
}

#[test]
fn momentum_takes_gradient_at_current_point() {
    init_logger();
    let w = full(&[1], 1.0);
    let mut momentum = Momentum::new(config()).unwrap();
    let mut points = Vec::new();
    {
        let mut tape = cubic_tape(&mut points);
        for _ in 0..2 {
            momentum
                .minimize(Loss::Value(0.25), &[w.clone()], Some(&mut tape))
                .unwrap();
        }
    }

    assert_abs_diff_eq!(points[1], 0.9, epsilon = 1e-6);
    // w = 0.81 - 0.1 * 0.9^3
    assert_abs_diff_eq!(w.to_vec()[0], 0.7371, epsilon = 1e-6);
}

#[test]
fn value_loss_without_tape_is_missing_context() {
    init_logger();
    let w = full(&[1], 1.0);
    let mut nag = NAG::new(config()).unwrap();
    let err = nag
        .minimize(Loss::Value(1.0), &[w.clone()], None)
        .unwrap_err();
    assert!(matches!(err, OptimError::MissingTape { .. }));
    assert_eq!(nag.iterations(), 0);
    assert_eq!(w.to_vec(), vec![1.0]);
}

#[test]
fn parameters_are_restored_when_tape_fails() {
    init_logger();
    let w = full(&[2], 1.0);
    let mut nag = NAG::new(config()).unwrap();
    let mut points = Vec::new();
    {
        let mut tape = cubic_tape(&mut points);
        nag.minimize(Loss::Value(0.0), &[w.clone()], Some(&mut tape))
            .unwrap();
    }
    let before = w.to_vec();

    let mut seen = Vec::new();
    let mut failing = |params: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
        seen = params[0].to_vec();
        Err(OptimError::IncompatibleState("no gradient".to_string()))
    };
    let result = nag.compute_gradients(Loss::Value(0.0), &[w.clone()], Some(&mut failing));

    assert!(result.is_err());
    assert_ne!(seen, before);
    assert_eq!(w.to_vec(), before);
}

#[test]
fn parameters_are_restored_when_tape_panics() {
    init_logger();
    let w = full(&[1], 1.0);
    let mut nadian = Nadian::new(NadianConfig {
        learning_rate: 0.1,
        ..NadianConfig::default()
    })
    .unwrap();
    let mut points = Vec::new();
    {
        let mut tape = cubic_tape(&mut points);
        nadian
            .minimize(Loss::Value(0.0), &[w.clone()], Some(&mut tape))
            .unwrap();
    }
    let before = w.to_vec();

    let params = [w.clone()];
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut panicking = |_: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
            panic!("tape exploded")
        };
        let _ = nadian.compute_gradients(Loss::Value(0.0), &params, Some(&mut panicking));
    }));

    assert!(outcome.is_err());
    assert_eq!(w.to_vec(), before);
}

#[test]
fn all_parameters_are_perturbed_before_the_tape_runs() {
    init_logger();
    let a = full(&[1], 1.0);
    let b = full(&[1], -1.0);
    let mut nag = NAG::new(config()).unwrap();
    let params = [a.clone(), b.clone()];

    let mut step = |params: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
        Ok(params.iter().map(|p| p.data().mapv(|_| 1.0)).collect())
    };
    nag.minimize(Loss::Value(0.0), &params, Some(&mut step))
        .unwrap();

    let mut seen = Vec::new();
    let mut recording = |params: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
        seen = params.iter().map(|p| p.to_vec()[0]).collect();
        Ok(params.iter().map(|p| p.data().mapv(|_| 0.0)).collect())
    };
    nag.compute_gradients(Loss::Value(0.0), &params, Some(&mut recording))
        .unwrap();

    // both moved by -0.1 on the first step, so both look 0.09 further ahead
    assert_abs_diff_eq!(seen[0], 0.9 - 0.09, epsilon = 1e-6);
    assert_abs_diff_eq!(seen[1], -1.1 - 0.09, epsilon = 1e-6);
    assert_abs_diff_eq!(a.to_vec()[0], 0.9, epsilon = 1e-6);
    assert_abs_diff_eq!(b.to_vec()[0], -1.1, epsilon = 1e-6);
}

#[test]
fn nag_keeps_moving_after_gradient_vanishes() {
    init_logger();
    let w = full(&[1], 1.0);
    let mut nag = NAG::new(config()).unwrap();
    let mut seen = Vec::new();
    let mut values = Vec::new();
    {
        // a unit gradient on the first call, zero afterwards
        let mut tape = |params: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
            seen.push(params[0].to_vec()[0]);
            let g = if seen.len() == 1 { 1.0 } else { 0.0 };
            Ok(params.iter().map(|p| p.data().mapv(|_| g)).collect())
        };
        for _ in 0..4 {
            nag.minimize(Loss::Value(0.0), &[w.clone()], Some(&mut tape))
                .unwrap();
            values.push(w.to_vec()[0]);
        }
    }

    for (value, expected) in values.iter().zip([0.9, 0.81, 0.729, 0.6561]) {
        assert_abs_diff_eq!(*value, expected, epsilon = 1e-6);
    }
    // with no gradient the look-ahead point is exactly where w lands next
    for (point, expected) in seen.iter().zip([1.0, 0.81, 0.729, 0.6561]) {
        assert_abs_diff_eq!(*point, expected, epsilon = 1e-6);
    }
    assert_eq!(nag.iterations(), 4);
    assert_abs_diff_eq!(nag.slot(&w, "past").unwrap()[[0]], 0.729, epsilon = 1e-6);
}
