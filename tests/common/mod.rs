//! Common test utilities
#![allow(dead_code)]

use difftensor::autodiff::check::{CheckConfig, CheckReport};
use difftensor::runtime::cpu::CpuDevice;
use difftensor::tensor::Tensor;

/// Install a test logger once; later calls are no-ops
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The default CPU device, with logging enabled
pub fn device() -> CpuDevice {
    init_logging();
    CpuDevice::new()
}

/// `f64` tensor with values `0, 1, 2, ...` in row-major order
pub fn range(shape: &[usize]) -> Tensor<f64> {
    let n: usize = shape.iter().product();
    let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
    Tensor::from_slice(&data, shape, &device()).unwrap()
}

/// `f64` tensor with deterministic non-integer values
pub fn wavy(shape: &[usize]) -> Tensor<f64> {
    let n: usize = shape.iter().product();
    let data: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() + 0.1 * i as f64).collect();
    Tensor::from_slice(&data, shape, &device()).unwrap()
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Check config for `f64` pullbacks
pub fn strict() -> CheckConfig {
    CheckConfig {
        epsilon: 1e-4,
        tolerance: 1e-6,
        ..CheckConfig::default()
    }
}

/// Assert a gradient check passed
pub fn assert_passed(report: CheckReport, msg: &str) {
    assert!(
        report.passed(),
        "{}: numeric {} vs analytic {} (error {})",
        msg,
        report.numeric,
        report.analytic,
        report.error()
    );
}
