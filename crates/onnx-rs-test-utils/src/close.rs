use onnx_rs::Tensor;

pub const DEFAULT_ATOL: f64 = 1e-5;
pub const DEFAULT_RTOL: f64 = 1e-5;

pub fn assert_close(expected: &[f32], actual: &[f32]) {
    assert_close_tol(expected, actual, DEFAULT_ATOL, DEFAULT_RTOL);
}

pub fn assert_close_tol(expected: &[f32], actual: &[f32], atol: f64, rtol: f64) {
    assert_eq!(expected.len(), actual.len(), "length mismatch");
    for (idx, (&e, &a)) in expected.iter().zip(actual.iter()).enumerate() {
        let diff = (e as f64 - a as f64).abs();
        let thresh = atol + rtol * e.abs().max(a.abs()) as f64;
        assert!(
            diff <= thresh,
            "value mismatch at index {idx}: expected {e}, actual {a}, diff {diff}, thresh {thresh}"
        );
    }
}

/// Shape, dtype, and element-wise closeness of two tensors.
pub fn assert_tensors_close(expected: &Tensor, actual: &Tensor) {
    assert_eq!(expected.shape(), actual.shape(), "shape mismatch");
    assert_eq!(expected.dtype(), actual.dtype(), "dtype mismatch");
    let expected: Vec<f32> = expected.to_f64_vec().into_iter().map(|v| v as f32).collect();
    let actual: Vec<f32> = actual.to_f64_vec().into_iter().map(|v| v as f32).collect();
    assert_close(&expected, &actual);
}
