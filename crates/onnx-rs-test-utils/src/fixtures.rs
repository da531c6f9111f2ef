use onnx_rs::{Shape, Tensor};
use rand::Rng;

/// `0, 1, 2, ...` laid out row-major in `shape`.
pub fn arange_f32(shape: impl Into<Shape>) -> Tensor {
    let shape = shape.into();
    let data = (0..shape.num_elements()).map(|v| v as f32).collect();
    Tensor::from_vec(shape, data).expect("arange length matches shape")
}

/// Uniform values in `[-1, 1)`.
pub fn random_tensor<R: Rng>(rng: &mut R, shape: impl Into<Shape>) -> Tensor {
    let shape = shape.into();
    let data = (0..shape.num_elements())
        .map(|_| rng.gen_range(-1.0f32..1.0))
        .collect();
    Tensor::from_vec(shape, data).expect("random length matches shape")
}
