//! Shared validation and kernel helpers for operator implementations.

use crate::backend::spec::TensorSpec;
use crate::error::{OnnxError, OnnxResult};
use crate::tensor::{DType, Tensor, Value};

use super::function::{CompiledKernel, KernelKey};

/// Spec of a required input at compile time.
pub(crate) fn required_spec<'a>(
    op: &str,
    key: &'a KernelKey,
    index: usize,
) -> OnnxResult<&'a TensorSpec> {
    key.input(index).ok_or_else(|| {
        OnnxError::invalid_argument(op, format!("input {index} is required but was omitted"))
    })
}

pub(crate) fn expect_dtype(op: &str, spec: &TensorSpec, dtype: DType) -> OnnxResult<()> {
    if spec.dtype == dtype {
        Ok(())
    } else {
        Err(OnnxError::invalid_argument(
            op,
            format!("expected {dtype:?} input, got {:?}", spec.dtype),
        ))
    }
}

/// Tensor at `index` during kernel execution.
pub(crate) fn tensor_input<'a>(op: &str, inputs: &'a [Value], index: usize) -> OnnxResult<&'a Tensor> {
    inputs
        .get(index)
        .and_then(Value::as_tensor)
        .ok_or_else(|| OnnxError::invalid_argument(op, format!("input {index} is missing")))
}

pub(crate) fn f32_input<'a>(op: &str, inputs: &'a [Value], index: usize) -> OnnxResult<&'a [f32]> {
    tensor_input(op, inputs, index)?
        .as_f32()
        .ok_or_else(|| OnnxError::invalid_argument(op, format!("input {index} must be F32")))
}

/// Compiles an elementwise `F32 -> F32` kernel over input 0.
pub(crate) fn compile_unary(
    op: &'static str,
    key: &KernelKey,
    f: fn(f32) -> f32,
) -> OnnxResult<CompiledKernel> {
    let spec = required_spec(op, key, 0)?;
    expect_dtype(op, spec, DType::F32)?;
    Ok(CompiledKernel::new(key, move |inputs| {
        let x = tensor_input(op, inputs, 0)?;
        let y = x
            .map_f32(f)
            .ok_or_else(|| OnnxError::invalid_argument(op, "input 0 must be F32"))?;
        Ok(vec![y])
    }))
}

/// Numpy-style broadcast of two shapes, aligning trailing axes.
pub(crate) fn broadcast_shapes(op: &str, lhs: &[usize], rhs: &[usize]) -> OnnxResult<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    let mut out = vec![0usize; rank];
    for i in 0..rank {
        let l = dim_from_end(lhs, rank, i);
        let r = dim_from_end(rhs, rank, i);
        out[i] = match (l, r) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => {
                return Err(OnnxError::invalid_argument(
                    op,
                    format!("shapes {lhs:?} and {rhs:?} are not broadcast compatible"),
                ))
            }
        };
    }
    Ok(out)
}

fn dim_from_end(dims: &[usize], rank: usize, axis: usize) -> usize {
    let offset = rank - dims.len();
    if axis < offset {
        1
    } else {
        dims[axis - offset]
    }
}

/// Strides of `dims` viewed at `rank`, with zero stride on broadcast axes.
pub(crate) fn broadcast_strides(dims: &[usize], rank: usize) -> Vec<usize> {
    let offset = rank - dims.len();
    let mut strides = vec![0usize; rank];
    let mut stride = 1usize;
    for axis in (0..dims.len()).rev() {
        strides[axis + offset] = if dims[axis] == 1 { 0 } else { stride };
        stride *= dims[axis];
    }
    strides
}

/// Maps a possibly negative ONNX axis into `0..rank`.
pub(crate) fn normalize_axis(op: &str, axis: i64, rank: usize) -> OnnxResult<usize> {
    let rank_i = rank as i64;
    let normalized = if axis < 0 { axis + rank_i } else { axis };
    if (0..rank_i).contains(&normalized) {
        Ok(normalized as usize)
    } else {
        Err(OnnxError::invalid_argument(
            op,
            format!("axis {axis} is out of range for rank {rank}"),
        ))
    }
}
