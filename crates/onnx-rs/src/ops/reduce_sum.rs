//! `ReduceSum`.
//!
//! Opsets 1 and 11 take `axes` as an attribute. Opset 13 moved it to an optional second
//! input, which the selector promotes into the static `axes` attribute so the reduced axes
//! are part of the compiled signature. An empty or missing axes list reduces every axis,
//! unless `noop_with_empty_axes` is set, in which case the input passes through.

use once_cell::sync::Lazy;

use super::adapter::{promote_input_to_attr, update_node_attrs_dict};
use super::common::{normalize_axis, required_spec, tensor_input};
use super::function::{Arity, CompiledKernel, KernelKey, OpFunction};
use super::registry::{Handler, OpRegistry};
use crate::error::{OnnxError, OnnxResult};
use crate::onnx::{AttrsDictExt, OnnxNode, Param, ParamDefault};
use crate::tensor::{Shape, Tensor, TensorData, Value};

const OP: &str = "ReduceSum";

const ATTR_AXES_PARAMS: &[Param] = &[
    Param::required("axes"),
    Param::new("keepdims", ParamDefault::Int(1)),
];

const INPUT_AXES_PARAMS: &[Param] = &[
    Param::required("axes"),
    Param::new("keepdims", ParamDefault::Int(1)),
    Param::new("noop_with_empty_axes", ParamDefault::Int(0)),
];

pub static REDUCE_SUM_1: Lazy<OpFunction> =
    Lazy::new(|| OpFunction::new("ReduceSum-1", Arity::Exact(1), ATTR_AXES_PARAMS, compile));

pub static REDUCE_SUM_13: Lazy<OpFunction> = Lazy::new(|| {
    OpFunction::new(
        "ReduceSum-13",
        Arity::Range { min: 1, max: 2 },
        INPUT_AXES_PARAMS,
        compile,
    )
});

fn compile(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    let spec = required_spec(OP, key, 0)?;
    let dims = spec.shape.dims().to_vec();
    let rank = dims.len();
    let keepdims = key.attrs.int("keepdims").unwrap_or(1) != 0;
    let noop_with_empty_axes = key.attrs.int("noop_with_empty_axes").unwrap_or(0) != 0;

    let requested = key.attrs.ints("axes").unwrap_or(&[]);
    if requested.is_empty() && noop_with_empty_axes {
        return Ok(CompiledKernel::new(key, |inputs| {
            Ok(vec![tensor_input(OP, inputs, 0)?.clone()])
        }));
    }

    let mut reduced = vec![requested.is_empty(); rank];
    for &axis in requested {
        let axis = normalize_axis(OP, axis, rank)?;
        if reduced[axis] {
            return Err(OnnxError::invalid_argument(
                OP,
                format!("axis {axis} listed more than once"),
            ));
        }
        reduced[axis] = true;
    }

    let kept_dims: Vec<usize> = dims
        .iter()
        .zip(&reduced)
        .map(|(&d, &r)| if r { 1 } else { d })
        .collect();
    let out_dims: Vec<usize> = kept_dims
        .iter()
        .zip(&reduced)
        .filter_map(|(&d, &r)| (keepdims || !r).then_some(d))
        .collect();
    let out_shape = Shape::new(out_dims);
    let targets = reduction_targets(&dims, &kept_dims);
    let out_len = out_shape.num_elements();

    Ok(CompiledKernel::new(key, move |inputs| {
        let x = tensor_input(OP, inputs, 0)?;
        let out = match x.storage() {
            TensorData::F32(values) => {
                let mut acc = vec![0.0f32; out_len];
                for (value, &target) in values.iter().zip(&targets) {
                    acc[target] += value;
                }
                Tensor::from_vec(out_shape.clone(), acc)?
            }
            TensorData::I64(values) => {
                let mut acc = vec![0i64; out_len];
                for (value, &target) in values.iter().zip(&targets) {
                    acc[target] = acc[target].wrapping_add(*value);
                }
                Tensor::from_i64(out_shape.clone(), acc)?
            }
        };
        Ok(vec![out])
    }))
}

/// Output offset for every input element, given the input dims and the dims with reduced
/// axes collapsed to 1.
fn reduction_targets(dims: &[usize], kept_dims: &[usize]) -> Vec<usize> {
    let in_strides = Shape::new(dims.to_vec()).strides();
    let out_strides = Shape::new(kept_dims.to_vec()).strides();
    let total: usize = dims.iter().product();
    (0..total)
        .map(|flat| {
            let mut rem = flat;
            let mut target = 0usize;
            for axis in 0..dims.len() {
                let idx = rem / in_strides[axis];
                rem %= in_strides[axis];
                if kept_dims[axis] == dims[axis] {
                    target += idx * out_strides[axis];
                }
            }
            target
        })
        .collect()
}

fn version_1(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &REDUCE_SUM_1);
    Ok(&*REDUCE_SUM_1)
}

fn version_11(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &REDUCE_SUM_1);
    Ok(&*REDUCE_SUM_1)
}

fn version_13(node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &REDUCE_SUM_13);
    promote_input_to_attr(node, inputs, 1, "axes");
    Ok(&*REDUCE_SUM_13)
}

pub fn register(registry: &mut OpRegistry) -> OnnxResult<()> {
    registry.register(
        Handler::builder(OP)
            .version(1, version_1)
            .version(11, version_11)
            .version(13, version_13)
            .build()?,
    )
}
