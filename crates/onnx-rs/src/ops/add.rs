//! `Add`: elementwise addition with multidirectional (numpy) broadcasting.

use once_cell::sync::Lazy;

use super::adapter::update_node_attrs_dict;
use super::common::{broadcast_shapes, broadcast_strides, required_spec, tensor_input};
use super::function::{Arity, CompiledKernel, KernelKey, OpFunction};
use super::registry::{Handler, OpRegistry};
use crate::error::{OnnxError, OnnxResult};
use crate::onnx::OnnxNode;
use crate::tensor::{Shape, Tensor, TensorData, Value};

const OP: &str = "Add";

pub static ADD: Lazy<OpFunction> = Lazy::new(|| OpFunction::new(OP, Arity::Exact(2), &[], compile));

fn compile(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    let lhs = required_spec(OP, key, 0)?;
    let rhs = required_spec(OP, key, 1)?;
    if lhs.dtype != rhs.dtype {
        return Err(OnnxError::invalid_argument(
            OP,
            format!("operand dtypes differ: {:?} vs {:?}", lhs.dtype, rhs.dtype),
        ));
    }
    let out_dims = broadcast_shapes(OP, lhs.shape.dims(), rhs.shape.dims())?;
    let out_shape = Shape::new(out_dims);
    let plan = BroadcastPlan::new(&out_shape, lhs.shape.dims(), rhs.shape.dims());

    Ok(CompiledKernel::new(key, move |inputs| {
        let a = tensor_input(OP, inputs, 0)?;
        let b = tensor_input(OP, inputs, 1)?;
        let out = match (a.storage(), b.storage()) {
            (TensorData::F32(x), TensorData::F32(y)) => {
                Tensor::from_vec(out_shape.clone(), plan.apply(x, y, |p, q| p + q))?
            }
            (TensorData::I64(x), TensorData::I64(y)) => {
                Tensor::from_i64(out_shape.clone(), plan.apply(x, y, i64::wrapping_add))?
            }
            _ => return Err(OnnxError::invalid_argument(OP, "operand dtypes differ")),
        };
        Ok(vec![out])
    }))
}

/// Precomputed source offsets for each output element.
struct BroadcastPlan {
    lhs: Vec<usize>,
    rhs: Vec<usize>,
}

impl BroadcastPlan {
    fn new(out: &Shape, lhs: &[usize], rhs: &[usize]) -> Self {
        let rank = out.rank();
        let lhs_strides = broadcast_strides(lhs, rank);
        let rhs_strides = broadcast_strides(rhs, rank);
        let out_strides = out.strides();
        let total = out.num_elements();
        let mut lhs_offsets = Vec::with_capacity(total);
        let mut rhs_offsets = Vec::with_capacity(total);
        for flat in 0..total {
            let mut rem = flat;
            let (mut l, mut r) = (0usize, 0usize);
            for axis in 0..rank {
                let idx = rem / out_strides[axis];
                rem %= out_strides[axis];
                l += idx * lhs_strides[axis];
                r += idx * rhs_strides[axis];
            }
            lhs_offsets.push(l);
            rhs_offsets.push(r);
        }
        Self {
            lhs: lhs_offsets,
            rhs: rhs_offsets,
        }
    }

    fn apply<T: Copy>(&self, x: &[T], y: &[T], f: impl Fn(T, T) -> T) -> Vec<T> {
        self.lhs
            .iter()
            .zip(&self.rhs)
            .map(|(&l, &r)| f(x[l], y[r]))
            .collect()
    }
}

fn select(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &ADD);
    Ok(&*ADD)
}

pub fn register(registry: &mut OpRegistry) -> OnnxResult<()> {
    registry.register(
        Handler::builder(OP)
            .version(7, select)
            .version(13, select)
            .version(14, select)
            .build()?,
    )
}
