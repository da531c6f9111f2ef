use once_cell::sync::Lazy;

use super::adapter::update_node_attrs_dict;
use super::common::compile_unary;
use super::function::{Arity, CompiledKernel, KernelKey, OpFunction};
use super::registry::{Handler, OpRegistry};
use crate::error::OnnxResult;
use crate::onnx::OnnxNode;
use crate::tensor::Value;

pub static RELU: Lazy<OpFunction> = Lazy::new(|| OpFunction::new("Relu", Arity::Exact(1), &[], compile));

fn compile(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    compile_unary("Relu", key, |x| if x < 0.0 { 0.0 } else { x })
}

fn select(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &RELU);
    Ok(&*RELU)
}

pub fn register(registry: &mut OpRegistry) -> OnnxResult<()> {
    registry.register(
        Handler::builder("Relu")
            .version(6, select)
            .version(13, select)
            .version(14, select)
            .build()?,
    )
}
