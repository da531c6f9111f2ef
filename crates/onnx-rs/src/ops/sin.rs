use once_cell::sync::Lazy;

use super::adapter::update_node_attrs_dict;
use super::common::compile_unary;
use super::function::{Arity, CompiledKernel, KernelKey, OpFunction};
use super::registry::{Handler, OpRegistry};
use crate::error::OnnxResult;
use crate::onnx::OnnxNode;
use crate::tensor::Value;

pub static SIN: Lazy<OpFunction> = Lazy::new(|| OpFunction::new("Sin", Arity::Exact(1), &[], compile));

fn compile(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    compile_unary("Sin", key, f32::sin)
}

fn version_7(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &SIN);
    Ok(&*SIN)
}

pub fn register(registry: &mut OpRegistry) -> OnnxResult<()> {
    registry.register(Handler::builder("Sin").version(7, version_7).build()?)
}
