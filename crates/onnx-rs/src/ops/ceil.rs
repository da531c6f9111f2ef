//! `Ceil`: elementwise ceiling. Opset 6 and 13 share one implementation.

use once_cell::sync::Lazy;

use super::adapter::update_node_attrs_dict;
use super::common::compile_unary;
use super::function::{Arity, CompiledKernel, KernelKey, OpFunction};
use super::registry::{Handler, OpRegistry};
use crate::error::OnnxResult;
use crate::onnx::OnnxNode;
use crate::tensor::Value;

pub static CEIL: Lazy<OpFunction> = Lazy::new(|| OpFunction::new("Ceil", Arity::Exact(1), &[], compile));

fn compile(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    compile_unary("Ceil", key, f32::ceil)
}

fn version_6(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &CEIL);
    Ok(&*CEIL)
}

fn version_13(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &CEIL);
    Ok(&*CEIL)
}

pub fn register(registry: &mut OpRegistry) -> OnnxResult<()> {
    registry.register(
        Handler::builder("Ceil")
            .version(6, version_6)
            .version(13, version_13)
            .build()?,
    )
}
