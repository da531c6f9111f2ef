//! Builds the call-ready attribute set for a selected implementation.

use super::function::OpFunction;
use crate::onnx::{AttrValue, OnnxNode};
use crate::tensor::{DType, Value};

/// Rebuilds `node.attrs_dict` from the function's declared parameters.
///
/// Every declared parameter ends up present: the node's value if it declared one, else the
/// schema default, else `None`. Keys from a previous dispatch are dropped first, so running
/// this twice, or after a dispatch at a different version, leaves only the current schema.
pub fn update_node_attrs_dict(node: &mut OnnxNode, function: &OpFunction) {
    node.attrs_dict.clear();
    for param in function.params() {
        let value = node
            .attrs
            .get(param.name)
            .cloned()
            .or_else(|| param.default.to_value());
        node.attrs_dict.insert(param.name.to_string(), value);
    }
}

/// An omitted optional input or a tensor with zero elements.
pub fn is_empty_input(value: &Value) -> bool {
    match value {
        Value::None => true,
        Value::Tensor(tensor) => tensor.is_empty(),
    }
}

/// Copies a non-empty runtime input into `attrs_dict[name]` as a static attribute.
///
/// Floats become [`AttrValue::Floats`] and integers [`AttrValue::Ints`]. Absent or empty
/// inputs leave the existing entry untouched. Returns whether an entry was written.
pub fn promote_input_to_attr(node: &mut OnnxNode, inputs: &[Value], index: usize, name: &str) -> bool {
    let Some(tensor) = inputs.get(index).and_then(Value::as_tensor) else {
        return false;
    };
    if tensor.is_empty() {
        return false;
    }
    let value = match tensor.dtype() {
        DType::F32 => AttrValue::Floats(tensor.data().to_vec()),
        DType::I64 => AttrValue::Ints(tensor.data_i64().to_vec()),
    };
    node.attrs_dict.insert(name.to_string(), Some(value));
    true
}
