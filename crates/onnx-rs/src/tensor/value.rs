use super::Tensor;
use crate::backend::spec::TensorSpec;

/// Positional operator input as delivered by the graph engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Omitted optional input (an empty input name in the serialized graph).
    None,
    Tensor(Tensor),
}

impl Value {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(tensor) => Some(tensor),
            Value::None => None,
        }
    }

    /// Signature of the input, `None` when the input is absent.
    pub fn spec(&self) -> Option<TensorSpec> {
        self.as_tensor().map(Tensor::spec)
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Value::Tensor(tensor)
    }
}

impl From<Option<Tensor>> for Value {
    fn from(tensor: Option<Tensor>) -> Self {
        tensor.map_or(Value::None, Value::Tensor)
    }
}
