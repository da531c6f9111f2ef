//! Host-backed tensor used for operator inputs, attribute payloads, and artifact literals.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{dtype::DType, shape::Shape};
use crate::backend::spec::{TensorLiteral, TensorSpec};
use crate::error::{OnnxError, OnnxResult};

/// Typed element storage of a [`Tensor`].
#[derive(Debug, Clone)]
pub enum TensorData {
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::F32(values) => values.len(),
            TensorData::I64(values) => values.len(),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::I64(_) => DType::I64,
        }
    }
}

/// Dense row-major host tensor.
///
/// Equality and hashing compare float payloads bit-for-bit so tensors can take part in
/// compiled-kernel cache keys when they appear as static attributes.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Shape,
    data: TensorData,
}

impl Tensor {
    /// Constructs an `F32` tensor from raw values, validating the length against the shape.
    pub fn from_vec(shape: impl Into<Shape>, data: Vec<f32>) -> OnnxResult<Self> {
        Self::new(shape.into(), TensorData::F32(data))
    }

    /// Constructs an `I64` tensor, ensuring the payload matches the expected element count.
    pub fn from_i64(shape: impl Into<Shape>, data: Vec<i64>) -> OnnxResult<Self> {
        Self::new(shape.into(), TensorData::I64(data))
    }

    fn new(shape: Shape, data: TensorData) -> OnnxResult<Self> {
        if data.len() != shape.num_elements() {
            return Err(OnnxError::invalid_argument(
                "Tensor",
                format!(
                    "tensor data length ({}) does not match shape {:?}",
                    data.len(),
                    shape.dims()
                ),
            ));
        }
        Ok(Tensor { shape, data })
    }

    /// Rank-0 `F32` tensor.
    pub fn scalar(value: f32) -> Self {
        Tensor {
            shape: Shape::scalar(),
            data: TensorData::F32(vec![value]),
        }
    }

    /// Returns a zero-initialized `F32` tensor of the requested shape.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let len = shape.num_elements();
        Tensor {
            shape,
            data: TensorData::F32(vec![0.0; len]),
        }
    }

    /// One-dimensional `F32` tensor.
    pub fn vector(values: Vec<f32>) -> Self {
        Tensor {
            shape: Shape::new(vec![values.len()]),
            data: TensorData::F32(values),
        }
    }

    /// One-dimensional `I64` tensor.
    pub fn vector_i64(values: Vec<i64>) -> Self {
        Tensor {
            shape: Shape::new(vec![values.len()]),
            data: TensorData::I64(values),
        }
    }

    /// Returns the total number of elements stored in the tensor.
    pub fn len(&self) -> usize {
        self.shape.num_elements()
    }

    /// Reports whether the tensor contains zero elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Provides access to the tensor shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the scalar dtype of the tensor payload.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Shape and dtype signature of the tensor.
    pub fn spec(&self) -> TensorSpec {
        TensorSpec::new(self.dtype(), self.shape.clone())
    }

    pub fn storage(&self) -> &TensorData {
        &self.data
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            TensorData::I64(values) => Some(values),
            _ => None,
        }
    }

    /// Borrows the underlying `f32` data slice, panicking if the dtype differs.
    pub fn data(&self) -> &[f32] {
        self.as_f32().expect("tensor data is not stored as f32")
    }

    /// Borrows the underlying `i64` data slice, panicking if the dtype differs.
    pub fn data_i64(&self) -> &[i64] {
        self.as_i64().expect("tensor data is not stored as i64")
    }

    /// Converts the payload to `f64` values regardless of the stored dtype.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            TensorData::F32(values) => values.iter().map(|&v| v as f64).collect(),
            TensorData::I64(values) => values.iter().map(|&v| v as f64).collect(),
        }
    }

    /// Applies a unary function over every `f32` element, producing a new tensor.
    pub fn map_f32<F>(&self, f: F) -> Option<Tensor>
    where
        F: Fn(f32) -> f32,
    {
        let values = self.as_f32()?;
        Some(Tensor {
            shape: self.shape.clone(),
            data: TensorData::F32(values.iter().map(|&x| f(x)).collect()),
        })
    }

    /// Wraps the tensor in a byte-level literal for artifact serialization.
    pub fn to_literal(&self) -> TensorLiteral {
        let bytes: Vec<u8> = match &self.data {
            TensorData::F32(values) => bytemuck::cast_slice::<_, u8>(values.as_slice()).to_vec(),
            TensorData::I64(values) => bytemuck::cast_slice::<_, u8>(values.as_slice()).to_vec(),
        };
        TensorLiteral::new(self.spec(), Arc::from(bytes.into_boxed_slice()))
    }

    /// Reconstructs a host tensor from a literal.
    pub fn from_literal(literal: &TensorLiteral) -> OnnxResult<Self> {
        let spec = &literal.spec;
        let expected = spec.checked_byte_len().ok_or_else(|| {
            OnnxError::invalid_argument("Tensor", format!("literal shape {spec} is too large"))
        })?;
        if literal.bytes.len() != expected {
            return Err(OnnxError::invalid_argument(
                "Tensor",
                format!(
                    "literal byte length {} does not match expected {}",
                    literal.bytes.len(),
                    expected
                ),
            ));
        }
        let data = match spec.dtype {
            DType::F32 => TensorData::F32(bytemuck::pod_collect_to_vec(&literal.bytes[..])),
            DType::I64 => TensorData::I64(bytemuck::pod_collect_to_vec(&literal.bytes[..])),
        };
        Self::new(spec.shape.clone(), data)
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape {
            return false;
        }
        match (&self.data, &other.data) {
            (TensorData::F32(a), TensorData::F32(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (TensorData::I64(a), TensorData::I64(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Tensor {}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        self.dtype().hash(state);
        match &self.data {
            TensorData::F32(values) => {
                for value in values {
                    value.to_bits().hash(state);
                }
            }
            TensorData::I64(values) => values.hash(state),
        }
    }
}

impl Serialize for Tensor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_literal().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let literal = TensorLiteral::deserialize(deserializer)?;
        Tensor::from_literal(&literal).map_err(serde::de::Error::custom)
    }
}
