//! Enumerates the scalar element types carried by host tensors and artifact signatures.

use serde::{Deserialize, Serialize};

/// Logical dtype identifier shared between host tensors, literals, and exported signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit floating point following IEEE-754 semantics.
    F32,
    /// 64-bit signed integer, used for ONNX index inputs such as `axes`.
    I64,
}

impl DType {
    /// Returns the number of bytes required per scalar element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::I64 => 8,
        }
    }
}
