//! Core tensor abstractions shared by operator implementations and the export layer.
//!
//! The module defines host tensors, shapes, dtypes, and the positional [`Value`] wrapper that
//! the graph engine hands to dispatched operators (absent optional inputs are `Value::None`).

pub mod dtype;
mod host_tensor;
pub mod shape;
mod value;

pub use dtype::DType;
pub use host_tensor::{Tensor, TensorData};
pub use shape::Shape;
pub use value::Value;
