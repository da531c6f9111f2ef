pub mod backend;
pub mod config;
mod env;
pub mod error;
pub mod export;
pub mod onnx;
pub mod ops;
pub mod tensor;

pub use config::RuntimeConfig;
pub use error::{ErrorKind, OnnxError, OnnxResult};
pub use onnx::{AttrValue, OnnxNode};
pub use ops::{default_registry, OpRegistry};
pub use tensor::{DType, Shape, Tensor, Value};
