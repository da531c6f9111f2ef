//! Operator dispatch: the handler registry, the attribute adapter, implementation functions,
//! and the built-in ONNX operators.

pub mod abs;
pub mod adapter;
pub mod add;
pub mod ceil;
pub(crate) mod common;
pub mod function;
pub mod reduce_sum;
pub mod registry;
pub mod relu;
pub mod resize;
pub mod sin;

pub use adapter::{is_empty_input, update_node_attrs_dict};
pub use function::{Arity, CompileFn, CompiledKernel, KernelKey, OpFunction};
pub use registry::{default_registry, Handler, HandlerBuilder, OpRegistry, RegisterMode, VersionFn};

use crate::error::OnnxResult;

/// Startup registration sequence for the built-in operators.
pub fn register_default_ops(registry: &mut OpRegistry) -> OnnxResult<()> {
    abs::register(registry)?;
    add::register(registry)?;
    ceil::register(registry)?;
    reduce_sum::register(registry)?;
    relu::register(registry)?;
    resize::register(registry)?;
    sin::register(registry)?;
    Ok(())
}
