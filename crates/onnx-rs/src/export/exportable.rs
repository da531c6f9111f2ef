//! Tracing a function of ONNX operator calls into a portable [`Program`].
//!
//! Tracing evaluates the function once on the example inputs. Every operator call goes
//! through the registry, so output signatures come from the real implementations, and is
//! recorded as an [`Instruction`](crate::backend::spec::Instruction). Only signatures of
//! the example inputs end up in the artifact; tensors created inside the traced function
//! are captured as literal operands.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::exported::Exported;
use crate::backend::spec::{opset_imports, Operand, ProgramBuilder, TensorSpec, ValueId};
use crate::config::RuntimeConfig;
use crate::error::{OnnxError, OnnxResult};
use crate::onnx::{AttrValue, Attributes, OnnxNode};
use crate::ops::OpRegistry;
use crate::tensor::{Tensor, Value};

/// Value flowing through a trace: a program value or a captured constant, together with
/// its concrete trace-time contents.
#[derive(Debug, Clone)]
pub struct Traced {
    operand: Operand,
    value: Tensor,
}

impl Traced {
    pub fn spec(&self) -> TensorSpec {
        self.value.spec()
    }

    /// Contents observed while tracing.
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    fn value_id(&self) -> Option<ValueId> {
        match self.operand {
            Operand::Value(id) => Some(id),
            _ => None,
        }
    }
}

pub struct TraceContext<'r> {
    registry: &'r OpRegistry,
    builder: ProgramBuilder,
}

impl<'r> TraceContext<'r> {
    fn new(registry: &'r OpRegistry) -> Self {
        Self {
            registry,
            builder: ProgramBuilder::new(),
        }
    }

    fn parameter(&mut self, tensor: &Tensor) -> Traced {
        let id = self.builder.add_parameter(tensor.spec());
        Traced {
            operand: Operand::Value(id),
            value: tensor.clone(),
        }
    }

    /// Captures `tensor` as a literal operand.
    pub fn constant(&mut self, tensor: Tensor) -> Traced {
        Traced {
            operand: Operand::Literal(tensor.to_literal()),
            value: tensor,
        }
    }

    /// Starts an operator call at `opset_version`.
    pub fn node(&mut self, op_type: impl Into<String>, opset_version: u32) -> NodeBuilder<'_, 'r> {
        NodeBuilder {
            ctx: self,
            op_type: op_type.into(),
            opset_version,
            attrs: Attributes::new(),
            operands: Vec::new(),
            inputs: Vec::new(),
        }
    }
}

/// One operator call being assembled inside a trace.
pub struct NodeBuilder<'c, 'r> {
    ctx: &'c mut TraceContext<'r>,
    op_type: String,
    opset_version: u32,
    attrs: Attributes,
    operands: Vec<Operand>,
    inputs: Vec<Value>,
}

impl NodeBuilder<'_, '_> {
    pub fn input(mut self, value: &Traced) -> Self {
        self.operands.push(value.operand.clone());
        self.inputs.push(Value::Tensor(value.value.clone()));
        self
    }

    /// Omitted optional input.
    pub fn absent(mut self) -> Self {
        self.operands.push(Operand::Absent);
        self.inputs.push(Value::None);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Evaluates the call through the registry and records it.
    pub fn finish(self) -> OnnxResult<Vec<Traced>> {
        let mut node = OnnxNode::new(self.op_type.clone(), self.opset_version);
        node.attrs = self.attrs.clone();
        let outputs = self.ctx.registry.run(&mut node, &self.inputs)?;
        let ids = self.ctx.builder.emit(
            self.op_type,
            self.opset_version,
            self.attrs,
            self.operands,
            outputs.iter().map(Tensor::spec).collect(),
        );
        Ok(ids
            .into_iter()
            .zip(outputs)
            .map(|(id, value)| Traced {
                operand: Operand::Value(id),
                value,
            })
            .collect())
    }

    /// [`finish`](Self::finish) for single-output operators.
    pub fn finish_one(self) -> OnnxResult<Traced> {
        let op = self.op_type.clone();
        let mut outputs = self.finish()?;
        if outputs.len() != 1 {
            return Err(OnnxError::invalid_argument(
                op,
                format!("expected a single output, got {}", outputs.len()),
            ));
        }
        Ok(outputs.remove(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub function_name: String,
    pub nr_devices: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            function_name: "main".to_string(),
            nr_devices: 1,
        }
    }
}

type TraceFn = dyn Fn(&mut TraceContext<'_>, &[Traced]) -> OnnxResult<Vec<Traced>> + Send + Sync;

/// A function plus the example inputs and target platforms it will be exported for.
pub struct Exportable {
    func: Box<TraceFn>,
    example_inputs: Vec<Tensor>,
    options: ExportOptions,
    platforms: Vec<String>,
}

impl Exportable {
    /// An empty `platforms` list exports for [`RuntimeConfig::default_platforms`].
    pub fn new<F>(
        func: F,
        example_inputs: Vec<Tensor>,
        options: ExportOptions,
        platforms: Vec<String>,
    ) -> Self
    where
        F: Fn(&mut TraceContext<'_>, &[Traced]) -> OnnxResult<Vec<Traced>> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
            example_inputs,
            options,
            platforms,
        }
    }

    pub fn example_inputs(&self) -> &[Tensor] {
        &self.example_inputs
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn export(&self, registry: &OpRegistry) -> OnnxResult<Exported> {
        let name = self.options.function_name.clone();
        let mut ctx = TraceContext::new(registry);
        let params: Vec<Traced> = self
            .example_inputs
            .iter()
            .map(|tensor| ctx.parameter(tensor))
            .collect();
        let outputs = (self.func)(&mut ctx, &params)?;

        let mut result_ids = Vec::with_capacity(outputs.len());
        for (index, output) in outputs.iter().enumerate() {
            let id = output.value_id().ok_or_else(|| {
                OnnxError::invalid_argument(
                    name.clone(),
                    format!("result {index} is a constant, not a traced value"),
                )
            })?;
            result_ids.push(id);
        }

        let in_avals: Vec<TensorSpec> = self.example_inputs.iter().map(Tensor::spec).collect();
        let out_avals: Vec<TensorSpec> = outputs.iter().map(Traced::spec).collect();
        let module = ctx.builder.finish(name.clone(), result_ids).ok_or_else(|| {
            OnnxError::invalid_argument(name.clone(), "a result does not refer to a traced value")
        })?;
        let platforms = if self.platforms.is_empty() {
            RuntimeConfig::global().default_platforms.clone()
        } else {
            self.platforms.iter().map(|p| p.to_ascii_lowercase()).collect()
        };
        let opset_imports: BTreeMap<String, u32> = opset_imports(&module);

        tracing::info!(
            function = %name,
            instructions = module.body.len(),
            ?platforms,
            "exported traced function"
        );
        Ok(Exported {
            function_name: name,
            in_avals,
            out_avals,
            platforms,
            nr_devices: self.options.nr_devices,
            opset_imports,
            module,
        })
    }
}

impl fmt::Debug for Exportable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exportable")
            .field("example_inputs", &self.example_inputs.len())
            .field("options", &self.options)
            .field("platforms", &self.platforms)
            .finish()
    }
}
