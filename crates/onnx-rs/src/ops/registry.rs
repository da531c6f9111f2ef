//! Version-resolving operator handler registry.
//!
//! A [`Handler`] maps the opset versions at which an operator changed to a selector that
//! adapts the node's attributes and returns the implementation for that version. Lookup
//! picks the greatest registered version not newer than the one recorded on the node, so a
//! handler registered at versions 6 and 13 serves every request from 6 through 12 with the
//! version-6 selector.
//!
//! Registries are built once at startup (see [`OpRegistry::with_default_ops`]) and then
//! shared read-only.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use super::function::OpFunction;
use crate::error::{OnnxError, OnnxResult};
use crate::onnx::OnnxNode;
use crate::tensor::{Tensor, Value};

/// Version selector: adapts `node.attrs_dict` for the chosen implementation and returns it.
pub type VersionFn = fn(&mut OnnxNode, &[Value]) -> OnnxResult<&'static OpFunction>;

/// Immutable per-operator dispatch table.
#[derive(Clone)]
pub struct Handler {
    op_type: String,
    versions: BTreeMap<u32, VersionFn>,
}

impl Handler {
    pub fn builder(op_type: impl Into<String>) -> HandlerBuilder {
        HandlerBuilder {
            op_type: op_type.into(),
            versions: BTreeMap::new(),
            duplicate: None,
        }
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> Vec<u32> {
        self.versions.keys().copied().collect()
    }

    /// Greatest registered version `<= requested`.
    pub fn resolve(&self, requested: u32) -> Option<(u32, VersionFn)> {
        self.versions
            .range(..=requested)
            .next_back()
            .map(|(version, selector)| (*version, *selector))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("op_type", &self.op_type)
            .field("versions", &self.versions())
            .finish()
    }
}

pub struct HandlerBuilder {
    op_type: String,
    versions: BTreeMap<u32, VersionFn>,
    duplicate: Option<u32>,
}

impl HandlerBuilder {
    pub fn version(mut self, version: u32, selector: VersionFn) -> Self {
        if self.versions.insert(version, selector).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(version);
        }
        self
    }

    pub fn build(self) -> OnnxResult<Handler> {
        if let Some(version) = self.duplicate {
            return Err(OnnxError::configuration(
                self.op_type,
                format!("version {version} declared more than once"),
            ));
        }
        if self.versions.is_empty() {
            return Err(OnnxError::configuration(
                self.op_type,
                "handler declares no versions",
            ));
        }
        Ok(Handler {
            op_type: self.op_type,
            versions: self.versions,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterMode {
    /// Reject a handler whose operator name is already registered.
    Strict,
    /// Replace any existing handler for the operator.
    Override,
}

#[derive(Debug, Default, Clone)]
pub struct OpRegistry {
    handlers: BTreeMap<String, Handler>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in operator.
    pub fn with_default_ops() -> OnnxResult<Self> {
        let mut registry = Self::new();
        super::register_default_ops(&mut registry)?;
        Ok(registry)
    }

    pub fn register(&mut self, handler: Handler) -> OnnxResult<()> {
        self.register_with(handler, RegisterMode::Strict)
    }

    pub fn register_override(&mut self, handler: Handler) -> OnnxResult<()> {
        self.register_with(handler, RegisterMode::Override)
    }

    pub fn register_with(&mut self, handler: Handler, mode: RegisterMode) -> OnnxResult<()> {
        if mode == RegisterMode::Strict && self.handlers.contains_key(handler.op_type()) {
            return Err(OnnxError::configuration(
                handler.op_type(),
                "operator is already registered",
            ));
        }
        tracing::debug!(
            op = handler.op_type(),
            versions = ?handler.versions(),
            ?mode,
            "registered operator handler"
        );
        self.handlers.insert(handler.op_type.clone(), handler);
        Ok(())
    }

    pub fn contains(&self, op_type: &str) -> bool {
        self.handlers.contains_key(op_type)
    }

    pub fn handler(&self, op_type: &str) -> Option<&Handler> {
        self.handlers.get(op_type)
    }

    /// Registered operator names, sorted.
    pub fn op_types(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn versions(&self, op_type: &str) -> Option<Vec<u32>> {
        self.handlers.get(op_type).map(Handler::versions)
    }

    /// Version that would serve a request for `op_type` at `requested`.
    pub fn resolve_version(&self, op_type: &str, requested: u32) -> OnnxResult<u32> {
        self.lookup(op_type, requested).map(|(version, _)| version)
    }

    /// Selects the implementation for `node` and populates `node.attrs_dict` for it.
    pub fn dispatch(&self, node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
        let (resolved, selector) = self.lookup(&node.op_type, node.opset_version)?;
        tracing::debug!(
            op = %node.op_type,
            node = %node.name,
            requested = node.opset_version,
            resolved,
            "dispatching operator"
        );
        selector(node, inputs)
    }

    /// Dispatches `node` and runs the selected implementation on `inputs`.
    pub fn run(&self, node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<Vec<Tensor>> {
        let function = self.dispatch(node, inputs)?;
        function.call(inputs, &node.attrs_dict)
    }

    fn lookup(&self, op_type: &str, requested: u32) -> OnnxResult<(u32, VersionFn)> {
        let handler = self
            .handlers
            .get(op_type)
            .ok_or_else(|| OnnxError::UnknownOperator {
                op: op_type.to_string(),
            })?;
        handler
            .resolve(requested)
            .ok_or_else(|| OnnxError::UnsupportedVersion {
                op: op_type.to_string(),
                requested,
                available: handler.versions(),
            })
    }
}

static DEFAULT_REGISTRY: OnceLock<OpRegistry> = OnceLock::new();

/// Process-wide registry of built-in operators, built on first use.
pub fn default_registry() -> &'static OpRegistry {
    DEFAULT_REGISTRY.get_or_init(|| {
        OpRegistry::with_default_ops().expect("built-in operator handlers are conflict free")
    })
}
