use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use once_cell::sync::Lazy;
use onnx_rs::error::{ErrorKind, OnnxError, OnnxResult};
use onnx_rs::ops::{
    default_registry, update_node_attrs_dict, Arity, CompiledKernel, Handler, KernelKey,
    OpFunction, OpRegistry,
};
use onnx_rs::{OnnxNode, Tensor, Value};
use proptest::prelude::*;

static PASSTHROUGH: Lazy<OpFunction> =
    Lazy::new(|| OpFunction::new("Passthrough", Arity::Exact(1), &[], compile_passthrough));

static PASSTHROUGH_V2: Lazy<OpFunction> =
    Lazy::new(|| OpFunction::new("Passthrough-2", Arity::Exact(1), &[], compile_passthrough));

fn compile_passthrough(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    Ok(CompiledKernel::new(key, |inputs| {
        Ok(inputs.iter().filter_map(Value::as_tensor).cloned().collect())
    }))
}

fn select_passthrough(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &PASSTHROUGH);
    Ok(&*PASSTHROUGH)
}

fn select_passthrough_v2(node: &mut OnnxNode, _inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &PASSTHROUGH_V2);
    Ok(&*PASSTHROUGH_V2)
}

fn handler_with_versions(op: &str, versions: &BTreeSet<u32>) -> Handler {
    versions
        .iter()
        .fold(Handler::builder(op), |builder, &v| builder.version(v, select_passthrough))
        .build()
        .expect("distinct versions")
}

#[test]
fn default_registry_lists_builtin_operators() {
    let registry = default_registry();
    for op in ["Abs", "Add", "Ceil", "ReduceSum", "Relu", "Resize", "Sin"] {
        assert!(registry.contains(op), "{op} missing");
    }
    assert_eq!(registry.versions("Ceil"), Some(vec![6, 13]));
    assert_eq!(registry.versions("Resize"), Some(vec![10, 11, 13, 18, 19]));
    assert!(registry.versions("Conv").is_none());
}

#[test]
fn dispatch_selects_greatest_version_not_above_request() -> anyhow::Result<()> {
    let registry = default_registry();
    assert_eq!(registry.resolve_version("Ceil", 6)?, 6);
    assert_eq!(registry.resolve_version("Ceil", 12)?, 6);
    assert_eq!(registry.resolve_version("Ceil", 13)?, 13);
    assert_eq!(registry.resolve_version("Ceil", 21)?, 13);
    assert_eq!(registry.resolve_version("Resize", 17)?, 13);
    assert_eq!(registry.resolve_version("Resize", 19)?, 19);
    Ok(())
}

#[test]
fn version_below_all_registered_is_rejected() {
    let mut node = OnnxNode::new("Ceil", 5);
    let inputs = [Value::from(Tensor::vector(vec![1.5]))];
    let err = default_registry().dispatch(&mut node, &inputs).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dispatch);
    match err {
        OnnxError::UnsupportedVersion {
            op,
            requested,
            available,
        } => {
            assert_eq!(op, "Ceil");
            assert_eq!(requested, 5);
            assert_eq!(available, vec![6, 13]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unknown_operator_is_a_dispatch_error() {
    let mut node = OnnxNode::new("NotAnOp", 13);
    let err = default_registry().dispatch(&mut node, &[]).unwrap_err();
    assert!(matches!(err, OnnxError::UnknownOperator { ref op } if op == "NotAnOp"));
    assert_eq!(err.kind(), ErrorKind::Dispatch);
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = OpRegistry::new();
    let versions = BTreeSet::from([1]);
    registry
        .register(handler_with_versions("Passthrough", &versions))
        .unwrap();
    let err = registry
        .register(handler_with_versions("Passthrough", &versions))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("Passthrough"));
}

#[test]
fn builtin_operators_cannot_be_registered_twice() {
    let mut registry = OpRegistry::with_default_ops().unwrap();
    let err = onnx_rs::ops::ceil::register(&mut registry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn override_replaces_existing_handler() -> anyhow::Result<()> {
    let mut registry = OpRegistry::new();
    registry.register(handler_with_versions("Passthrough", &BTreeSet::from([1])))?;
    registry.register_override(
        Handler::builder("Passthrough")
            .version(2, select_passthrough_v2)
            .build()?,
    )?;
    assert_eq!(registry.versions("Passthrough"), Some(vec![2]));

    let mut node = OnnxNode::new("Passthrough", 5);
    let function = registry.dispatch(&mut node, &[Value::from(Tensor::scalar(1.0))])?;
    assert_eq!(function.name(), "Passthrough-2");
    Ok(())
}

#[test]
fn handler_builder_rejects_duplicate_and_empty_versions() {
    let err = Handler::builder("Dup")
        .version(7, select_passthrough)
        .version(7, select_passthrough_v2)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains('7'));

    let err = Handler::builder("Empty").build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn run_dispatches_and_executes() -> anyhow::Result<()> {
    let mut node = OnnxNode::new("Ceil", 13);
    let outputs = default_registry().run(&mut node, &[Value::from(Tensor::vector(vec![0.2, -1.5]))])?;
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].data(), &[1.0, -1.0]);
    Ok(())
}

#[test]
fn concurrent_dispatch_on_shared_registry() {
    let registry = Arc::new(OpRegistry::with_default_ops().unwrap());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let version = if i % 2 == 0 { 6 } else { 13 };
                let mut node = OnnxNode::new("Abs", version);
                let x = Tensor::vector(vec![-(i as f32), 2.0]);
                registry.run(&mut node, &[Value::from(x)]).unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let out = handle.join().unwrap();
        assert_eq!(out[0].data(), &[i as f32, 2.0]);
    }
}

proptest! {
    #[test]
    fn resolved_version_is_floor_of_registered_set(
        versions in prop::collection::btree_set(1u32..40, 1..6),
        requested in 0u32..50,
    ) {
        let mut registry = OpRegistry::new();
        registry.register(handler_with_versions("Floor", &versions)).unwrap();
        let expected = versions.iter().copied().filter(|&v| v <= requested).max();
        match (registry.resolve_version("Floor", requested), expected) {
            (Ok(resolved), Some(expected)) => prop_assert_eq!(resolved, expected),
            (Err(err), None) => prop_assert_eq!(err.kind(), ErrorKind::Dispatch),
            (got, want) => prop_assert!(false, "resolved {:?}, expected {:?}", got, want),
        }
    }
}
