use std::sync::Arc;

use onnx_rs::error::{ErrorKind, OnnxResult};
use onnx_rs::onnx::AttrsDict;
use onnx_rs::ops::{default_registry, Arity, CompiledKernel, KernelKey, OpFunction};
use onnx_rs::{AttrValue, OnnxNode, Tensor, Value};
use onnx_rs_test_utils::{arange_f32, assert_close, assert_tensors_close, random_tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn run(op: &str, version: u32, inputs: Vec<Tensor>) -> OnnxResult<Vec<Tensor>> {
    let mut node = OnnxNode::new(op, version);
    let inputs: Vec<Value> = inputs.into_iter().map(Value::from).collect();
    default_registry().run(&mut node, &inputs)
}

#[test]
fn ceil_versions_agree() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let x = random_tensor(&mut rng, [3, 5]);
    let v6 = run("Ceil", 6, vec![x.clone()])?;
    let v13 = run("Ceil", 13, vec![x.clone()])?;
    assert_eq!(v6, v13);

    let expected: Vec<f32> = x.data().iter().map(|v| v.ceil()).collect();
    assert_eq!(v13[0].data(), expected.as_slice());
    assert_eq!(v13[0].shape().dims(), &[3, 5]);
    Ok(())
}

#[test]
fn ceil_8x4_fractional_input_matches_across_versions() -> anyhow::Result<()> {
    let x = arange_f32([8, 4]).map_f32(|v| v * 0.37 - 5.1).expect("f32 input");
    let v6 = run("Ceil", 6, vec![x.clone()])?;
    let v13 = run("Ceil", 13, vec![x.clone()])?;
    assert_eq!(v6, v13);
    assert_eq!(v13[0].shape().dims(), &[8, 4]);

    let expected: Vec<f32> = x.data().iter().map(|v| v.ceil()).collect();
    assert_eq!(v6[0].data(), expected.as_slice());
    assert_ne!(v6[0].data(), x.data());
    Ok(())
}

#[test]
fn ceil_v6_and_v13_share_one_function() -> anyhow::Result<()> {
    let inputs = [Value::from(Tensor::scalar(0.5))];
    let mut a = OnnxNode::new("Ceil", 6);
    let mut b = OnnxNode::new("Ceil", 13);
    let fa = default_registry().dispatch(&mut a, &inputs)?;
    let fb = default_registry().dispatch(&mut b, &inputs)?;
    assert!(std::ptr::eq(fa, fb));
    assert!(a.attrs_dict.is_empty());
    Ok(())
}

#[test]
fn ceil_rejects_extra_inputs() {
    let err = run("Ceil", 13, vec![Tensor::scalar(1.0), Tensor::scalar(2.0)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arity);
    assert!(err.to_string().contains("Ceil"));

    let err = run("Ceil", 13, Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arity);
}

#[test]
fn unary_ops_match_scalar_functions() -> anyhow::Result<()> {
    let x = Tensor::vector(vec![-2.5, -0.0, 0.75, 3.0]);
    let abs = run("Abs", 13, vec![x.clone()])?;
    assert_eq!(abs[0].data(), &[2.5, 0.0, 0.75, 3.0]);

    let relu = run("Relu", 14, vec![x.clone()])?;
    assert_eq!(relu[0].data(), &[0.0, 0.0, 0.75, 3.0]);

    let sin = run("Sin", 7, vec![x.clone()])?;
    let expected: Vec<f32> = x.data().iter().map(|v| v.sin()).collect();
    assert_close(&expected, sin[0].data());
    Ok(())
}

#[test]
fn relu_propagates_nan() -> anyhow::Result<()> {
    let out = run("Relu", 14, vec![Tensor::vector(vec![f32::NAN, -1.0, 2.0])])?;
    let data = out[0].data();
    assert!(data[0].is_nan());
    assert_eq!(&data[1..], &[0.0, 2.0]);
    Ok(())
}

#[test]
fn unary_ops_reject_integer_inputs() {
    let err = run("Sin", 7, vec![Tensor::vector_i64(vec![1, 2])]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn add_broadcasts_trailing_axes() -> anyhow::Result<()> {
    let a = arange_f32([2, 3]);
    let b = Tensor::vector(vec![10.0, 20.0, 30.0]);
    let out = run("Add", 14, vec![a, b])?;
    let expected = Tensor::from_vec([2, 3], vec![10.0, 21.0, 32.0, 13.0, 24.0, 35.0])?;
    assert_tensors_close(&expected, &out[0]);

    let col = Tensor::from_vec([2, 1], vec![1.0, 2.0])?;
    let row = Tensor::from_vec([1, 3], vec![0.0, 10.0, 20.0])?;
    let out = run("Add", 7, vec![col, row])?;
    assert_eq!(out[0].shape().dims(), &[2, 3]);
    assert_eq!(out[0].data(), &[1.0, 11.0, 21.0, 2.0, 12.0, 22.0]);
    Ok(())
}

#[test]
fn add_supports_int64() -> anyhow::Result<()> {
    let out = run(
        "Add",
        13,
        vec![Tensor::vector_i64(vec![1, 2]), Tensor::vector_i64(vec![40, 50])],
    )?;
    assert_eq!(out[0].data_i64(), &[41, 52]);
    Ok(())
}

#[test]
fn add_rejects_incompatible_shapes() {
    let err = run("Add", 14, vec![arange_f32([2, 3]), arange_f32([4])]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

fn compile_scale(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    let factor = key
        .attrs
        .get("factor")
        .and_then(|v| v.as_ref())
        .and_then(AttrValue::as_float)
        .unwrap_or(1.0);
    Ok(CompiledKernel::new(key, move |inputs| {
        let x = inputs[0].as_tensor().expect("present input");
        Ok(vec![x.map_f32(|v| v * factor).expect("f32 input")])
    }))
}

#[test]
fn kernels_are_memoized_per_static_signature() -> anyhow::Result<()> {
    let function = OpFunction::with_cache_capacity(
        "Scale",
        Arity::Exact(1),
        &[],
        compile_scale,
        4,
    );
    let mut attrs = AttrsDict::new();
    attrs.insert("factor".into(), Some(AttrValue::Float(2.0)));
    let x = [Value::from(Tensor::vector(vec![1.0, 2.0]))];

    let first = function.call(&x, &attrs)?;
    let second = function.call(&x, &attrs)?;
    assert_eq!(first, second);
    assert_eq!(first[0].data(), &[2.0, 4.0]);
    assert_eq!(function.compile_count(), 1);

    // a different input shape is a new signature
    function.call(&[Value::from(Tensor::vector(vec![1.0, 2.0, 3.0]))], &attrs)?;
    assert_eq!(function.compile_count(), 2);

    // so is a different attribute value
    attrs.insert("factor".into(), Some(AttrValue::Float(3.0)));
    let tripled = function.call(&x, &attrs)?;
    assert_eq!(tripled[0].data(), &[3.0, 6.0]);
    assert_eq!(function.compile_count(), 3);
    assert_eq!(function.cached_variants(), 3);

    // same signature, different values: no recompilation
    function.call(&[Value::from(Tensor::vector(vec![5.0, 6.0]))], &attrs)?;
    assert_eq!(function.compile_count(), 3);
    Ok(())
}

#[test]
fn kernel_cache_evicts_least_recently_used() -> anyhow::Result<()> {
    let function = OpFunction::with_cache_capacity("Scale", Arity::Exact(1), &[], compile_scale, 2);
    let attrs = AttrsDict::new();
    for len in 1..=3 {
        function.call(&[Value::from(Tensor::zeros([len]))], &attrs)?;
    }
    assert_eq!(function.cached_variants(), 2);
    function.call(&[Value::from(Tensor::zeros([1]))], &attrs)?;
    assert_eq!(function.compile_count(), 4);
    Ok(())
}

#[test]
fn builtin_ops_reuse_compiled_kernels() -> anyhow::Result<()> {
    let x = Tensor::from_vec([7, 3, 2], vec![1.0; 42])?;
    run("Relu", 13, vec![x.clone()])?;
    run("Relu", 6, vec![x.clone()])?;

    let function = &*onnx_rs::ops::relu::RELU;
    let key = KernelKey::new(AttrsDict::new(), &[Value::from(x)]);
    let first = function.kernel_for(key.clone())?;
    let second = function.kernel_for(key)?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}
