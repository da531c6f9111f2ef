use onnx_rs::error::{ErrorKind, OnnxError};
use onnx_rs::ops::default_registry;
use onnx_rs::{OnnxNode, OnnxResult, Tensor, Value};
use onnx_rs_test_utils::{arange_f32, assert_close, assert_close_tol, random_tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn resize(node: OnnxNode, x: Tensor, scales: &[f32]) -> OnnxResult<Tensor> {
    let inputs = vec![
        Value::from(x),
        Value::None,
        Value::from(Tensor::vector(scales.to_vec())),
        Value::None,
    ];
    let mut node = node;
    let mut out = default_registry().run(&mut node, &inputs)?;
    Ok(out.remove(0))
}

/// Bilinear sample of a row-major `h x w` grid at fractional `(y, x)`, clamping to edges.
fn bilinear_at(data: &[f32], h: usize, w: usize, y: f64, x: f64) -> f32 {
    let y = y.clamp(0.0, (h - 1) as f64);
    let x = x.clamp(0.0, (w - 1) as f64);
    let (y0, x0) = (y.floor() as usize, x.floor() as usize);
    let (y1, x1) = ((y0 + 1).min(h - 1), (x0 + 1).min(w - 1));
    let (dy, dx) = (y - y0 as f64, x - x0 as f64);
    let at = |r: usize, c: usize| data[r * w + c] as f64;
    let top = at(y0, x0) * (1.0 - dx) + at(y0, x1) * dx;
    let bottom = at(y1, x0) * (1.0 - dx) + at(y1, x1) * dx;
    (top * (1.0 - dy) + bottom * dy) as f32
}

#[test]
fn nearest_upsample_8x4_by_2x2() -> anyhow::Result<()> {
    let x = arange_f32([8, 4]);
    let out = resize(OnnxNode::new("Resize", 13), x.clone(), &[2.0, 2.0])?;
    assert_eq!(out.shape().dims(), &[16, 8]);

    // half_pixel + round_prefer_floor at an exact 2x upsample picks source index i / 2
    let src = x.data();
    let expected: Vec<f32> = (0..16)
        .flat_map(|i| (0..8).map(move |j| (i, j)))
        .map(|(i, j)| src[(i / 2) * 4 + j / 2])
        .collect();
    assert_eq!(out.data(), expected.as_slice());
    Ok(())
}

#[test]
fn linear_upsample_matches_bilinear_reference() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let x = random_tensor(&mut rng, [8, 4]);
    let node = OnnxNode::new("Resize", 13)
        .with_attr("mode", "linear")
        .with_attr("coordinate_transformation_mode", "align_corners");
    let out = resize(node, x.clone(), &[2.0, 2.0])?;
    assert_eq!(out.shape().dims(), &[16, 8]);

    let mut expected = Vec::with_capacity(16 * 8);
    for i in 0..16 {
        for j in 0..8 {
            let y = i as f64 * 7.0 / 15.0;
            let xx = j as f64 * 3.0 / 7.0;
            expected.push(bilinear_at(x.data(), 8, 4, y, xx));
        }
    }
    assert_close(&expected, out.data());
    Ok(())
}

#[test]
fn linear_half_pixel_clamps_edges() -> anyhow::Result<()> {
    let x = Tensor::from_vec([1, 2], vec![0.0, 10.0])?;
    let node = OnnxNode::new("Resize", 11).with_attr("mode", "linear");
    let out = resize(node, x, &[1.0, 2.0])?;
    assert_eq!(out.shape().dims(), &[1, 4]);
    assert_close(&[0.0, 2.5, 7.5, 10.0], out.data());
    Ok(())
}

#[test]
fn cubic_preserves_constant_images() -> anyhow::Result<()> {
    let x = Tensor::from_vec([4, 4], vec![3.5; 16])?;
    for exclude_outside in [0i64, 1] {
        let node = OnnxNode::new("Resize", 19)
            .with_attr("mode", "cubic")
            .with_attr("exclude_outside", exclude_outside);
        let out = resize(node, x.clone(), &[1.5, 2.0])?;
        assert_eq!(out.shape().dims(), &[6, 8]);
        assert_close_tol(&[3.5; 48], out.data(), 1e-5, 1e-5);
    }
    Ok(())
}

#[test]
fn downsample_floors_output_dims() -> anyhow::Result<()> {
    let out = resize(OnnxNode::new("Resize", 13), arange_f32([5, 3]), &[0.5, 1.0])?;
    assert_eq!(out.shape().dims(), &[2, 3]);
    Ok(())
}

#[test]
fn version_10_uses_asymmetric_floor_mapping() -> anyhow::Result<()> {
    let inputs = vec![
        Value::from(arange_f32([1, 6])),
        Value::from(Tensor::vector(vec![1.0, 0.5])),
    ];
    let mut node = OnnxNode::new("Resize", 10);
    let out = default_registry().run(&mut node, &inputs)?;
    assert_eq!(out[0].shape().dims(), &[1, 3]);
    assert_eq!(out[0].data(), &[0.0, 2.0, 4.0]);
    Ok(())
}

#[test]
fn version_18_axes_select_scaled_dimensions() -> anyhow::Result<()> {
    let node = OnnxNode::new("Resize", 18).with_attr("axes", vec![-1i64]);
    let out = resize(node, arange_f32([2, 2]), &[2.0])?;
    assert_eq!(out.shape().dims(), &[2, 4]);
    assert_eq!(out.data(), &[0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    Ok(())
}

#[test]
fn non_empty_roi_is_rejected_by_name() {
    let inputs = vec![
        Value::from(arange_f32([8, 4])),
        Value::from(Tensor::vector(vec![0.0, 0.0, 1.0, 1.0])),
        Value::from(Tensor::vector(vec![2.0, 2.0])),
    ];
    let mut node = OnnxNode::new("Resize", 13);
    let err = default_registry().run(&mut node, &inputs).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    match err {
        OnnxError::UnsupportedFeature { op, feature } => {
            assert_eq!(op, "Resize");
            assert_eq!(feature, "roi");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn empty_roi_tensor_is_ignored() -> anyhow::Result<()> {
    let inputs = vec![
        Value::from(arange_f32([2, 2])),
        Value::from(Tensor::vector(Vec::new())),
        Value::from(Tensor::vector(vec![1.0, 2.0])),
    ];
    let mut node = OnnxNode::new("Resize", 13);
    let out = default_registry().run(&mut node, &inputs)?;
    assert_eq!(out[0].shape().dims(), &[2, 4]);
    Ok(())
}

#[test]
fn non_empty_sizes_is_rejected_by_name() {
    let inputs = vec![
        Value::from(arange_f32([2, 2])),
        Value::None,
        Value::None,
        Value::from(Tensor::vector_i64(vec![4, 4])),
    ];
    let mut node = OnnxNode::new("Resize", 13);
    let err = default_registry().run(&mut node, &inputs).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    assert!(err.to_string().contains("sizes"));
}

#[test]
fn antialias_and_crop_modes_are_unsupported() {
    let node = OnnxNode::new("Resize", 18).with_attr("antialias", 1i64);
    let err = resize(node, arange_f32([2, 2]), &[2.0, 2.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);

    let node =
        OnnxNode::new("Resize", 13).with_attr("coordinate_transformation_mode", "tf_crop_and_resize");
    let err = resize(node, arange_f32([2, 2]), &[2.0, 2.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    assert!(err.to_string().contains("tf_crop_and_resize"));
}

#[test]
fn missing_or_malformed_scales_are_invalid() {
    let inputs = vec![Value::from(arange_f32([2, 2]))];
    let mut node = OnnxNode::new("Resize", 13);
    let err = default_registry().run(&mut node, &inputs).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = resize(OnnxNode::new("Resize", 13), arange_f32([2, 2]), &[2.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = resize(OnnxNode::new("Resize", 13), arange_f32([2, 2]), &[2.0, -1.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn unknown_mode_is_invalid() {
    let node = OnnxNode::new("Resize", 13).with_attr("mode", "lanczos");
    let err = resize(node, arange_f32([2, 2]), &[2.0, 2.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn huge_scales_are_rejected_instead_of_allocating() {
    for scales in [[1e20f32, 1.0], [1e18, 1.0], [3e9, 3e9]] {
        let err = resize(OnnxNode::new("Resize", 13), Tensor::zeros([2, 2]), &scales).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "scales {scales:?}");
    }
}
