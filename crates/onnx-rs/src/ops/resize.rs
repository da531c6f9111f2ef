//! `Resize` by scale factors.
//!
//! The selectors promote the runtime `scales` input into the static `scales` attribute, so a
//! compiled kernel is specialized to one interpolation mode, coordinate mapping, and scale
//! tuple. Compilation builds one tap table per axis (source indices and weights for every
//! output position) and the kernel applies them axis by axis.
//!
//! Region-of-interest and explicit-size resizing, antialiasing, and `tf_crop_and_resize`
//! are rejected at compile time.

use once_cell::sync::Lazy;

use super::adapter::{promote_input_to_attr, update_node_attrs_dict};
use super::common::{expect_dtype, f32_input, normalize_axis, required_spec};
use super::function::{Arity, CompiledKernel, KernelKey, OpFunction};
use super::registry::{Handler, OpRegistry};
use crate::error::{OnnxError, OnnxResult};
use crate::onnx::{AttrsDictExt, OnnxNode, Param, ParamDefault};
use crate::tensor::{DType, Shape, Tensor, Value};

const OP: &str = "Resize";

const V10_PARAMS: &[Param] = &[
    Param::new("mode", ParamDefault::Str("nearest")),
    Param::required("scales"),
];

const V11_PARAMS: &[Param] = &[
    Param::new("coordinate_transformation_mode", ParamDefault::Str("half_pixel")),
    Param::new("cubic_coeff_a", ParamDefault::Float(-0.75)),
    Param::new("exclude_outside", ParamDefault::Int(0)),
    Param::new("extrapolation_value", ParamDefault::Float(0.0)),
    Param::new("mode", ParamDefault::Str("nearest")),
    Param::new("nearest_mode", ParamDefault::Str("round_prefer_floor")),
    Param::required("scales"),
];

const V18_PARAMS: &[Param] = &[
    Param::new("antialias", ParamDefault::Int(0)),
    Param::required("axes"),
    Param::new("coordinate_transformation_mode", ParamDefault::Str("half_pixel")),
    Param::new("cubic_coeff_a", ParamDefault::Float(-0.75)),
    Param::new("exclude_outside", ParamDefault::Int(0)),
    Param::new("extrapolation_value", ParamDefault::Float(0.0)),
    Param::new("keep_aspect_ratio_policy", ParamDefault::Str("stretch")),
    Param::new("mode", ParamDefault::Str("nearest")),
    Param::new("nearest_mode", ParamDefault::Str("round_prefer_floor")),
    Param::required("scales"),
];

pub static RESIZE_10: Lazy<OpFunction> =
    Lazy::new(|| OpFunction::new("Resize-10", Arity::Exact(2), V10_PARAMS, compile_v10));

pub static RESIZE_11: Lazy<OpFunction> = Lazy::new(|| {
    OpFunction::new(
        "Resize-11",
        Arity::Range { min: 1, max: 4 },
        V11_PARAMS,
        compile_v11,
    )
});

pub static RESIZE_18: Lazy<OpFunction> = Lazy::new(|| {
    OpFunction::new(
        "Resize-18",
        Arity::Range { min: 1, max: 4 },
        V18_PARAMS,
        compile_v11,
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Nearest,
    Linear,
    Cubic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinateMode {
    HalfPixel,
    HalfPixelSymmetric,
    PytorchHalfPixel,
    AlignCorners,
    Asymmetric,
    TfHalfPixelForNn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NearestMode {
    RoundPreferFloor,
    RoundPreferCeil,
    Floor,
    Ceil,
}

#[derive(Debug, Clone, Copy)]
struct Sampling {
    mode: Mode,
    coordinates: CoordinateMode,
    nearest: NearestMode,
    cubic_coeff_a: f64,
    exclude_outside: bool,
}

fn parse_mode(value: &str, allow_cubic: bool) -> OnnxResult<Mode> {
    match value {
        "nearest" => Ok(Mode::Nearest),
        "linear" | "bilinear" => Ok(Mode::Linear),
        "cubic" | "bicubic" if allow_cubic => Ok(Mode::Cubic),
        other => Err(OnnxError::invalid_argument(
            OP,
            format!("unknown interpolation mode '{other}'"),
        )),
    }
}

fn parse_coordinate_mode(value: &str) -> OnnxResult<CoordinateMode> {
    match value {
        "half_pixel" => Ok(CoordinateMode::HalfPixel),
        "half_pixel_symmetric" => Ok(CoordinateMode::HalfPixelSymmetric),
        "pytorch_half_pixel" => Ok(CoordinateMode::PytorchHalfPixel),
        "align_corners" => Ok(CoordinateMode::AlignCorners),
        "asymmetric" => Ok(CoordinateMode::Asymmetric),
        "tf_half_pixel_for_nn" => Ok(CoordinateMode::TfHalfPixelForNn),
        "tf_crop_and_resize" => Err(OnnxError::unsupported_feature(
            OP,
            "coordinate_transformation_mode 'tf_crop_and_resize'",
        )),
        other => Err(OnnxError::invalid_argument(
            OP,
            format!("unknown coordinate_transformation_mode '{other}'"),
        )),
    }
}

fn parse_nearest_mode(value: &str) -> OnnxResult<NearestMode> {
    match value {
        "round_prefer_floor" => Ok(NearestMode::RoundPreferFloor),
        "round_prefer_ceil" => Ok(NearestMode::RoundPreferCeil),
        "floor" => Ok(NearestMode::Floor),
        "ceil" => Ok(NearestMode::Ceil),
        other => Err(OnnxError::invalid_argument(
            OP,
            format!("unknown nearest_mode '{other}'"),
        )),
    }
}

fn is_nonempty_input(key: &KernelKey, index: usize) -> bool {
    key.input(index).is_some_and(|spec| spec.element_count() > 0)
}

fn compile_v10(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    let sampling = Sampling {
        mode: parse_mode(key.attrs.string("mode").unwrap_or("nearest"), false)?,
        coordinates: CoordinateMode::Asymmetric,
        nearest: NearestMode::Floor,
        cubic_coeff_a: -0.75,
        exclude_outside: false,
    };
    build_kernel(key, sampling)
}

fn compile_v11(key: &KernelKey) -> OnnxResult<CompiledKernel> {
    if is_nonempty_input(key, 1) {
        return Err(OnnxError::unsupported_feature(OP, "roi"));
    }
    if is_nonempty_input(key, 3) {
        return Err(OnnxError::unsupported_feature(OP, "sizes"));
    }
    if key.attrs.int("antialias").unwrap_or(0) != 0 {
        return Err(OnnxError::unsupported_feature(OP, "antialias"));
    }
    let coordinates = parse_coordinate_mode(
        key.attrs
            .string("coordinate_transformation_mode")
            .unwrap_or("half_pixel"),
    )?;
    if let Some(policy) = key.attrs.string("keep_aspect_ratio_policy") {
        if !matches!(policy, "stretch" | "not_larger" | "not_smaller") {
            return Err(OnnxError::invalid_argument(
                OP,
                format!("unknown keep_aspect_ratio_policy '{policy}'"),
            ));
        }
    }
    let sampling = Sampling {
        mode: parse_mode(key.attrs.string("mode").unwrap_or("nearest"), true)?,
        coordinates,
        nearest: parse_nearest_mode(
            key.attrs
                .string("nearest_mode")
                .unwrap_or("round_prefer_floor"),
        )?,
        cubic_coeff_a: f64::from(key.attrs.float("cubic_coeff_a").unwrap_or(-0.75)),
        exclude_outside: key.attrs.int("exclude_outside").unwrap_or(0) != 0,
    };
    build_kernel(key, sampling)
}

fn build_kernel(key: &KernelKey, sampling: Sampling) -> OnnxResult<CompiledKernel> {
    let spec = required_spec(OP, key, 0)?;
    expect_dtype(OP, spec, DType::F32)?;
    let in_dims = spec.shape.dims().to_vec();
    let scales = full_rank_scales(key, in_dims.len())?;
    let out_dims = output_dims(&in_dims, &scales)?;
    check_buffer_sizes(&in_dims, &out_dims, sampling.mode)?;

    let plans: Vec<Option<AxisPlan>> = in_dims
        .iter()
        .zip(&out_dims)
        .zip(&scales)
        .map(|((&in_len, &out_len), &scale)| {
            let plan = AxisPlan::build(in_len, out_len, scale, &sampling);
            (!plan.is_identity()).then_some(plan)
        })
        .collect();
    let out_shape = Shape::new(out_dims);

    Ok(CompiledKernel::new(key, move |inputs| {
        let mut data = f32_input(OP, inputs, 0)?.to_vec();
        let mut dims = in_dims.clone();
        for (axis, plan) in plans.iter().enumerate() {
            if let Some(plan) = plan {
                data = resample_axis(&data, &dims, axis, plan);
                dims[axis] = plan.out_len;
            }
        }
        Ok(vec![Tensor::from_vec(out_shape.clone(), data)?])
    }))
}

/// Per-axis scale factors, expanding a partial `axes` selection to the input rank.
fn full_rank_scales(key: &KernelKey, rank: usize) -> OnnxResult<Vec<f64>> {
    let scales = key
        .attrs
        .floats("scales")
        .filter(|scales| !scales.is_empty())
        .ok_or_else(|| OnnxError::invalid_argument(OP, "a non-empty scales input is required"))?;
    let full: Vec<f64> = match key.attrs.ints("axes") {
        Some(axes) if !axes.is_empty() => {
            if axes.len() != scales.len() {
                return Err(OnnxError::invalid_argument(
                    OP,
                    format!("{} scales given for {} axes", scales.len(), axes.len()),
                ));
            }
            let mut full = vec![1.0f64; rank];
            for (&axis, &scale) in axes.iter().zip(scales) {
                full[normalize_axis(OP, axis, rank)?] = f64::from(scale);
            }
            full
        }
        _ => {
            if scales.len() != rank {
                return Err(OnnxError::invalid_argument(
                    OP,
                    format!("expected {rank} scales, got {}", scales.len()),
                ));
            }
            scales.iter().map(|&s| f64::from(s)).collect()
        }
    };
    if let Some(bad) = full.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(OnnxError::invalid_argument(
            OP,
            format!("scale factors must be positive, got {bad}"),
        ));
    }
    Ok(full)
}

/// `floor(in_dim * scale)` per axis.
fn output_dims(in_dims: &[usize], scales: &[f64]) -> OnnxResult<Vec<usize>> {
    in_dims
        .iter()
        .zip(scales)
        .map(|(&dim, &scale)| {
            let out = (dim as f64 * scale).floor();
            // usize::MAX rounds up to 2^64 as f64, so `<` keeps the cast exact
            if out.is_finite() && out < usize::MAX as f64 {
                Ok(out as usize)
            } else {
                Err(OnnxError::invalid_argument(
                    OP,
                    format!("scale {scale} on a dimension of {dim} overflows the output size"),
                ))
            }
        })
        .collect()
}

/// Rejects resizes whose tap tables or intermediate buffers cannot be allocated.
///
/// Axes are resampled one at a time, so every intermediate buffer is bounded by the product
/// of `max(in, out)` over all axes.
fn check_buffer_sizes(in_dims: &[usize], out_dims: &[usize], mode: Mode) -> OnnxResult<()> {
    let too_large = || OnnxError::invalid_argument(OP, format!("output shape {out_dims:?} is too large"));
    let max_bytes = isize::MAX as usize;

    let width = tap_width(mode);
    for &out_len in out_dims {
        out_len
            .checked_mul(width)
            .and_then(|taps| taps.checked_mul(std::mem::size_of::<(usize, f32)>()))
            .filter(|&bytes| bytes <= max_bytes)
            .ok_or_else(too_large)?;
    }
    in_dims
        .iter()
        .zip(out_dims)
        .try_fold(1usize, |acc, (&a, &b)| acc.checked_mul(a.max(b)))
        .and_then(|elements| elements.checked_mul(std::mem::size_of::<f32>()))
        .filter(|&bytes| bytes <= max_bytes)
        .ok_or_else(too_large)?;
    Ok(())
}

fn tap_width(mode: Mode) -> usize {
    match mode {
        Mode::Nearest => 1,
        Mode::Linear => 2,
        Mode::Cubic => 4,
    }
}

/// Source coordinate of output index `x` along one axis.
fn source_coordinate(
    mode: CoordinateMode,
    x: f64,
    scale: f64,
    in_len: usize,
    out_len: usize,
) -> f64 {
    let in_len_f = in_len as f64;
    let out_len_f = out_len as f64;
    match mode {
        CoordinateMode::HalfPixel => (x + 0.5) / scale - 0.5,
        CoordinateMode::HalfPixelSymmetric => {
            let adjustment = out_len_f / (scale * in_len_f);
            let offset = in_len_f / 2.0 * (1.0 - adjustment);
            offset + (x + 0.5) / scale - 0.5
        }
        CoordinateMode::PytorchHalfPixel => {
            if out_len > 1 {
                (x + 0.5) / scale - 0.5
            } else {
                0.0
            }
        }
        CoordinateMode::AlignCorners => {
            if out_len == 1 {
                0.0
            } else {
                x * (in_len_f - 1.0) / (out_len_f - 1.0)
            }
        }
        CoordinateMode::Asymmetric => x / scale,
        CoordinateMode::TfHalfPixelForNn => (x + 0.5) / scale,
    }
}

fn nearest_index(mode: NearestMode, coord: f64) -> i64 {
    let rounded = match mode {
        NearestMode::RoundPreferFloor => {
            if coord.fract().abs() == 0.5 {
                coord.floor()
            } else {
                coord.round()
            }
        }
        NearestMode::RoundPreferCeil => {
            if coord.fract().abs() == 0.5 {
                coord.ceil()
            } else {
                coord.round()
            }
        }
        NearestMode::Floor => coord.floor(),
        NearestMode::Ceil => coord.ceil(),
    };
    rounded as i64
}

/// Keys cubic convolution weights for taps at offsets -1, 0, 1, 2 from `floor(coord)`.
fn cubic_coefficients(t: f64, a: f64) -> [f64; 4] {
    let t1 = t + 1.0;
    let u = 1.0 - t;
    let u1 = 2.0 - t;
    [
        ((a * t1 - 5.0 * a) * t1 + 8.0 * a) * t1 - 4.0 * a,
        ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0,
        ((a + 2.0) * u - (a + 3.0)) * u * u + 1.0,
        ((a * u1 - 5.0 * a) * u1 + 8.0 * a) * u1 - 4.0 * a,
    ]
}

fn clamp_index(index: i64, len: usize) -> usize {
    index.clamp(0, len as i64 - 1) as usize
}

/// Tap table for one axis: `width` (source index, weight) pairs per output position.
#[derive(Debug)]
struct AxisPlan {
    in_len: usize,
    out_len: usize,
    width: usize,
    taps: Vec<(usize, f32)>,
}

impl AxisPlan {
    fn build(in_len: usize, out_len: usize, scale: f64, sampling: &Sampling) -> Self {
        let width = tap_width(sampling.mode);
        let mut taps = Vec::with_capacity(out_len * width);
        for x in 0..out_len {
            let coord = source_coordinate(sampling.coordinates, x as f64, scale, in_len, out_len);
            match sampling.mode {
                Mode::Nearest => {
                    let index = nearest_index(sampling.nearest, coord);
                    taps.push((clamp_index(index, in_len), 1.0));
                }
                Mode::Linear => {
                    let coord = coord.clamp(0.0, (in_len - 1) as f64);
                    let base = coord.floor();
                    let t = coord - base;
                    let base = base as i64;
                    taps.push((clamp_index(base, in_len), (1.0 - t) as f32));
                    taps.push((clamp_index(base + 1, in_len), t as f32));
                }
                Mode::Cubic => {
                    let base = coord.floor();
                    let coeffs = cubic_coefficients(coord - base, sampling.cubic_coeff_a);
                    let base = base as i64;
                    let mut row = [(0usize, 0.0f64); 4];
                    let mut total = 0.0;
                    for (k, (slot, &c)) in row.iter_mut().zip(&coeffs).enumerate() {
                        let index = base - 1 + k as i64;
                        let inside = (0..in_len as i64).contains(&index);
                        let weight = if sampling.exclude_outside && !inside { 0.0 } else { c };
                        *slot = (clamp_index(index, in_len), weight);
                        total += weight;
                    }
                    let norm = if sampling.exclude_outside && total != 0.0 { total } else { 1.0 };
                    taps.extend(row.iter().map(|&(index, w)| (index, (w / norm) as f32)));
                }
            }
        }
        Self {
            in_len,
            out_len,
            width,
            taps,
        }
    }

    fn row(&self, x: usize) -> &[(usize, f32)] {
        &self.taps[x * self.width..(x + 1) * self.width]
    }

    /// True when every output position copies the matching source position unchanged.
    fn is_identity(&self) -> bool {
        self.in_len == self.out_len
            && (0..self.out_len).all(|x| {
                self.row(x)
                    .iter()
                    .all(|&(index, w)| w == 0.0 || (index == x && w == 1.0))
            })
    }
}

fn resample_axis(src: &[f32], dims: &[usize], axis: usize, plan: &AxisPlan) -> Vec<f32> {
    let outer: usize = dims[..axis].iter().product();
    let inner: usize = dims[axis + 1..].iter().product();
    let mut out = vec![0.0f32; outer * plan.out_len * inner];
    for o in 0..outer {
        let src_base = o * plan.in_len * inner;
        let dst_base = o * plan.out_len * inner;
        for x in 0..plan.out_len {
            let dst = &mut out[dst_base + x * inner..dst_base + (x + 1) * inner];
            for &(index, weight) in plan.row(x) {
                if weight == 0.0 {
                    continue;
                }
                let row = &src[src_base + index * inner..src_base + (index + 1) * inner];
                for (d, s) in dst.iter_mut().zip(row) {
                    *d += weight * s;
                }
            }
        }
    }
    out
}

fn version_10(node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &RESIZE_10);
    promote_input_to_attr(node, inputs, 1, "scales");
    Ok(&*RESIZE_10)
}

fn version_11(node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &RESIZE_11);
    promote_input_to_attr(node, inputs, 2, "scales");
    Ok(&*RESIZE_11)
}

fn version_13(node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    version_11(node, inputs)
}

fn version_18(node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    update_node_attrs_dict(node, &RESIZE_18);
    promote_input_to_attr(node, inputs, 2, "scales");
    Ok(&*RESIZE_18)
}

fn version_19(node: &mut OnnxNode, inputs: &[Value]) -> OnnxResult<&'static OpFunction> {
    version_18(node, inputs)
}

pub fn register(registry: &mut OpRegistry) -> OnnxResult<()> {
    registry.register(
        Handler::builder(OP)
            .version(10, version_10)
            .version(11, version_11)
            .version(13, version_13)
            .version(18, version_18)
            .version(19, version_19)
            .build()?,
    )
}
