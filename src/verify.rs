//! Sample-based function-preservation checks.
//!
//! The transforms guarantee preservation analytically, but the deepening
//! guarantee also rests on a precondition about the network's nonlinearity
//! that tensors alone cannot express. This module runs the affected layers
//! forward on caller-supplied sample data and compares teacher and student
//! outputs, so callers can probe a transformation before committing to it.
//!
//! The forward passes are deliberately naive reference implementations:
//! dense is a matmul plus bias, conv is a stride-1 same-padded convolution
//! over NHWC activations with `(kh, kw, c_in, c_out)` kernels.

use crate::transform::{DeepenedLayer, Result, TransformError, WidenedLayer};
use ndarray::{Array4, ArrayD, ArrayView1, ArrayView2, ArrayView4, Ix1, Ix2, Ix4};

fn as_matrix<'a>(t: &'a ArrayD<f32>, role: &str) -> Result<ArrayView2<'a, f32>> {
    t.view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| TransformError::InvalidShape(format!("{} must be rank 2, got {:?}", role, t.shape())))
}

fn as_vector<'a>(t: &'a ArrayD<f32>, role: &str) -> Result<ArrayView1<'a, f32>> {
    t.view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| TransformError::InvalidShape(format!("{} must be rank 1, got {:?}", role, t.shape())))
}

fn as_nhwc<'a>(t: &'a ArrayD<f32>, role: &str) -> Result<ArrayView4<'a, f32>> {
    t.view()
        .into_dimensionality::<Ix4>()
        .map_err(|_| TransformError::InvalidShape(format!("{} must be rank 4, got {:?}", role, t.shape())))
}

/// `y = xW + b` for a batch `x` of shape `(batch, in)`.
pub fn dense_forward(input: &ArrayD<f32>, weight: &ArrayD<f32>, bias: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    let x = as_matrix(input, "dense input")?;
    let w = as_matrix(weight, "dense weight")?;
    let b = as_vector(bias, "dense bias")?;

    if x.ncols() != w.nrows() || b.len() != w.ncols() {
        return Err(TransformError::InvalidShape(format!(
            "dense forward: input {:?} incompatible with weight {:?} / bias {:?}",
            x.shape(),
            w.shape(),
            b.shape()
        )));
    }
    Ok((x.dot(&w) + &b).into_dyn())
}

/// Stride-1 same-padded convolution.
/// Input: `(n, h, w, c_in)`, weight: `(kh, kw, c_in, c_out)`, bias: `(c_out)`.
pub fn conv2d_same_forward(
    input: &ArrayD<f32>,
    weight: &ArrayD<f32>,
    bias: &ArrayD<f32>,
) -> Result<ArrayD<f32>> {
    let x = as_nhwc(input, "conv input")?;
    let k = as_nhwc(weight, "conv weight")?;
    let b = as_vector(bias, "conv bias")?;

    let (batch, in_h, in_w, in_c) = x.dim();
    let (kernel_h, kernel_w, weight_in_c, out_c) = k.dim();
    if in_c != weight_in_c || b.len() != out_c {
        return Err(TransformError::InvalidShape(format!(
            "conv forward: input {:?} incompatible with weight {:?} / bias {:?}",
            x.shape(),
            k.shape(),
            b.shape()
        )));
    }

    let pad_h = (kernel_h - 1) / 2;
    let pad_w = (kernel_w - 1) / 2;
    let mut output = Array4::<f32>::zeros((batch, in_h, in_w, out_c));

    for n in 0..batch {
        for oh in 0..in_h {
            for ow in 0..in_w {
                for oc in 0..out_c {
                    let mut sum = b[oc];
                    for kh in 0..kernel_h {
                        for kw in 0..kernel_w {
                            let ih = (oh + kh) as isize - pad_h as isize;
                            let iw = (ow + kw) as isize - pad_w as isize;
                            if ih >= 0 && ih < in_h as isize && iw >= 0 && iw < in_w as isize {
                                for ic in 0..in_c {
                                    sum += x[[n, ih as usize, iw as usize, ic]]
                                        * k[[kh, kw, ic, oc]];
                                }
                            }
                        }
                    }
                    output[[n, oh, ow, oc]] = sum;
                }
            }
        }
    }

    Ok(output.into_dyn())
}

/// Rectifier used between the checked layers.
pub fn relu(x: &ArrayD<f32>) -> ArrayD<f32> {
    x.mapv(|v| v.max(0.0))
}

/// Runs one layer forward, dispatching on the weight's rank.
pub fn layer_forward(input: &ArrayD<f32>, weight: &ArrayD<f32>, bias: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    match weight.ndim() {
        2 => dense_forward(input, weight, bias),
        4 => conv2d_same_forward(input, weight, bias),
        n => Err(TransformError::InvalidShape(format!(
            "cannot run a rank-{} weight forward",
            n
        ))),
    }
}

fn max_abs_diff(a: &ArrayD<f32>, b: &ArrayD<f32>) -> Result<f32> {
    if a.shape() != b.shape() {
        return Err(TransformError::InvalidShape(format!(
            "cannot compare outputs of shape {:?} and {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0f32, f32::max))
}

/// Checks that (widened layer -> relu -> widened next layer) matches the
/// teacher's (layer -> relu -> next layer) on `input`, within `tolerance`.
///
/// With `add_noise` off this holds up to floating-point rounding; with noise
/// on, expect deviation on the order of the noise scale.
pub fn widen_preserves(
    weight: &ArrayD<f32>,
    bias: &ArrayD<f32>,
    next_weight: &ArrayD<f32>,
    next_bias: &ArrayD<f32>,
    widened: &WidenedLayer,
    input: &ArrayD<f32>,
    tolerance: f32,
) -> Result<f32> {
    let teacher_hidden = relu(&layer_forward(input, weight, bias)?);
    let teacher_out = layer_forward(&teacher_hidden, next_weight, next_bias)?;

    let student_hidden = relu(&layer_forward(input, &widened.weight, &widened.bias)?);
    let student_out = layer_forward(&student_hidden, &widened.next_weight, next_bias)?;

    let deviation = max_abs_diff(&teacher_out, &student_out)?;
    if deviation > tolerance {
        return Err(TransformError::PreconditionViolation(format!(
            "widened network deviates from teacher by {} (tolerance {})",
            deviation, tolerance
        )));
    }
    Ok(deviation)
}

/// Checks the deepening identity on a sample of post-nonlinearity
/// activations: `relu(inserted_layer(a))` must reproduce `a`.
///
/// This is the runtime probe for the nonlinearity precondition documented on
/// [`crate::transform::deepen`]: it fails for activations that are not
/// fixed points of the rectifier (e.g. anything negative).
pub fn deepen_preserves(
    deepened: &DeepenedLayer,
    activation: &ArrayD<f32>,
    tolerance: f32,
) -> Result<f32> {
    let out = relu(&layer_forward(activation, &deepened.weight, &deepened.bias)?);
    let deviation = max_abs_diff(activation, &out)?;
    if deviation > tolerance {
        return Err(TransformError::PreconditionViolation(format!(
            "inserted layer deviates from identity by {} (tolerance {})",
            deviation, tolerance
        )));
    }
    Ok(deviation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array4};

    #[test]
    fn dense_forward_known_values() {
        let x = arr2(&[[1.0f32, 2.0]]).into_dyn();
        let w = arr2(&[[1.0f32, 0.0, 2.0], [0.0, 1.0, -1.0]]).into_dyn();
        let b = arr1(&[0.5f32, -0.5, 0.0]).into_dyn();

        let y = dense_forward(&x, &w, &b).unwrap();
        assert_eq!(y.shape(), &[1, 3]);
        assert_eq!(y[[0, 0]], 1.5);
        assert_eq!(y[[0, 1]], 1.5);
        assert_eq!(y[[0, 2]], 0.0);
    }

    #[test]
    fn conv_identity_kernel_is_passthrough() {
        // 3x3 center-identity kernel over 2 channels.
        let mut k = Array4::<f32>::zeros((3, 3, 2, 2));
        k[[1, 1, 0, 0]] = 1.0;
        k[[1, 1, 1, 1]] = 1.0;
        let k = k.into_dyn();
        let b = arr1(&[0.0f32, 0.0]).into_dyn();

        let mut x = Array4::<f32>::zeros((1, 4, 4, 2));
        for (i, v) in x.iter_mut().enumerate() {
            *v = i as f32 * 0.25;
        }
        let x = x.into_dyn();

        let y = conv2d_same_forward(&x, &k, &b).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn mismatched_forward_shapes_rejected() {
        let x = arr2(&[[1.0f32, 2.0, 3.0]]).into_dyn();
        let w = arr2(&[[1.0f32], [2.0]]).into_dyn();
        let b = arr1(&[0.0f32]).into_dyn();
        assert!(matches!(
            dense_forward(&x, &w, &b),
            Err(TransformError::InvalidShape(_))
        ));
    }
}
