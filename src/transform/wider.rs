// --- File: src/transform/wider.rs ---

//! Net2Wider: grow a layer's output width without changing the network function.

use crate::layer::LayerKind;
use crate::transform::mapping::{seeded_rng, UnitMapping};
use crate::transform::{Result, TransformError, NOISE_FACTOR};
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::StandardNormal;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for the widening transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidenConfig {
    /// Target output width; must exceed the layer's current width.
    pub new_width: usize,
    /// Perturb replicated units' outgoing weights to break symmetry.
    /// Without this, replicated units stay perfectly correlated during
    /// subsequent training and the added capacity is wasted.
    pub add_noise: bool,
    /// Seed for the unit-mapping and noise; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl WidenConfig {
    /// Creates a configuration for the given target width.
    pub fn new(new_width: usize) -> Self {
        Self {
            new_width,
            add_noise: false,
            seed: None,
        }
    }

    /// Enables symmetry-breaking noise on replicated units.
    pub fn with_noise(mut self, add_noise: bool) -> Self {
        self.add_noise = add_noise;
        self
    }

    /// Fixes the random seed for reproducible output.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Output of [`widen`]: replacement tensors for the widened layer and the
/// input side of the layer that follows it.
#[derive(Debug, Clone)]
pub struct WidenedLayer {
    /// Widened weight; unit axis now has `new_width` entries.
    pub weight: ArrayD<f32>,
    /// Widened bias, length `new_width`.
    pub bias: ArrayD<f32>,
    /// Next layer's weight with its input axis expanded to `new_width`
    /// and rescaled so its pre-activation sums are unchanged.
    pub next_weight: ArrayD<f32>,
}

/// Widens `weight`/`bias` to `config.new_width` units and expands
/// `next_weight`'s input axis to match, preserving the composed function.
///
/// New units replicate randomly chosen original units (the unit-mapping `g`);
/// each input slice of the next layer is divided by how many times its source
/// unit was replicated, so the next layer's weighted sums come out identical.
/// Units below the original width are copied bit for bit regardless of the
/// noise flag.
///
/// Works for dense weights `(in, out)` with a dense or conv successor and for
/// conv weights `(kh, kw, c_in, c_out)` likewise; the successor's input axis
/// must equal the layer's current width. Widening across a flatten boundary
/// (conv into dense) is rejected because the interface carries no spatial
/// extent to map flattened positions back to channels.
pub fn widen(
    weight: &ArrayD<f32>,
    bias: &ArrayD<f32>,
    next_weight: &ArrayD<f32>,
    config: &WidenConfig,
) -> Result<WidenedLayer> {
    let kind = LayerKind::of(weight)?;
    let next_kind = LayerKind::of(next_weight)?;
    let width = kind.width(weight);

    if width == 0 {
        return Err(TransformError::InvalidShape(
            "cannot widen a layer of width 0".to_string(),
        ));
    }
    if bias.ndim() != 1 || bias.len() != width {
        return Err(TransformError::InvalidShape(format!(
            "bias must be a vector of length {} (layer width), got shape {:?}",
            width,
            bias.shape()
        )));
    }
    if next_kind.fan_in(next_weight) != width {
        return Err(TransformError::InvalidShape(format!(
            "next layer consumes {} units but the widened layer has {}",
            next_kind.fan_in(next_weight),
            width
        )));
    }
    if kind == LayerKind::Conv2d && next_kind == LayerKind::Dense {
        return Err(TransformError::InvalidShape(
            "cannot widen a conv layer into a dense successor across a flatten boundary"
                .to_string(),
        ));
    }
    if config.new_width <= width {
        return Err(TransformError::InvalidShape(format!(
            "new width {} must exceed current width {}",
            config.new_width, width
        )));
    }

    let mut rng = seeded_rng(config.seed);
    let mapping = UnitMapping::generate(width, config.new_width, &mut rng);

    // Widened layer: copy unit i's column/filter from unit g(i).
    let unit_axis = kind.unit_axis();
    let mut new_shape = weight.shape().to_vec();
    new_shape[unit_axis.index()] = config.new_width;
    let mut new_weight = ArrayD::<f32>::zeros(IxDyn(&new_shape));
    let mut new_bias = ArrayD::<f32>::zeros(IxDyn(&[config.new_width]));

    for (i, &src) in mapping.targets().iter().enumerate() {
        new_weight
            .index_axis_mut(unit_axis, i)
            .assign(&weight.index_axis(unit_axis, src));
        new_bias[[i]] = bias[[src]];
    }

    // Next layer: copy input slice i from g(i), divided by the replication
    // count so the sum over all copies reproduces the original contribution.
    let in_axis = next_kind.input_axis();
    let mut next_shape = next_weight.shape().to_vec();
    next_shape[in_axis.index()] = config.new_width;
    let mut new_next = ArrayD::<f32>::zeros(IxDyn(&next_shape));

    for (i, &src) in mapping.targets().iter().enumerate() {
        let mut slice = next_weight.index_axis(in_axis, src).to_owned();
        slice /= mapping.replication(src) as f32;
        new_next.index_axis_mut(in_axis, i).assign(&slice);
    }

    // Symmetry breaking: perturb only the replicated slices, after rescaling,
    // so the original units' contributions stay exact.
    if config.add_noise {
        for i in width..config.new_width {
            let mut slice = new_next.index_axis_mut(in_axis, i);
            let sigma = NOISE_FACTOR * slice.std(0.0);
            if sigma > 0.0 {
                for v in slice.iter_mut() {
                    *v += rng.sample::<f32, _>(StandardNormal) * sigma;
                }
            }
        }
    }

    log::debug!(
        "widened {:?} layer from {} to {} units (noise: {})",
        kind,
        width,
        config.new_width,
        config.add_noise
    );

    Ok(WidenedLayer {
        weight: new_weight,
        bias: new_bias,
        next_weight: new_next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array1, Array2};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    fn dense_pair() -> (ArrayD<f32>, ArrayD<f32>, ArrayD<f32>) {
        let w1 = Array2::<f32>::random((10, 6), Uniform::new(-1.0, 1.0)).into_dyn();
        let b1 = Array1::<f32>::random(6, Uniform::new(-1.0, 1.0)).into_dyn();
        let w2 = Array2::<f32>::random((6, 4), Uniform::new(-1.0, 1.0)).into_dyn();
        (w1, b1, w2)
    }

    #[test]
    fn output_shapes() {
        let (w1, b1, w2) = dense_pair();
        let out = widen(&w1, &b1, &w2, &WidenConfig::new(13).with_seed(1)).unwrap();

        assert_eq!(out.weight.shape(), &[10, 13]);
        assert_eq!(out.bias.shape(), &[13]);
        assert_eq!(out.next_weight.shape(), &[13, 4]);
    }

    #[test]
    fn original_units_copied_exactly_even_with_noise() {
        let (w1, b1, w2) = dense_pair();
        let cfg = WidenConfig::new(13).with_noise(true).with_seed(2);
        let out = widen(&w1, &b1, &w2, &cfg).unwrap();

        for i in 0..6 {
            for r in 0..10 {
                assert_eq!(out.weight[[r, i]], w1[[r, i]]);
            }
            assert_eq!(out.bias[[i]], b1[[i]]);
        }
    }

    #[test]
    fn conv_widening_shapes() {
        let w1 = Array::random((5, 5, 1, 8), Uniform::new(-1.0f32, 1.0)).into_dyn();
        let b1 = Array1::<f32>::random(8, Uniform::new(-1.0, 1.0)).into_dyn();
        let w2 = Array::random((3, 3, 8, 4), Uniform::new(-1.0f32, 1.0)).into_dyn();

        let out = widen(&w1, &b1, &w2, &WidenConfig::new(12).with_seed(3)).unwrap();
        assert_eq!(out.weight.shape(), &[5, 5, 1, 12]);
        assert_eq!(out.bias.shape(), &[12]);
        assert_eq!(out.next_weight.shape(), &[3, 3, 12, 4]);
    }

    #[test]
    fn rejects_non_increasing_width() {
        let (w1, b1, w2) = dense_pair();
        assert!(matches!(
            widen(&w1, &b1, &w2, &WidenConfig::new(6)),
            Err(TransformError::InvalidShape(_))
        ));
        assert!(matches!(
            widen(&w1, &b1, &w2, &WidenConfig::new(3)),
            Err(TransformError::InvalidShape(_))
        ));
    }

    #[test]
    fn rejects_mismatched_next_layer() {
        let (w1, b1, _) = dense_pair();
        let bad_w2 = Array2::<f32>::zeros((7, 4)).into_dyn();
        assert!(matches!(
            widen(&w1, &b1, &bad_w2, &WidenConfig::new(13)),
            Err(TransformError::InvalidShape(_))
        ));
    }

    #[test]
    fn rejects_inconsistent_bias() {
        let (w1, _, w2) = dense_pair();
        let bad_b1 = Array1::<f32>::zeros(5).into_dyn();
        assert!(matches!(
            widen(&w1, &bad_b1, &w2, &WidenConfig::new(13)),
            Err(TransformError::InvalidShape(_))
        ));
    }

    #[test]
    fn rejects_flatten_boundary() {
        let w1 = Array::random((3, 3, 1, 4), Uniform::new(-1.0f32, 1.0)).into_dyn();
        let b1 = Array1::<f32>::zeros(4).into_dyn();
        let w2 = Array2::<f32>::zeros((4, 10)).into_dyn();
        assert!(matches!(
            widen(&w1, &b1, &w2, &WidenConfig::new(8)),
            Err(TransformError::InvalidShape(_))
        ));
    }

    #[test]
    fn seed_makes_widening_reproducible() {
        let (w1, b1, w2) = dense_pair();
        let cfg = WidenConfig::new(13).with_noise(true).with_seed(42);

        let a = widen(&w1, &b1, &w2, &cfg).unwrap();
        let b = widen(&w1, &b1, &w2, &cfg).unwrap();
        assert_eq!(a.weight, b.weight);
        assert_eq!(a.bias, b.bias);
        assert_eq!(a.next_weight, b.next_weight);
    }
}
