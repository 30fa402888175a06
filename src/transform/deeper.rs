// --- File: src/transform/deeper.rs ---

//! Net2Deeper: insert an identity-initialized layer after an existing one.

use crate::layer::LayerKind;
use crate::transform::mapping::seeded_rng;
use crate::transform::{Result, TransformError, NOISE_FACTOR};
use ndarray::{Array2, Array4, ArrayD, Dimension, IxDyn};
use ndarray_rand::rand_distr::StandardNormal;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for the deepening transform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepenConfig {
    /// Perturb the off-diagonal (off-center) entries of the identity kernel.
    /// Diagonal entries are left exact, so existing signal paths stay intact
    /// while the new layer's unused capacity starts near zero instead of at
    /// a perfectly symmetric zero.
    pub add_noise: bool,
    /// Seed for the noise; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl DeepenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables off-diagonal symmetry-breaking noise.
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

/// Output of [`deepen`]: parameters for the inserted layer.
#[derive(Debug, Clone)]
pub struct DeepenedLayer {
    /// Identity mapping over the prior layer's units: a square identity
    /// matrix for dense, a center-identity kernel for conv.
    pub weight: ArrayD<f32>,
    /// Zero bias of length equal to the prior layer's width.
    pub bias: ArrayD<f32>,
}

/// Builds parameters for a new layer inserted immediately after the layer
/// owning `weight`, initialized to pass its input through unchanged.
///
/// For a dense layer of width `d` the new weight is the `d x d` identity.
/// For a conv layer `(kh, kw, c_in, c_out)` the new weight is a
/// `(kh, kw, c_out, c_out)` kernel carrying the identity matrix at the
/// spatial offset `((kh - 1) / 2, (kw - 1) / 2)` and zero everywhere else.
/// That offset equals the per-side same-padding amount, so a stride-1
/// same-padded convolution with it is a per-channel pass-through for odd
/// and even kernel extents alike, regardless of the kernel size used
/// elsewhere in the network.
///
/// # Precondition
///
/// End-to-end function preservation additionally requires that the network's
/// nonlinearity is idempotent on its own output (true for rectifiers: values
/// already clipped at zero pass through `identity -> relu` unchanged). The
/// transform only constructs the tensors and cannot check this; callers can
/// probe it with [`crate::verify::deepen_preserves`] on sample activations.
pub fn deepen(weight: &ArrayD<f32>, config: &DeepenConfig) -> Result<DeepenedLayer> {
    let kind = LayerKind::of(weight)?;
    let width = kind.width(weight);
    if width == 0 {
        return Err(TransformError::InvalidShape(
            "cannot deepen after a layer of width 0".to_string(),
        ));
    }

    let mut new_weight = match kind {
        LayerKind::Dense => Array2::<f32>::eye(width).into_dyn(),
        LayerKind::Conv2d => {
            let (kh, kw) = (weight.shape()[0], weight.shape()[1]);
            let mut kernel = Array4::<f32>::zeros((kh, kw, width, width));
            // The identity offset must equal the same-padding amount
            // ((k - 1) / 2 per side) or even kernels would translate the
            // activations by one pixel instead of passing them through.
            let (ch, cw) = ((kh - 1) / 2, (kw - 1) / 2);
            for u in 0..width {
                kernel[[ch, cw, u, u]] = 1.0;
            }
            kernel.into_dyn()
        }
    };

    if config.add_noise {
        let mut rng = seeded_rng(config.seed);
        let sigma = NOISE_FACTOR * new_weight.std(0.0);
        let diagonal = |idx: &[usize]| match kind {
            LayerKind::Dense => idx[0] == idx[1],
            LayerKind::Conv2d => {
                let (kh, kw) = (weight.shape()[0], weight.shape()[1]);
                idx[0] == (kh - 1) / 2 && idx[1] == (kw - 1) / 2 && idx[2] == idx[3]
            }
        };
        if sigma > 0.0 {
            for (idx, v) in new_weight.indexed_iter_mut() {
                if !diagonal(idx.slice()) {
                    *v += rng.sample::<f32, _>(StandardNormal) * sigma;
                }
            }
        }
    }

    log::debug!(
        "built identity {:?} layer of width {} (noise: {})",
        kind,
        width,
        config.add_noise
    );

    Ok(DeepenedLayer {
        weight: new_weight,
        bias: ArrayD::<f32>::zeros(IxDyn(&[width])),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Ix4;

    #[test]
    fn dense_identity() {
        let w1 = ArrayD::<f32>::zeros(IxDyn(&[100, 64]));
        let out = deepen(&w1, &DeepenConfig::new()).unwrap();

        assert_eq!(out.weight.shape(), &[64, 64]);
        for i in 0..64 {
            for j in 0..64 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(out.weight[[i, j]], expected);
            }
        }
        assert!(out.bias.iter().all(|&b| b == 0.0));
        assert_eq!(out.bias.len(), 64);
    }

    #[test]
    fn conv_center_identity() {
        let w1 = ArrayD::<f32>::zeros(IxDyn(&[5, 5, 1, 32]));
        let out = deepen(&w1, &DeepenConfig::new()).unwrap();

        assert_eq!(out.weight.shape(), &[5, 5, 32, 32]);
        let kernel = out.weight.view().into_dimensionality::<Ix4>().unwrap();
        for ((h, w, i, j), &v) in kernel.indexed_iter() {
            let expected = if h == 2 && w == 2 && i == j { 1.0 } else { 0.0 };
            assert_eq!(v, expected, "at ({}, {}, {}, {})", h, w, i, j);
        }
    }

    #[test]
    fn even_kernel_identity_sits_at_padding_offset() {
        let w1 = ArrayD::<f32>::zeros(IxDyn(&[2, 2, 3, 4]));
        let out = deepen(&w1, &DeepenConfig::new()).unwrap();

        assert_eq!(out.weight.shape(), &[2, 2, 4, 4]);
        let kernel = out.weight.view().into_dimensionality::<Ix4>().unwrap();
        for ((h, w, i, j), &v) in kernel.indexed_iter() {
            // same padding for k = 2 is (k - 1) / 2 = 0 per side
            let expected = if h == 0 && w == 0 && i == j { 1.0 } else { 0.0 };
            assert_eq!(v, expected, "at ({}, {}, {}, {})", h, w, i, j);
        }
    }

    #[test]
    fn noise_leaves_diagonal_exact() {
        let w1 = ArrayD::<f32>::zeros(IxDyn(&[100, 64]));
        let cfg = DeepenConfig::new().with_noise(true).with_seed(5);
        let out = deepen(&w1, &cfg).unwrap();

        let mut touched = false;
        for i in 0..64 {
            for j in 0..64 {
                let v = out.weight[[i, j]];
                if i == j {
                    assert_eq!(v, 1.0);
                } else {
                    // sigma is NOISE_FACTOR * std(identity) ~ 6e-3
                    assert!(v.abs() < 0.1, "off-diagonal noise too large: {}", v);
                    touched |= v != 0.0;
                }
            }
        }
        assert!(touched, "noise flag had no effect");
    }

    #[test]
    fn rejects_malformed_tensor() {
        let w1 = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 4]));
        assert!(matches!(
            deepen(&w1, &DeepenConfig::new()),
            Err(TransformError::InvalidShape(_))
        ));
    }
}
