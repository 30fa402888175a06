//! Tagged-shape abstraction over the two supported weight layouts.
//!
//! The widen/deepen transforms are written once against a shape-agnostic
//! "unit axis". This module classifies a raw weight tensor by rank and
//! exposes the axes that matter:
//!
//! - **Dense**: weight shape `(in_features, out_features)`
//! - **Conv2d**: weight shape `(kernel_h, kernel_w, in_channels, out_channels)`
//!
//! In both layouts the unit (output) axis is the last one and the input axis
//! is the one before it, so the transforms can slice along `unit_axis()` /
//! `input_axis()` without caring which kind they are handling.

use crate::transform::{Result, TransformError};
use ndarray::{ArrayD, Axis};

/// Kind of layer a weight tensor belongs to, derived from its rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Fully connected layer, weight `(in, out)`.
    Dense,
    /// 2D convolution, weight `(kh, kw, c_in, c_out)`.
    Conv2d,
}

impl LayerKind {
    /// Classifies a weight tensor by rank.
    ///
    /// Returns [`TransformError::InvalidShape`] for any rank other than 2 or 4.
    pub fn of(weight: &ArrayD<f32>) -> Result<Self> {
        match weight.ndim() {
            2 => Ok(LayerKind::Dense),
            4 => Ok(LayerKind::Conv2d),
            n => Err(TransformError::InvalidShape(format!(
                "weight tensor must have rank 2 (dense) or 4 (conv2d), got rank {}",
                n
            ))),
        }
    }

    /// The axis that indexes output units (columns for dense, filters for conv).
    pub fn unit_axis(&self) -> Axis {
        match self {
            LayerKind::Dense => Axis(1),
            LayerKind::Conv2d => Axis(3),
        }
    }

    /// The axis that consumes the previous layer's units.
    pub fn input_axis(&self) -> Axis {
        match self {
            LayerKind::Dense => Axis(0),
            LayerKind::Conv2d => Axis(2),
        }
    }

    /// Number of output units (the layer's width).
    pub fn width(&self, weight: &ArrayD<f32>) -> usize {
        weight.len_of(self.unit_axis())
    }

    /// Number of units consumed on the input side.
    pub fn fan_in(&self, weight: &ArrayD<f32>) -> usize {
        weight.len_of(self.input_axis())
    }
}
