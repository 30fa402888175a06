// --- File: src/model.rs ---

//! In-memory named-parameter store.
//!
//! The transforms themselves only see raw tensors; this module is the
//! in-process collaborator that resolves a layer name to its weight/bias
//! pair (`"{layer}.weight"` / `"{layer}.bias"`) and installs transformation
//! results back under the right names. Loading parameters from disk and
//! rebuilding the enlarged computation graph stay with the host training
//! system; nothing here persists.

use crate::transform::{deepen, widen, DeepenConfig, TransformError, WidenConfig};
use ndarray::ArrayD;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by the parameter store.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("parameters for layer '{0}' not found (expected '{0}.weight' and '{0}.bias')")]
    MissingLayer(String),

    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

type Result<T> = std::result::Result<T, ModelError>;

/// Flat map of parameter tensors keyed by `"{layer}.{weight|bias}"`.
#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    params: HashMap<String, ArrayD<f32>>,
}

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layer's weight and bias under its name.
    pub fn insert_layer(&mut self, layer: &str, weight: ArrayD<f32>, bias: ArrayD<f32>) {
        self.params.insert(format!("{}.weight", layer), weight);
        self.params.insert(format!("{}.bias", layer), bias);
    }

    /// Resolves a layer's weight/bias pair by name.
    pub fn weight_bias(&self, layer: &str) -> Result<(&ArrayD<f32>, &ArrayD<f32>)> {
        let weight = self.params.get(&format!("{}.weight", layer));
        let bias = self.params.get(&format!("{}.bias", layer));
        match (weight, bias) {
            (Some(w), Some(b)) => Ok((w, b)),
            _ => Err(ModelError::MissingLayer(layer.to_string())),
        }
    }

    /// Raw access to a single parameter tensor.
    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.params.get(name)
    }

    /// Whether a layer's weight/bias pair is present.
    pub fn contains_layer(&self, layer: &str) -> bool {
        self.params.contains_key(&format!("{}.weight", layer))
            && self.params.contains_key(&format!("{}.bias", layer))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over all `(name, tensor)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArrayD<f32>)> {
        self.params.iter()
    }

    /// Widens `target` to `config.new_width` and rewires `next`'s input side.
    ///
    /// Replaces `target.weight`, `target.bias` and `next.weight` in place;
    /// `next.bias` is untouched (widening does not change the next layer's
    /// output units). The host system still has to rebuild its graph with
    /// the larger layer before training resumes.
    pub fn net2wider(&mut self, target: &str, next: &str, config: &WidenConfig) -> Result<()> {
        let (w1, b1) = self.weight_bias(target)?;
        let (w2, _) = self.weight_bias(next)?;

        let widened = widen(w1, b1, w2, config)?;
        log::info!(
            "net2wider: '{}' {:?} -> {:?}, rewired '{}'",
            target,
            w1.shape(),
            widened.weight.shape(),
            next
        );

        self.params
            .insert(format!("{}.weight", target), widened.weight);
        self.params.insert(format!("{}.bias", target), widened.bias);
        self.params
            .insert(format!("{}.weight", next), widened.next_weight);
        Ok(())
    }

    /// Inserts an identity-initialized layer named `new_layer` after `target`.
    ///
    /// Only the parameters are created here; the caller wires the new layer
    /// into its graph directly after `target` and before the nonlinearity's
    /// next consumer.
    pub fn net2deeper(&mut self, target: &str, new_layer: &str, config: &DeepenConfig) -> Result<()> {
        if self.contains_layer(new_layer) {
            return Err(ModelError::DuplicateLayer(new_layer.to_string()));
        }
        let (w1, _) = self.weight_bias(target)?;

        let deepened = deepen(w1, config)?;
        log::info!(
            "net2deeper: inserted '{}' after '{}' with weight {:?}",
            new_layer,
            target,
            deepened.weight.shape()
        );

        self.insert_layer(new_layer, deepened.weight, deepened.bias);
        Ok(())
    }
}
