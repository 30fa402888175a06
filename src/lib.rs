//! # Net2Net: Function-Preserving Network Transformations
//!
//! **net2net** computes initial parameters for a larger "student" network
//! from a trained "teacher" network, such that the student computes exactly
//! the same function at the moment of transformation. Instead of starting
//! from random initialization, the enlarged network starts from the
//! teacher's accuracy and only has to learn what its new capacity adds.
//!
//! Two operators are provided:
//!
//! - **Net2Wider** ([`transform::widen`]): grows a layer's output width by
//!   replicating units, expanding and rescaling the following layer's input
//!   weights so the composed function is unchanged.
//! - **Net2Deeper** ([`transform::deepen`]): inserts a new layer initialized
//!   as an identity mapping (square identity for dense layers, a
//!   center-identity kernel for convolutions).
//!
//! ## Usage Example
//!
//! ```no_run
//! use ndarray::{Array1, Array2};
//! use net2net::transform::{widen, WidenConfig};
//!
//! // Teacher parameters: fc1 (784 -> 32) followed by fc2 (32 -> 10).
//! let w1 = Array2::<f32>::zeros((784, 32)).into_dyn();
//! let b1 = Array1::<f32>::zeros(32).into_dyn();
//! let w2 = Array2::<f32>::zeros((32, 10)).into_dyn();
//!
//! // Widen fc1 to 128 units; fc2's input side is rewired to match.
//! let student = widen(&w1, &b1, &w2, &WidenConfig::new(128).with_seed(0)).unwrap();
//! assert_eq!(student.weight.shape(), &[784, 128]);
//! assert_eq!(student.next_weight.shape(), &[128, 10]);
//! ```
//!
//! Graph construction, optimizers, datasets, checkpoints and the training
//! loop itself are the host framework's business: this crate only turns
//! tensors into tensors.

// Declare public modules that constitute the core library API.
pub mod layer;
pub mod model;
pub mod transform;
pub mod verify;

pub use layer::LayerKind;
pub use model::{ModelError, ModelParams};
pub use transform::{
    deepen, widen, DeepenConfig, DeepenedLayer, TransformError, UnitMapping, WidenConfig,
    WidenedLayer, NOISE_FACTOR,
};
