//! Function-preserving network transformations.
//!
//! The two operators here take trained "teacher" parameters and produce
//! initial parameters for a larger "student" network that computes the same
//! function at the moment of transformation:
//!
//! - [`widen`]: grow a layer's output width (and the next layer's input width)
//!   by replicating units and rescaling their outgoing weights.
//! - [`deepen`]: insert a new identity-initialized layer after an existing one.
//!
//! Both are pure functions over `ndarray` tensors: inputs are never mutated,
//! outputs are freshly allocated, and all randomness comes from an explicit
//! optional seed so callers can reproduce a transformation exactly.
//!
//! # Example
//!
//! ```rust,ignore
//! use net2net::transform::{widen, WidenConfig};
//!
//! let cfg = WidenConfig::new(128).with_seed(42);
//! let widened = widen(&w1, &b1, &w2, &cfg)?;
//! // widened.weight / widened.bias / widened.next_weight initialize the student
//! ```

pub mod deeper;
pub mod mapping;
pub mod wider;

pub use deeper::{deepen, DeepenConfig, DeepenedLayer};
pub use mapping::UnitMapping;
pub use wider::{widen, WidenConfig, WidenedLayer};

use thiserror::Error;

/// Relative scale of the symmetry-breaking noise. Perturbations are drawn
/// with a standard deviation of `NOISE_FACTOR` times the standard deviation
/// of the values they are added to.
pub const NOISE_FACTOR: f32 = 5e-2;

/// Errors raised by the transformation operators.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("invalid tensor shape: {0}")]
    InvalidShape(String),

    #[error("function-preservation precondition violated: {0}")]
    PreconditionViolation(String),
}

pub type Result<T> = std::result::Result<T, TransformError>;
