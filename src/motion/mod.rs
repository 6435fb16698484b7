//! Dense motion estimation.
//!
//! A `MotionEstimator` turns two consecutive grayscale frames into a
//! `DisplacementField`. Backends:
//! - `pyramidal-lk`: dense iterative pyramidal Lucas-Kanade (default)
//! - `block-match`: dense block matching by minimum SAD

pub mod backends;
mod estimator;
mod field;

pub use backends::{BlockMatchConfig, BlockMatcher, PyramidalLk, PyramidalLkConfig};
pub use estimator::{EstimatorKind, MotionConfig, MotionEstimator};
pub use field::DisplacementField;
