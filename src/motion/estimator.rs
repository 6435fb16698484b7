use serde::Deserialize;

use crate::error::TrackerError;
use crate::frame::Frame;
use crate::motion::backends::{BlockMatchConfig, BlockMatcher, PyramidalLk, PyramidalLkConfig};
use crate::motion::DisplacementField;

/// Dense motion estimator.
///
/// Implementations must be deterministic: the same pair of frames always
/// yields the same field. They must not retain either frame beyond the call;
/// the session owns the previous frame.
pub trait MotionEstimator: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Estimate per-pixel motion from `previous` to `current`.
    ///
    /// Fails with `FrameUnavailable` for empty frames and with
    /// `DimensionMismatch` when the two frames differ in shape.
    fn estimate(
        &mut self,
        previous: &Frame,
        current: &Frame,
    ) -> Result<DisplacementField, TrackerError>;
}

/// Reject frame pairs no estimator can work on.
pub(crate) fn check_pair(previous: &Frame, current: &Frame) -> Result<(), TrackerError> {
    if previous.is_empty() || current.is_empty() {
        return Err(TrackerError::unavailable("empty frame"));
    }
    if previous.dimensions() != current.dimensions() {
        return Err(TrackerError::dimension_mismatch(
            previous.dimensions(),
            current.dimensions(),
        ));
    }
    Ok(())
}

/// Which backend a session uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    #[default]
    PyramidalLk,
    BlockMatch,
}

impl EstimatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EstimatorKind::PyramidalLk => "pyramidal-lk",
            EstimatorKind::BlockMatch => "block-match",
        }
    }
}

impl std::str::FromStr for EstimatorKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pyramidal-lk" | "lk" => Ok(EstimatorKind::PyramidalLk),
            "block-match" | "block" => Ok(EstimatorKind::BlockMatch),
            other => Err(TrackerError::invalid_config(format!(
                "unknown motion estimator '{}'",
                other
            ))),
        }
    }
}

/// Motion estimator selection plus per-backend tuning.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotionConfig {
    pub kind: EstimatorKind,
    pub pyramidal_lk: PyramidalLkConfig,
    pub block_match: BlockMatchConfig,
}

impl MotionConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        match self.kind {
            EstimatorKind::PyramidalLk => self.pyramidal_lk.validate(),
            EstimatorKind::BlockMatch => self.block_match.validate(),
        }
    }

    /// Instantiate the configured backend.
    pub fn build(&self) -> Result<Box<dyn MotionEstimator>, TrackerError> {
        self.validate()?;
        Ok(match self.kind {
            EstimatorKind::PyramidalLk => Box::new(PyramidalLk::new(self.pyramidal_lk.clone())),
            EstimatorKind::BlockMatch => Box::new(BlockMatcher::new(self.block_match.clone())),
        })
    }
}
