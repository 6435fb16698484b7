//! One analysis cycle: estimate, aggregate, detect.
//!
//! `process_frame_pair` is independent of any source, sink or display. It
//! takes the detector state by value and hands back the state for the next
//! cycle, so a failure anywhere in the chain leaves the caller's state as it
//! was.

use chrono::{DateTime, Local};

use crate::detector::{self, CrossingEvent, CrossingLine, DetectorState, DEFAULT_FLOW_THRESHOLD};
use crate::error::TrackerError;
use crate::frame::Frame;
use crate::motion::MotionEstimator;
use crate::signal::{self, AggregatedSignal, DEFAULT_SIGNIFICANCE_THRESHOLD};

/// Thresholds shared by the aggregator and the detector.
///
/// Both are in displacement units of the chosen estimator; their useful
/// values depend on the backend and the frame resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    /// Per-pixel motion magnitude above which a pixel is significant.
    pub significance: f32,
    /// Mean horizontal flow a frame must exceed to fire a crossing.
    pub flow: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            significance: DEFAULT_SIGNIFICANCE_THRESHOLD,
            flow: DEFAULT_FLOW_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !(self.significance.is_finite() && self.significance > 0.0) {
            return Err(TrackerError::invalid_config(format!(
                "significance threshold must be a positive number, got {}",
                self.significance
            )));
        }
        if !(self.flow.is_finite() && self.flow > 0.0) {
            return Err(TrackerError::invalid_config(format!(
                "flow threshold must be a positive number, got {}",
                self.flow
            )));
        }
        Ok(())
    }
}

/// Identity of the frame being analysed, copied into any event it triggers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStamp {
    pub captured_at: DateTime<Local>,
    pub sequence: u64,
}

/// Everything one cycle produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleOutcome {
    pub signal: AggregatedSignal,
    pub event: Option<CrossingEvent>,
    pub state: DetectorState,
}

/// Run the full motion pipeline on one frame pair.
pub fn process_frame_pair(
    estimator: &mut dyn MotionEstimator,
    previous: &Frame,
    current: &Frame,
    state: DetectorState,
    line: CrossingLine,
    thresholds: &Thresholds,
    stamp: FrameStamp,
) -> Result<CycleOutcome, TrackerError> {
    let field = estimator.estimate(previous, current)?;
    let signal = signal::aggregate(&field, thresholds.significance);
    let transition = detector::evaluate(&signal, state, line.position(), thresholds.flow);

    log::trace!(
        "frame {}: mean_flow_x={:.3} significant={} position={:?}",
        stamp.sequence,
        signal.mean_flow_x,
        signal.significant_pixels,
        signal.significant_mean_position_x
    );

    let event = transition.fired.map(|direction| CrossingEvent {
        direction,
        timestamp: stamp.captured_at,
        frame_index: stamp.sequence,
        // `fired` implies a defined position.
        position_x: signal.significant_mean_position_x.unwrap_or_default(),
        mean_flow_x: signal.mean_flow_x,
    });

    Ok(CycleOutcome {
        signal,
        event,
        state: transition.state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Direction;
    use crate::motion::{BlockMatcher, DisplacementField, PyramidalLk};

    /// Returns a fixed field regardless of input.
    struct FixedField(DisplacementField);

    impl MotionEstimator for FixedField {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn estimate(&mut self, _: &Frame, _: &Frame) -> Result<DisplacementField, TrackerError> {
            Ok(self.0.clone())
        }
    }

    fn stamp(sequence: u64) -> FrameStamp {
        FrameStamp {
            captured_at: Local::now(),
            sequence,
        }
    }

    fn blank(width: u32) -> Frame {
        Frame::from_fn(width, 4, |_, _| 0)
    }

    #[test]
    fn rightward_motion_right_of_line_emits_exit() {
        // Columns 6..8 move right by 12: mean flow 3.0, position 6.5.
        let field = DisplacementField::from_fn(8, 4, |x, _| if x >= 6 { (12.0, 0.0) } else { (0.0, 0.0) });
        let mut est = FixedField(field);
        let out = process_frame_pair(
            &mut est,
            &blank(8),
            &blank(8),
            DetectorState::default(),
            CrossingLine::at_midpoint(8),
            &Thresholds::default(),
            stamp(9),
        )
        .unwrap();

        assert_eq!(out.signal.mean_flow_x, 3.0);
        assert_eq!(out.signal.significant_mean_position_x, Some(6.5));
        let event = out.event.expect("exit event");
        assert_eq!(event.direction, Direction::Exited);
        assert_eq!(event.frame_index, 9);
        assert_eq!(event.position_x, 6.5);
        assert_eq!(out.state.last_significant_position_x, Some(6.5));
    }

    #[test]
    fn static_frames_never_emit() {
        let frame = Frame::from_fn(32, 24, |x, y| ((x * 7 + y * 13) % 255) as u8);
        let line = CrossingLine::at_midpoint(32);
        let estimators: Vec<Box<dyn MotionEstimator>> =
            vec![Box::new(PyramidalLk::default()), Box::new(BlockMatcher::default())];
        for mut est in estimators {
            let mut state = DetectorState::default();
            for i in 0..20 {
                let out = process_frame_pair(
                    est.as_mut(),
                    &frame,
                    &frame,
                    state,
                    line,
                    &Thresholds::default(),
                    stamp(i),
                )
                .unwrap();
                assert!(out.event.is_none());
                assert_eq!(out.signal.significant_mean_position_x, None);
                state = out.state;
            }
            assert_eq!(state, DetectorState::default());
        }
    }

    #[test]
    fn estimator_failure_surfaces_without_outcome() {
        let mut est = PyramidalLk::default();
        let err = process_frame_pair(
            &mut est,
            &blank(8),
            &blank(10),
            DetectorState::default(),
            CrossingLine::at_midpoint(8),
            &Thresholds::default(),
            stamp(1),
        )
        .unwrap_err();
        assert!(matches!(err, TrackerError::DimensionMismatch { .. }));
    }

    #[test]
    fn thresholds_must_be_positive_and_finite() {
        assert!(Thresholds::default().validate().is_ok());
        for (significance, flow) in [(0.0, 2.0), (2.0, 0.0), (-1.0, 2.0), (2.0, f64::NAN), (f32::INFINITY, 2.0)] {
            let t = Thresholds { significance, flow };
            assert!(matches!(
                t.validate(),
                Err(TrackerError::InvalidConfiguration { .. })
            ));
        }
    }
}
