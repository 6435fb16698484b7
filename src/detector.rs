//! Edge-triggered crossing detection.
//!
//! The detector keeps one piece of state: the significant position recorded
//! at the last crossing. A crossing in a direction fires only when the
//! recorded position lies on the side the subject is coming from, so a
//! subject that stops past the line (or lingers with flickering flow) is
//! reported once. Re-arming needs a crossing back the other way.
//!
//! There is no explicit armed/disarmed flag; the guard on the recorded
//! position encodes it. A fresh session has no recorded position, so the
//! first qualifying motion fires in either direction.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::signal::AggregatedSignal;

/// Default mean horizontal flow a frame needs before it can fire.
pub const DEFAULT_FLOW_THRESHOLD: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Moved rightward across the line.
    Exited,
    /// Moved leftward across the line.
    Entered,
}

impl Direction {
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Exited => "has gone out",
            Direction::Entered => "has come in",
        }
    }
}

/// A classified crossing. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrossingEvent {
    pub direction: Direction,
    /// Capture time of the frame that triggered the crossing.
    pub timestamp: DateTime<Local>,
    /// Sequence number of the triggering frame.
    pub frame_index: u64,
    /// Significant mean position at the triggering frame.
    pub position_x: f64,
    /// Mean horizontal flow at the triggering frame.
    pub mean_flow_x: f64,
}

impl CrossingEvent {
    /// Human-readable log line, e.g. `"alice has gone out at 14:03:22."`.
    pub fn describe(&self, subject: &str) -> String {
        format!(
            "{} {} at {}.",
            subject,
            self.direction.verb(),
            self.timestamp.format("%H:%M:%S")
        )
    }
}

/// Vertical line the subject crosses, fixed for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CrossingLine {
    x: u32,
}

impl CrossingLine {
    /// Line through the middle column of a frame `width` pixels wide.
    pub fn at_midpoint(width: u32) -> Self {
        Self { x: width / 2 }
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn position(&self) -> f64 {
        self.x as f64
    }
}

/// Position recorded at the last crossing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DetectorState {
    pub last_significant_position_x: Option<f64>,
}

/// Result of evaluating one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub fired: Option<Direction>,
    pub state: DetectorState,
}

/// Apply the crossing rule to one frame's signal.
///
/// Pure: returns the direction that fired (if any) and the state to carry
/// into the next frame. State changes only when a crossing fires.
pub fn evaluate(
    signal: &AggregatedSignal,
    state: DetectorState,
    line_x: f64,
    flow_threshold: f64,
) -> Transition {
    let unchanged = Transition {
        fired: None,
        state,
    };
    let Some(position) = signal.significant_mean_position_x else {
        return unchanged;
    };
    let last = state.last_significant_position_x;

    let exited = signal.mean_flow_x > flow_threshold
        && position > line_x
        && last.map_or(true, |p| p <= line_x);
    let entered = signal.mean_flow_x < -flow_threshold
        && position < line_x
        && last.map_or(true, |p| p >= line_x);

    let fired = if exited {
        Direction::Exited
    } else if entered {
        Direction::Entered
    } else {
        return unchanged;
    };

    Transition {
        fired: Some(fired),
        state: DetectorState {
            last_significant_position_x: Some(position),
        },
    }
}
