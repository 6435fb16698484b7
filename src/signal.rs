//! Reduction of a displacement field to one directional signal per frame.

use serde::Serialize;

use crate::motion::DisplacementField;

/// Default magnitude above which a pixel counts as moving.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f32 = 2.0;

/// Per-frame summary of a displacement field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AggregatedSignal {
    /// Mean horizontal displacement over every pixel. Positive is rightward
    /// in the displayed (possibly mirrored) frame.
    pub mean_flow_x: f64,
    /// Mean x coordinate of the significant pixels. `None` means no pixel
    /// moved enough this frame, which is not the same as motion at x = 0.
    pub significant_mean_position_x: Option<f64>,
    /// How many pixels passed the significance threshold.
    pub significant_pixels: usize,
}

impl AggregatedSignal {
    pub fn has_significant_motion(&self) -> bool {
        self.significant_mean_position_x.is_some()
    }
}

/// Aggregate `field` with the given significance threshold.
///
/// A pixel is significant when the Euclidean length of its vector is strictly
/// greater than `significance_threshold`.
pub fn aggregate(field: &DisplacementField, significance_threshold: f32) -> AggregatedSignal {
    if field.is_empty() {
        return AggregatedSignal {
            mean_flow_x: 0.0,
            significant_mean_position_x: None,
            significant_pixels: 0,
        };
    }

    let mut flow_x_sum = 0.0f64;
    let mut position_sum = 0.0f64;
    let mut significant = 0usize;

    for (x, _, u, v) in field.vectors() {
        flow_x_sum += u as f64;
        if (u * u + v * v).sqrt() > significance_threshold {
            position_sum += x as f64;
            significant += 1;
        }
    }

    AggregatedSignal {
        mean_flow_x: flow_x_sum / field.len() as f64,
        significant_mean_position_x: (significant > 0)
            .then(|| position_sum / significant as f64),
        significant_pixels: significant,
    }
}
