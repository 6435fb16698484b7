//! Crossline
//!
//! Directional line-crossing detection from dense optical flow.
//!
//! # Architecture
//!
//! Each cycle compares the current grayscale frame against the previous one:
//!
//! 1. **Motion estimation**: a dense displacement field (pyramidal
//!    Lucas-Kanade or block matching).
//! 2. **Aggregation**: mean horizontal flow plus the mean x position of the
//!    pixels that moved significantly.
//! 3. **Detection**: an edge-triggered rule against a vertical line at the
//!    frame midpoint emits `Exited` (rightward) or `Entered` (leftward), at
//!    most once per crossing.
//!
//! The cycle itself (`pipeline::process_frame_pair`) is pure and needs no
//! camera. `session::TrackingSession` drives it over a `FrameSource`.
//!
//! # Module Structure
//!
//! - `frame`: RGB capture frames and grayscale analysis frames
//! - `ingest`: Frame sources (synthetic, image directories, V4L2)
//! - `motion`: Motion estimator trait and backends
//! - `signal`, `detector`, `pipeline`: per-frame analysis
//! - `session`: lifecycle, stop signal, source release
//! - `sink`, `display`: event and frame consumers
//! - `config`: file and environment configuration

pub mod config;
pub mod detector;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod motion;
pub mod pipeline;
pub mod session;
pub mod signal;
pub mod sink;

pub use config::{SourceSettings, TrackerConfig};
pub use detector::{evaluate, CrossingEvent, CrossingLine, DetectorState, Direction, Transition};
pub use display::{annotate_line, FrameObserver, NullObserver, SnapshotObserver};
pub use error::TrackerError;
pub use frame::{Frame, RawFrame};
pub use ingest::{open_source, FrameSource, ImageSequenceSource, SourceStats, Leg, SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::{V4l2Config, V4l2Source};
pub use motion::{
    BlockMatchConfig, BlockMatcher, DisplacementField, EstimatorKind, MotionConfig,
    MotionEstimator, PyramidalLk, PyramidalLkConfig,
};
pub use pipeline::{process_frame_pair, CycleOutcome, FrameStamp, Thresholds};
pub use session::{SessionConfig, SessionEnd, SessionStats, SessionSummary, StopSignal, TrackingSession};
pub use signal::{aggregate, AggregatedSignal};
pub use sink::{EventLog, EventSink, FanOut, JsonLinesSink, LogSink};
