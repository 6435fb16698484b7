//! Tracking session lifecycle.
//!
//! A `TrackingSession` owns everything that lives for one run: the estimator,
//! the crossing line, the previous grayscale frame and the detector state.
//! `run` drives a single-threaded loop over a `FrameSource` until the stop
//! signal is raised, the source runs dry, or the source stops delivering
//! frames altogether. The source is released on every exit path, including
//! errors and panics.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{TrackerConfig, DEFAULT_MAX_CONSECUTIVE_UNAVAILABLE};
use crate::detector::{CrossingEvent, CrossingLine, DetectorState, Direction};
use crate::display::FrameObserver;
use crate::error::TrackerError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::motion::MotionEstimator;
use crate::pipeline::{process_frame_pair, FrameStamp, Thresholds};
use crate::sink::EventSink;

// ----------------------------------------------------------------------------
// Stop signal
// ----------------------------------------------------------------------------

/// Cooperative stop flag, shareable across threads.
///
/// The session polls it at the top of every cycle, so a frame already in
/// flight is finished before the loop exits.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// Configuration and results
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub thresholds: Thresholds,
    /// Mirror frames horizontally before analysis.
    pub mirror: bool,
    /// Unavailable frames in a row after which the source counts as lost.
    pub max_consecutive_unavailable: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            mirror: true,
            max_consecutive_unavailable: DEFAULT_MAX_CONSECUTIVE_UNAVAILABLE,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.thresholds.validate()?;
        if self.max_consecutive_unavailable == 0 {
            return Err(TrackerError::invalid_config(
                "max_consecutive_unavailable must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Why a session loop ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The stop signal was raised.
    Stopped,
    /// The source reported that it has no more frames.
    Exhausted,
    /// Too many consecutive frames were unavailable.
    SourceLost,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Frames delivered by the source.
    pub frames_received: u64,
    /// Frame pairs that went through the motion pipeline.
    pub frames_analysed: u64,
    /// Cycles skipped because a frame was unavailable.
    pub frames_unavailable: u64,
    pub exits: u64,
    pub entries: u64,
    pub sink_failures: u64,
}

impl SessionStats {
    pub fn events(&self) -> u64 {
        self.exits + self.entries
    }

    fn record(&mut self, direction: Direction) {
        match direction {
            Direction::Exited => self.exits += 1,
            Direction::Entered => self.entries += 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub end: SessionEnd,
    /// Crossing line column, once the first frame fixed it.
    pub line_x: Option<u32>,
    pub estimator: &'static str,
    pub stats: SessionStats,
}

// ----------------------------------------------------------------------------
// Source guard
// ----------------------------------------------------------------------------

/// Holds a connected source and releases it when dropped.
struct SourceGuard<'a> {
    source: &'a mut dyn FrameSource,
}

impl<'a> SourceGuard<'a> {
    fn acquire(source: &'a mut dyn FrameSource) -> Result<Self, TrackerError> {
        let guard = Self { source };
        // A half-open source is released by the guard too.
        guard.source.connect()?;
        Ok(guard)
    }
}

impl Drop for SourceGuard<'_> {
    fn drop(&mut self) {
        self.source.release();
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

enum Cycle {
    Primed,
    Analysed,
    Exhausted,
}

pub struct TrackingSession {
    config: SessionConfig,
    estimator: Box<dyn MotionEstimator>,
    line: Option<CrossingLine>,
    previous: Option<Frame>,
    state: DetectorState,
    stats: SessionStats,
}

impl TrackingSession {
    /// Validate `config` and create an idle session.
    pub fn new(
        config: SessionConfig,
        estimator: Box<dyn MotionEstimator>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            config,
            estimator,
            line: None,
            previous: None,
            state: DetectorState::default(),
            stats: SessionStats::default(),
        })
    }

    /// Session with the estimator and parameters named by `config`.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        Self::new(config.session_config(), config.motion.build()?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn estimator_name(&self) -> &'static str {
        self.estimator.name()
    }

    pub fn line(&self) -> Option<CrossingLine> {
        self.line
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Track `source` until stopped, exhausted or lost.
    ///
    /// Events go to `sink` in frame order; every frame that made it through
    /// the pipeline goes to `observer` afterwards. Fatal errors (a source
    /// failure, a frame size change) end the run with `Err`. The source is
    /// released before this returns, whatever the outcome.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn EventSink,
        observer: &mut dyn FrameObserver,
        stop: &StopSignal,
    ) -> Result<SessionSummary, TrackerError> {
        self.line = None;
        self.previous = None;
        self.state = DetectorState::default();
        self.stats = SessionStats::default();

        let mut guard = SourceGuard::acquire(source)?;
        let mut consecutive_unavailable = 0u32;

        let end = loop {
            if stop.is_raised() {
                log::info!("session: stop requested");
                break SessionEnd::Stopped;
            }
            match self.cycle(&mut guard, sink, observer) {
                Ok(Cycle::Exhausted) => {
                    log::info!("session: source exhausted");
                    break SessionEnd::Exhausted;
                }
                Ok(Cycle::Primed | Cycle::Analysed) => consecutive_unavailable = 0,
                Err(err) if err.is_recoverable() => {
                    self.stats.frames_unavailable += 1;
                    consecutive_unavailable += 1;
                    log::debug!("session: skipping cycle: {}", err);
                    if consecutive_unavailable >= self.config.max_consecutive_unavailable {
                        log::warn!(
                            "session: {} consecutive frames unavailable, giving up on source",
                            consecutive_unavailable
                        );
                        break SessionEnd::SourceLost;
                    }
                }
                Err(err) => {
                    log::error!("session: {}", err);
                    return Err(err);
                }
            }
        };

        drop(guard);
        Ok(SessionSummary {
            end,
            line_x: self.line.map(|line| line.x()),
            estimator: self.estimator.name(),
            stats: self.stats,
        })
    }

    fn cycle(
        &mut self,
        guard: &mut SourceGuard<'_>,
        sink: &mut dyn EventSink,
        observer: &mut dyn FrameObserver,
    ) -> Result<Cycle, TrackerError> {
        let Some(raw) = guard.source.next_frame()? else {
            return Ok(Cycle::Exhausted);
        };
        self.stats.frames_received += 1;
        if raw.is_empty() {
            return Err(TrackerError::unavailable(format!(
                "frame {} has no pixels",
                raw.sequence
            )));
        }
        let stamp = FrameStamp {
            captured_at: raw.captured_at,
            sequence: raw.sequence,
        };
        let current = Frame::from_raw(&raw, self.config.mirror);

        let (Some(previous), Some(line)) = (self.previous.as_ref(), self.line) else {
            let line = CrossingLine::at_midpoint(current.width());
            log::info!(
                "session: first frame {}x{}, crossing line at x={}",
                current.width(),
                current.height(),
                line.x()
            );
            observer.on_frame(&current, line.x());
            self.line = Some(line);
            self.previous = Some(current);
            return Ok(Cycle::Primed);
        };
        // Frame size is fixed by the first frame; the line depends on it.
        if previous.dimensions() != current.dimensions() {
            return Err(TrackerError::dimension_mismatch(
                previous.dimensions(),
                current.dimensions(),
            ));
        }

        let outcome = process_frame_pair(
            self.estimator.as_mut(),
            previous,
            &current,
            self.state,
            line,
            &self.config.thresholds,
            stamp,
        )?;
        self.stats.frames_analysed += 1;
        self.state = outcome.state;

        if let Some(event) = &outcome.event {
            self.emit(event, sink);
        }
        observer.on_frame(&current, line.x());
        self.previous = Some(current);
        Ok(Cycle::Analysed)
    }

    fn emit(&mut self, event: &CrossingEvent, sink: &mut dyn EventSink) {
        self.stats.record(event.direction);
        log::info!(
            "crossing: {:?} at frame {} (x={:.1}, flow={:.2})",
            event.direction,
            event.frame_index,
            event.position_x,
            event.mean_flow_x
        );
        if let Err(err) = sink.on_event(event) {
            self.stats.sink_failures += 1;
            log::warn!("event sink failed: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let stop = StopSignal::new();
        let handle = stop.clone();
        assert!(!stop.is_raised());
        handle.raise();
        assert!(stop.is_raised());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let bad = SessionConfig {
            max_consecutive_unavailable: 0,
            ..SessionConfig::default()
        };
        let estimator = Box::new(crate::motion::BlockMatcher::default());
        assert!(matches!(
            TrackingSession::new(bad, estimator),
            Err(TrackerError::InvalidConfiguration { .. })
        ));

        let bad = SessionConfig {
            thresholds: Thresholds {
                significance: 2.0,
                flow: -1.0,
            },
            ..SessionConfig::default()
        };
        let estimator = Box::new(crate::motion::BlockMatcher::default());
        assert!(TrackingSession::new(bad, estimator).is_err());
    }

    #[test]
    fn stats_count_events_by_direction() {
        let mut stats = SessionStats::default();
        stats.record(Direction::Exited);
        stats.record(Direction::Entered);
        stats.record(Direction::Exited);
        assert_eq!((stats.exits, stats.entries, stats.events()), (2, 1, 3));
    }
}
