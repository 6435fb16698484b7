//! Frame ingestion sources.
//!
//! This module provides the sources a tracking session pulls frames from:
//! - Synthetic scenes (`stub://...`) for tests and the demo
//! - Directories of still images, read in file-name order
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! All sources produce `RawFrame` instances. `next_frame` distinguishes:
//! - `Ok(Some(frame))`: a frame was captured
//! - `Ok(None)`: the source is exhausted; the session ends
//! - `Err(FrameUnavailable)`: this read failed; the session skips the cycle
//!
//! Any other error is fatal to the session.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod sequence;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use sequence::ImageSequenceSource;
pub use synthetic::{Leg, SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

use std::path::PathBuf;

use crate::config::SourceSettings;
use crate::error::TrackerError;
use crate::frame::RawFrame;

/// A supplier of successive frames.
pub trait FrameSource {
    /// Open the underlying device or file set.
    fn connect(&mut self) -> Result<(), TrackerError>;

    /// Capture the next frame. Must fail fast rather than block indefinitely.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, TrackerError>;

    /// Release the underlying resource. Safe to call more than once.
    fn release(&mut self);

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_unavailable: u64,
    pub uri: String,
}

/// Open the source named by `settings.uri`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>, TrackerError> {
    let uri = settings.uri.trim();
    if uri.is_empty() {
        return Err(TrackerError::invalid_config("source uri must not be empty"));
    }
    if uri.starts_with("stub://") {
        let config = SyntheticConfig::from_settings(settings);
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if uri.starts_with("/dev/video") {
        #[cfg(feature = "ingest-v4l2")]
        {
            let config = V4l2Config {
                device: uri.to_string(),
                target_fps: settings.target_fps,
                width: settings.width,
                height: settings.height,
            };
            return Ok(Box::new(V4l2Source::new(config)));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            return Err(TrackerError::source(
                "camera capture requires the ingest-v4l2 feature",
            ));
        }
    }
    if uri.contains("://") {
        return Err(TrackerError::invalid_config(format!(
            "unsupported source scheme in '{}'",
            uri
        )));
    }
    Ok(Box::new(ImageSequenceSource::new(PathBuf::from(uri))))
}
