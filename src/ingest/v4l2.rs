//! V4L2 camera source.
//!
//! Captures frames from a local device node (e.g. /dev/video0) through a
//! memory-mapped buffer stream and converts each buffer to RGB. A failed
//! capture is reported as an unavailable frame; the device is released when
//! the session ends, whether it stopped cleanly or not.

use chrono::Local;
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::error::TrackerError;
use crate::frame::RawFrame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate. Drivers may pick the nearest supported rate.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// V4L2 frame source.
pub struct V4l2Source {
    config: V4l2Config,
    state: Option<V4l2State>,
    format: PixelFormat,
    frame_count: u64,
    frames_unavailable: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            frames_unavailable: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<(), TrackerError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device_err = |what: &str, err: std::io::Error| {
            TrackerError::source(format!("{} {}: {}", what, self.config.device, err))
        };

        let mut device = v4l::Device::with_path(&self.config.device)
            .map_err(|e| device_err("open v4l2 device", e))?;
        let mut format = device
            .format()
            .map_err(|e| device_err("read v4l2 format of", e))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .map_err(|e| device_err("read v4l2 format of", e))?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            TrackerError::source(format!(
                "unsupported pixel format {} on {}",
                format.fourcc, self.config.device
            ))
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4).map_err(
                    |err| TrackerError::source(format!("create v4l2 buffer stream: {}", err)),
                )
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;

        self.state = Some(state);
        self.format = pixel_format;
        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, TrackerError> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| TrackerError::source("v4l2 device not connected"))?;
        let captured = state.with_stream_mut(|stream| {
            stream.next().map(|(buf, _meta)| buf.to_vec())
        });
        let buf = match captured {
            Ok(buf) => buf,
            Err(err) => {
                self.frames_unavailable += 1;
                self.last_error = Some(err.to_string());
                return Err(TrackerError::unavailable(format!("capture v4l2 frame: {}", err)));
            }
        };
        let captured_at = Local::now();

        let image = normalize_to_rgb(&buf, self.active_width, self.active_height, self.format)
            .map_err(|err| {
                self.frames_unavailable += 1;
                err
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;
        Ok(Some(RawFrame::new(image, captured_at, self.frame_count)))
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.config.device);
        }
    }

    fn is_healthy(&self) -> bool {
        if self.state.is_none() || self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_unavailable: self.frames_unavailable,
            uri: self.config.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_connect() {
        let mut source = V4l2Source::new(V4l2Config {
            device: "/dev/video-crossline-missing".to_string(),
            ..V4l2Config::default()
        });
        assert!(matches!(
            source.connect(),
            Err(TrackerError::Source { .. })
        ));
        assert!(!source.is_healthy());
        source.release();
    }

    #[test]
    fn refuses_frames_before_connect() {
        let mut source = V4l2Source::new(V4l2Config::default());
        assert!(source.next_frame().is_err());
        assert_eq!(source.stats().uri, "/dev/video0");
    }
}
