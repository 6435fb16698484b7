//! Synthetic frame source (`stub://`).
//!
//! Renders a textured subject block over a static textured background and
//! moves it along a script of constant-velocity legs. The subject spans the
//! full frame height and three fifths of its width, roughly what a person
//! standing close to a doorway camera looks like.
//!
//! Output is fully deterministic for a given config, including the optional
//! sensor noise, which is drawn from a seeded generator.

use chrono::{DateTime, Duration, Local};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::error::TrackerError;
use crate::frame::RawFrame;

/// Subject speed cap, in pixels per frame.
const MAX_WALK_SPEED: i64 = 6;

/// One leg of the scripted walk: `frames` frames at `velocity_x` px/frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leg {
    pub frames: u32,
    pub velocity_x: i64,
}

impl Leg {
    pub fn pause(frames: u32) -> Self {
        Self {
            frames,
            velocity_x: 0,
        }
    }

    pub fn walk(frames: u32, velocity_x: i64) -> Self {
        Self { frames, velocity_x }
    }
}

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Left edge of the subject in the first frame.
    pub start_x: i64,
    pub subject_width: u32,
    pub script: Vec<Leg>,
    /// Uniform per-pixel noise amplitude (0 disables noise).
    pub noise: u8,
    pub seed: u64,
}

impl SyntheticConfig {
    /// Subject starts at the left edge, walks right until its right edge
    /// reaches the frame edge, pauses, walks back, pauses.
    pub fn out_and_back(uri: &str, width: u32, height: u32, target_fps: u32) -> Self {
        let subject_width = width * 3 / 5;
        let travel = (width - subject_width) as i64;
        let speed = (travel / 10).clamp(1, MAX_WALK_SPEED);
        let walk_frames = (travel / speed).max(1) as u32;
        Self {
            uri: uri.to_string(),
            width,
            height,
            target_fps,
            start_x: 0,
            subject_width,
            script: vec![
                Leg::pause(3),
                Leg::walk(walk_frames, speed),
                Leg::pause(5),
                Leg::walk(walk_frames, -speed),
                Leg::pause(3),
            ],
            noise: 0,
            seed: 0x5EED,
        }
    }

    /// Subject never moves.
    pub fn idle(uri: &str, width: u32, height: u32, target_fps: u32, frames: u32) -> Self {
        Self {
            script: vec![Leg::pause(frames)],
            ..Self::out_and_back(uri, width, height, target_fps)
        }
    }

    pub fn from_settings(settings: &SourceSettings) -> Self {
        let mut config = if settings.uri.trim_start_matches("stub://").starts_with("idle") {
            Self::idle(&settings.uri, settings.width, settings.height, settings.target_fps, 30)
        } else {
            Self::out_and_back(&settings.uri, settings.width, settings.height, settings.target_fps)
        };
        config.noise = settings.noise;
        config
    }

    pub fn with_noise(mut self, noise: u8, seed: u64) -> Self {
        self.noise = noise;
        self.seed = seed;
        self
    }

    /// Frames the script produces, counting the initial frame.
    pub fn total_frames(&self) -> u64 {
        1 + self.script.iter().map(|leg| leg.frames as u64).sum::<u64>()
    }

    fn frame_interval(&self) -> Duration {
        Duration::milliseconds(1000 / self.target_fps.max(1) as i64)
    }
}

/// Synthetic frame source.
pub struct SyntheticSource {
    config: SyntheticConfig,
    connected: bool,
    epoch: DateTime<Local>,
    rng: StdRng,
    /// Subject left edge for every frame the script yields.
    positions: Vec<i64>,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let mut positions = vec![config.start_x];
        let mut x = config.start_x;
        for leg in &config.script {
            for _ in 0..leg.frames {
                x += leg.velocity_x;
                positions.push(x);
            }
        }
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            connected: false,
            epoch: Local::now(),
            positions,
            frame_count: 0,
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn render(&mut self, subject_x: i64) -> RgbImage {
        let subject_w = self.config.subject_width as i64;
        let noise = self.config.noise as i16;
        let mut img = RgbImage::new(self.config.width, self.config.height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let (xi, yi) = (x as i64, y as i64);
            let base = if xi >= subject_x && xi < subject_x + subject_w {
                // Subject texture travels with the subject.
                texture(xi - subject_x, yi, 0xA5A5) / 2 + 128
            } else {
                texture(xi, yi, 0x3C3C) / 2
            };
            let value = if noise > 0 {
                (base as i16 + self.rng.gen_range(-noise..=noise)).clamp(0, 255) as u8
            } else {
                base
            };
            *pixel = Rgb([value, value, value]);
        }
        img
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<(), TrackerError> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{}, {} frames)",
            self.config.uri,
            self.config.width,
            self.config.height,
            self.positions.len()
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, TrackerError> {
        if !self.connected {
            return Err(TrackerError::source("synthetic source not connected"));
        }
        let Some(&subject_x) = self.positions.get(self.frame_count as usize) else {
            return Ok(None);
        };
        let captured_at = self.epoch + self.config.frame_interval() * self.frame_count as i32;
        self.frame_count += 1;
        let image = self.render(subject_x);
        Ok(Some(RawFrame::new(image, captured_at, self.frame_count)))
    }

    fn release(&mut self) {
        if self.connected {
            log::info!("SyntheticSource: released {}", self.config.uri);
        }
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_unavailable: 0,
            uri: self.config.uri.clone(),
        }
    }
}

/// Non-repeating pseudo-random texture in 0..=255.
fn texture(x: i64, y: i64, salt: u64) -> u8 {
    let mut v = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ salt;
    v ^= v >> 29;
    v = v.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    v ^= v >> 32;
    (v & 0xFF) as u8
}
