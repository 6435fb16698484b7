//! Frame types.
//!
//! - `RawFrame`: RGB image as delivered by a frame source, with capture time.
//! - `Frame`: grayscale luminance grid the motion pipeline operates on.
//!
//! Conversion is deterministic: the RGB frame is optionally mirrored
//! horizontally (so the subject sees a mirror view) and then reduced to
//! luminance. Mirroring happens first so the analysed frame and the displayed
//! frame share one coordinate system.

use chrono::{DateTime, Local};
use image::{imageops, GrayImage, Luma, RgbImage};

// ----------------------------------------------------------------------------
// RawFrame: color frame from a source
// ----------------------------------------------------------------------------

/// Color frame produced by a `FrameSource`.
#[derive(Clone, Debug)]
pub struct RawFrame {
    image: RgbImage,

    /// Wall-clock capture time. Crossing events inherit this timestamp.
    pub captured_at: DateTime<Local>,

    /// Monotonic per-source sequence number, starting at 1.
    pub sequence: u64,
}

impl RawFrame {
    pub fn new(image: RgbImage, captured_at: DateTime<Local>, sequence: u64) -> Self {
        Self {
            image,
            captured_at,
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// A frame with no pixels is what a half-initialised capture looks like.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

// ----------------------------------------------------------------------------
// Frame: grayscale analysis frame
// ----------------------------------------------------------------------------

/// Grayscale frame. Width and height are fixed for a tracking session.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pixels: GrayImage,
}

impl Frame {
    /// Convert a captured frame, mirroring it first when `mirror` is set.
    pub fn from_raw(raw: &RawFrame, mirror: bool) -> Self {
        let gray = if mirror {
            imageops::grayscale(&imageops::flip_horizontal(raw.image()))
        } else {
            imageops::grayscale(raw.image())
        };
        Self { pixels: gray }
    }

    pub fn from_gray(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    /// Build a frame from a per-pixel intensity function.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Self {
        Self {
            pixels: GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)])),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn intensity(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel(x, y).0[0]
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }

    /// Intensities as `f32`, row-major.
    pub fn to_f32(&self) -> Vec<f32> {
        self.pixels.as_raw().iter().map(|&p| p as f32).collect()
    }
}
