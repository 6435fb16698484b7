//! Display collaborators.
//!
//! Nothing here affects detection. Observers see each analysed frame along
//! with the crossing line, after the event for that frame (if any) has been
//! delivered.

use image::{GrayImage, Luma};
use std::path::PathBuf;

use crate::frame::Frame;

/// Width of the drawn crossing line, in pixels.
pub const LINE_THICKNESS: u32 = 2;

const LINE_INTENSITY: u8 = 255;

pub trait FrameObserver {
    fn on_frame(&mut self, frame: &Frame, line_x: u32);
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl FrameObserver for NullObserver {
    fn on_frame(&mut self, _frame: &Frame, _line_x: u32) {}
}

/// Copy of `frame` with the crossing line drawn over it.
///
/// The line covers columns `line_x .. line_x + LINE_THICKNESS`, clipped to
/// the frame.
pub fn annotate_line(frame: &Frame, line_x: u32) -> GrayImage {
    let mut img = frame.as_image().clone();
    let end = line_x.saturating_add(LINE_THICKNESS).min(img.width());
    for x in line_x.min(end)..end {
        for y in 0..img.height() {
            img.put_pixel(x, y, Luma([LINE_INTENSITY]));
        }
    }
    img
}

/// Writes every `every`-th annotated frame as a PNG into `dir`.
///
/// Write failures are logged and the frame is dropped; a broken snapshot
/// directory never interrupts tracking.
pub struct SnapshotObserver {
    dir: PathBuf,
    every: u64,
    seen: u64,
    written: u64,
}

impl SnapshotObserver {
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            dir: dir.into(),
            every: every.max(1),
            seen: 0,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameObserver for SnapshotObserver {
    fn on_frame(&mut self, frame: &Frame, line_x: u32) {
        self.seen += 1;
        if (self.seen - 1) % self.every != 0 {
            return;
        }
        let path = self.dir.join(format!("frame_{:06}.png", self.seen));
        match annotate_line(frame, line_x).save(&path) {
            Ok(()) => {
                self.written += 1;
                log::trace!("snapshot written to {}", path.display());
            }
            Err(err) => log::warn!("failed to write snapshot {}: {}", path.display(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_draws_two_pixel_line() {
        let frame = Frame::from_fn(8, 3, |_, _| 10);
        let img = annotate_line(&frame, 4);
        for y in 0..3 {
            assert_eq!(img.get_pixel(3, y)[0], 10);
            assert_eq!(img.get_pixel(4, y)[0], 255);
            assert_eq!(img.get_pixel(5, y)[0], 255);
            assert_eq!(img.get_pixel(6, y)[0], 10);
        }
        // Source frame is untouched.
        assert_eq!(frame.intensity(4, 0), 10);
    }

    #[test]
    fn annotate_clips_at_right_edge() {
        let frame = Frame::from_fn(4, 2, |_, _| 0);
        let img = annotate_line(&frame, 3);
        assert_eq!(img.get_pixel(3, 1)[0], 255);
        let img = annotate_line(&frame, 9);
        assert!(img.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn snapshot_observer_writes_every_nth_frame() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut observer = SnapshotObserver::new(dir.path(), 2);
        let frame = Frame::from_fn(6, 4, |x, _| (x * 20) as u8);
        for _ in 0..5 {
            observer.on_frame(&frame, 3);
        }
        assert_eq!(observer.written(), 3);
        assert!(dir.path().join("frame_000001.png").exists());
        assert!(dir.path().join("frame_000003.png").exists());
        assert!(!dir.path().join("frame_000002.png").exists());

        let saved = image::open(dir.path().join("frame_000005.png"))?.to_luma8();
        assert_eq!(saved.get_pixel(3, 0)[0], 255);
        assert_eq!(saved.get_pixel(1, 0)[0], 20);
        Ok(())
    }
}
