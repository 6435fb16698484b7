//! Still-image sequence source.
//!
//! Reads every PNG or JPEG file of a local directory, in file-name order, as
//! one frame each. A file that fails to decode is reported as an unavailable
//! frame and skipped; the sequence ends after the last file.

use chrono::Local;
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::error::TrackerError;
use crate::frame::RawFrame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Directory-of-images frame source.
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    connected: bool,
    frames_captured: u64,
    frames_unavailable: u64,
}

impl ImageSequenceSource {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: Vec::new(),
            cursor: 0,
            connected: false,
            frames_captured: 0,
            frames_unavailable: 0,
        }
    }

    /// Files queued for this sequence, in playback order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn connect(&mut self) -> Result<(), TrackerError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            TrackerError::source(format!(
                "failed to open image directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if is_image_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(TrackerError::source(format!(
                "no png/jpeg images in {}",
                self.dir.display()
            )));
        }
        log::info!(
            "ImageSequenceSource: connected to {} ({} images)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, TrackerError> {
        if !self.connected {
            return Err(TrackerError::source("image sequence not connected"));
        }
        let Some(path) = self.files.get(self.cursor).cloned() else {
            return Ok(None);
        };
        self.cursor += 1;

        match image::open(&path) {
            Ok(img) => {
                self.frames_captured += 1;
                Ok(Some(RawFrame::new(
                    img.to_rgb8(),
                    Local::now(),
                    self.cursor as u64,
                )))
            }
            Err(e) => {
                self.frames_unavailable += 1;
                Err(TrackerError::unavailable(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }

    fn release(&mut self) {
        if self.connected {
            log::info!("ImageSequenceSource: released {}", self.dir.display());
        }
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            frames_unavailable: self.frames_unavailable,
            uri: self.dir.display().to_string(),
        }
    }
}
