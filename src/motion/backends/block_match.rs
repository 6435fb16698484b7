use crate::error::TrackerError;
use crate::frame::Frame;
use crate::motion::estimator::{check_pair, MotionEstimator};
use crate::motion::DisplacementField;

/// Tuning for the block matching backend.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockMatchConfig {
    /// Side of the square blocks, in pixels.
    pub block_size: u32,
    /// Maximum displacement searched in each axis, in pixels.
    pub search_range: u32,
}

impl Default for BlockMatchConfig {
    fn default() -> Self {
        Self {
            block_size: 8,
            search_range: 8,
        }
    }
}

impl BlockMatchConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.block_size == 0 {
            return Err(TrackerError::invalid_config("block_size must be >= 1"));
        }
        if self.search_range == 0 {
            return Err(TrackerError::invalid_config("search_range must be >= 1"));
        }
        Ok(())
    }
}

/// Dense block matching.
///
/// Each block of the previous frame is searched for in the current frame
/// within `search_range`; the displacement with the lowest sum of absolute
/// differences wins and every pixel of the block inherits it. Ties go to the
/// shorter displacement, so static texture stays at zero.
pub struct BlockMatcher {
    config: BlockMatchConfig,
}

impl BlockMatcher {
    pub fn new(config: BlockMatchConfig) -> Self {
        Self { config }
    }
}

impl Default for BlockMatcher {
    fn default() -> Self {
        Self::new(BlockMatchConfig::default())
    }
}

struct Block {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl MotionEstimator for BlockMatcher {
    fn name(&self) -> &'static str {
        "block-match"
    }

    fn estimate(
        &mut self,
        previous: &Frame,
        current: &Frame,
    ) -> Result<DisplacementField, TrackerError> {
        check_pair(previous, current)?;
        let (width, height) = previous.dimensions();
        let bs = self.config.block_size;
        let range = self.config.search_range as i64;
        let mut field = DisplacementField::zeros(width, height);

        for by in (0..height).step_by(bs as usize) {
            for bx in (0..width).step_by(bs as usize) {
                let block = Block {
                    x: bx as i64,
                    y: by as i64,
                    w: bs.min(width - bx) as i64,
                    h: bs.min(height - by) as i64,
                };
                let (dx, dy) = best_displacement(previous, current, &block, range);
                for y in by..by + block.h as u32 {
                    for x in bx..bx + block.w as u32 {
                        field.set(x, y, (dx as f32, dy as f32));
                    }
                }
            }
        }
        Ok(field)
    }
}

fn best_displacement(previous: &Frame, current: &Frame, block: &Block, range: i64) -> (i64, i64) {
    let (w, h) = (previous.width() as i64, previous.height() as i64);
    let mut best = (0i64, 0i64);
    let mut best_sad = sad(previous, current, block, 0, 0, u64::MAX);

    for dy in -range..=range {
        for dx in -range..=range {
            if dx == 0 && dy == 0 {
                continue;
            }
            let tx = block.x + dx;
            let ty = block.y + dy;
            if tx < 0 || ty < 0 || tx + block.w > w || ty + block.h > h {
                continue;
            }
            let score = sad(previous, current, block, dx, dy, best_sad);
            let shorter = dx * dx + dy * dy < best.0 * best.0 + best.1 * best.1;
            if score < best_sad || (score == best_sad && shorter) {
                best_sad = score;
                best = (dx, dy);
            }
        }
    }
    best
}

/// Sum of absolute differences; stops early once `limit` is exceeded.
fn sad(previous: &Frame, current: &Frame, block: &Block, dx: i64, dy: i64, limit: u64) -> u64 {
    let mut total = 0u64;
    for j in 0..block.h {
        for i in 0..block.w {
            let px = (block.x + i) as u32;
            let py = (block.y + j) as u32;
            let a = previous.intensity(px, py) as i64;
            let b = current.intensity((block.x + dx + i) as u32, (block.y + dy + j) as u32) as i64;
            total += (a - b).unsigned_abs();
        }
        if total > limit {
            return total;
        }
    }
    total
}
