use crate::error::TrackerError;
use crate::frame::Frame;
use crate::motion::estimator::{check_pair, MotionEstimator};
use crate::motion::DisplacementField;

/// Pyramid levels stop once either side would drop below this many pixels.
const MIN_LEVEL_SIDE: usize = 8;

/// Tuning for the dense pyramidal Lucas-Kanade backend.
#[derive(Clone, Debug, PartialEq)]
pub struct PyramidalLkConfig {
    /// Number of pyramid levels including full resolution.
    pub levels: u32,
    /// Half-width of the square integration window (7 -> 15x15).
    pub window_radius: u32,
    /// Gauss-Newton refinements per level.
    pub iterations: u32,
    /// Minimum per-pixel smallest eigenvalue of the structure tensor,
    /// averaged over the window. Pixels below it keep the coarser estimate.
    pub min_eigenvalue: f32,
}

impl Default for PyramidalLkConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            window_radius: 7,
            iterations: 3,
            min_eigenvalue: 1.0,
        }
    }
}

impl PyramidalLkConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.levels == 0 {
            return Err(TrackerError::invalid_config("pyramid_levels must be >= 1"));
        }
        if self.window_radius == 0 {
            return Err(TrackerError::invalid_config("window_radius must be >= 1"));
        }
        if self.iterations == 0 {
            return Err(TrackerError::invalid_config("iterations must be >= 1"));
        }
        if !self.min_eigenvalue.is_finite() || self.min_eigenvalue < 0.0 {
            return Err(TrackerError::invalid_config(
                "min_eigenvalue must be a finite value >= 0",
            ));
        }
        Ok(())
    }
}

/// Dense iterative pyramidal Lucas-Kanade.
///
/// Every pixel gets its own windowed least-squares solve. Flow starts at zero
/// on the coarsest level, is refined by warping the current image towards the
/// previous one, and is doubled and propagated to the next finer level.
pub struct PyramidalLk {
    config: PyramidalLkConfig,
}

impl PyramidalLk {
    pub fn new(config: PyramidalLkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PyramidalLkConfig {
        &self.config
    }
}

impl Default for PyramidalLk {
    fn default() -> Self {
        Self::new(PyramidalLkConfig::default())
    }
}

impl MotionEstimator for PyramidalLk {
    fn name(&self) -> &'static str {
        "pyramidal-lk"
    }

    fn estimate(
        &mut self,
        previous: &Frame,
        current: &Frame,
    ) -> Result<DisplacementField, TrackerError> {
        check_pair(previous, current)?;
        let (width, height) = previous.dimensions();

        let prev_pyr = build_pyramid(Plane::from_frame(previous), self.config.levels as usize);
        let curr_pyr = build_pyramid(Plane::from_frame(current), prev_pyr.len());

        let mut u: Vec<f32> = Vec::new();
        let mut v: Vec<f32> = Vec::new();
        let mut coarse_dims: Option<(usize, usize)> = None;

        for (prev, curr) in prev_pyr.iter().zip(curr_pyr.iter()).rev() {
            match coarse_dims {
                None => {
                    u = vec![0.0; prev.len()];
                    v = vec![0.0; prev.len()];
                }
                Some((cw, ch)) => {
                    u = upsample_flow(&u, cw, ch, prev.w, prev.h);
                    v = upsample_flow(&v, cw, ch, prev.w, prev.h);
                }
            }
            refine_level(prev, curr, &mut u, &mut v, &self.config);
            coarse_dims = Some((prev.w, prev.h));
        }

        Ok(DisplacementField::from_planes(width, height, u, v))
    }
}

// ----------------------------------------------------------------------------
// Image planes
// ----------------------------------------------------------------------------

struct Plane {
    w: usize,
    h: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_frame(frame: &Frame) -> Self {
        Self {
            w: frame.width() as usize,
            h: frame.height() as usize,
            data: frame.to_f32(),
        }
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }

    fn clamped(&self, x: isize, y: isize) -> f32 {
        let cx = x.clamp(0, self.w as isize - 1) as usize;
        let cy = y.clamp(0, self.h as isize - 1) as usize;
        self.at(cx, cy)
    }

    /// Bilinear sample with border clamping.
    fn sample(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.w - 1) as f32;
        let max_y = (self.h - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.w - 1);
        let y1 = (y0 + 1).min(self.h - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x1, y0) * fx;
        let bottom = self.at(x0, y1) * (1.0 - fx) + self.at(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Halve both sides by 2x2 averaging.
    fn downsample(&self) -> Self {
        let w = self.w / 2;
        let h = self.h / 2;
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let sum = self.at(2 * x, 2 * y)
                    + self.at(2 * x + 1, 2 * y)
                    + self.at(2 * x, 2 * y + 1)
                    + self.at(2 * x + 1, 2 * y + 1);
                data.push(sum * 0.25);
            }
        }
        Self { w, h, data }
    }
}

fn build_pyramid(base: Plane, levels: usize) -> Vec<Plane> {
    let mut pyramid = vec![base];
    while pyramid.len() < levels {
        let last = &pyramid[pyramid.len() - 1];
        if last.w / 2 < MIN_LEVEL_SIDE || last.h / 2 < MIN_LEVEL_SIDE {
            break;
        }
        let next = last.downsample();
        pyramid.push(next);
    }
    pyramid
}

/// Nearest-neighbour upsampling of a flow plane; vectors double in length.
fn upsample_flow(flow: &[f32], cw: usize, ch: usize, fw: usize, fh: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(fw * fh);
    for y in 0..fh {
        let cy = (y / 2).min(ch - 1);
        for x in 0..fw {
            let cx = (x / 2).min(cw - 1);
            out.push(flow[cy * cw + cx] * 2.0);
        }
    }
    out
}

// ----------------------------------------------------------------------------
// Per-level solve
// ----------------------------------------------------------------------------

/// Window sums over a square of radius `r`, clipped at the borders.
/// Returns the sums and the number of pixels each window covered.
fn box_sum(values: &[f32], w: usize, h: usize, r: usize) -> (Vec<f32>, Vec<f32>) {
    let stride = w + 1;
    let mut integral = vec![0.0f64; stride * (h + 1)];
    for y in 0..h {
        let mut row = 0.0f64;
        for x in 0..w {
            row += values[y * w + x] as f64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let mut sums = Vec::with_capacity(w * h);
    let mut counts = Vec::with_capacity(w * h);
    for y in 0..h {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r).min(h - 1) + 1;
        for x in 0..w {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r).min(w - 1) + 1;
            let s = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                - integral[y1 * stride + x0]
                + integral[y0 * stride + x0];
            sums.push(s as f32);
            counts.push(((x1 - x0) * (y1 - y0)) as f32);
        }
    }
    (sums, counts)
}

fn refine_level(
    prev: &Plane,
    curr: &Plane,
    u: &mut [f32],
    v: &mut [f32],
    config: &PyramidalLkConfig,
) {
    let (w, h) = (prev.w, prev.h);
    let r = config.window_radius as usize;
    let max_step = config.window_radius as f32;

    let mut ix = Vec::with_capacity(prev.len());
    let mut iy = Vec::with_capacity(prev.len());
    for y in 0..h as isize {
        for x in 0..w as isize {
            ix.push((prev.clamped(x + 1, y) - prev.clamped(x - 1, y)) * 0.5);
            iy.push((prev.clamped(x, y + 1) - prev.clamped(x, y - 1)) * 0.5);
        }
    }

    let products = |a: &[f32], b: &[f32]| -> Vec<f32> {
        a.iter().zip(b.iter()).map(|(p, q)| p * q).collect()
    };
    let (sxx, counts) = box_sum(&products(&ix, &ix), w, h, r);
    let (sxy, _) = box_sum(&products(&ix, &iy), w, h, r);
    let (syy, _) = box_sum(&products(&iy, &iy), w, h, r);

    // Smallest eigenvalue of the structure tensor, per window pixel.
    let solvable: Vec<bool> = (0..prev.len())
        .map(|i| {
            let half_trace = 0.5 * (sxx[i] + syy[i]);
            let spread = (0.25 * (sxx[i] - syy[i]).powi(2) + sxy[i] * sxy[i]).sqrt();
            (half_trace - spread) / counts[i] > config.min_eigenvalue
        })
        .collect();

    let mut it = vec![0.0f32; prev.len()];
    for _ in 0..config.iterations {
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                it[i] = curr.sample(x as f32 + u[i], y as f32 + v[i]) - prev.at(x, y);
            }
        }
        let (bx, _) = box_sum(&products(&ix, &it), w, h, r);
        let (by, _) = box_sum(&products(&iy, &it), w, h, r);

        for i in 0..prev.len() {
            if !solvable[i] {
                continue;
            }
            let det = sxx[i] * syy[i] - sxy[i] * sxy[i];
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let du = -(syy[i] * bx[i] - sxy[i] * by[i]) / det;
            let dv = -(sxx[i] * by[i] - sxy[i] * bx[i]) / det;
            u[i] += du.clamp(-max_step, max_step);
            v[i] += dv.clamp(-max_step, max_step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(x: f32, y: f32) -> f32 {
        128.0 + 60.0 * (x * 0.3).sin() + 40.0 * (y * 0.25).cos()
    }

    fn shifted_pair(dx: f32, dy: f32) -> (Frame, Frame) {
        let prev = Frame::from_fn(64, 48, |x, y| pattern(x as f32, y as f32).round() as u8);
        let curr = Frame::from_fn(64, 48, |x, y| {
            pattern(x as f32 - dx, y as f32 - dy).round() as u8
        });
        (prev, curr)
    }

    fn interior_mean(field: &DisplacementField) -> (f32, f32) {
        let mut sum = (0.0, 0.0);
        let mut n = 0.0;
        for y in 12..36 {
            for x in 16..48 {
                let (u, v) = field.get(x, y);
                sum.0 += u;
                sum.1 += v;
                n += 1.0;
            }
        }
        (sum.0 / n, sum.1 / n)
    }

    #[test]
    fn identical_frames_produce_zero_flow() {
        let (prev, _) = shifted_pair(0.0, 0.0);
        let mut lk = PyramidalLk::default();
        let field = lk.estimate(&prev, &prev).unwrap();
        assert!(field.vectors().all(|(_, _, u, v)| u == 0.0 && v == 0.0));
    }

    #[test]
    fn recovers_horizontal_translation() {
        let (prev, curr) = shifted_pair(1.5, 0.0);
        let mut lk = PyramidalLk::default();
        let field = lk.estimate(&prev, &curr).unwrap();
        let (u, v) = interior_mean(&field);
        assert!((u - 1.5).abs() < 0.3, "mean dx was {}", u);
        assert!(v.abs() < 0.3, "mean dy was {}", v);
    }

    #[test]
    fn leftward_motion_has_negative_flow() {
        let (prev, curr) = shifted_pair(-1.0, 0.0);
        let mut lk = PyramidalLk::default();
        let field = lk.estimate(&prev, &curr).unwrap();
        let (u, _) = interior_mean(&field);
        assert!(u < -0.7, "mean dx was {}", u);
    }

    #[test]
    fn estimate_is_deterministic() {
        let (prev, curr) = shifted_pair(2.0, 1.0);
        let mut lk = PyramidalLk::default();
        let a = lk.estimate(&prev, &curr).unwrap();
        let b = lk.estimate(&prev, &curr).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn textureless_frames_stay_still() {
        let flat = Frame::from_fn(32, 32, |_, _| 90);
        let brighter = Frame::from_fn(32, 32, |_, _| 95);
        let mut lk = PyramidalLk::default();
        let field = lk.estimate(&flat, &brighter).unwrap();
        assert!(field.vectors().all(|(_, _, u, v)| u == 0.0 && v == 0.0));
    }

    #[test]
    fn pyramid_stops_at_minimum_side() {
        let plane = Plane {
            w: 40,
            h: 20,
            data: vec![0.0; 800],
        };
        let pyramid = build_pyramid(plane, 5);
        // 40x20 -> 20x10 -> (10x5 rejected)
        assert_eq!(pyramid.len(), 2);
        assert_eq!((pyramid[1].w, pyramid[1].h), (20, 10));
    }

    #[test]
    fn box_sum_clips_windows_at_borders() {
        let values = vec![1.0f32; 9];
        let (sums, counts) = box_sum(&values, 3, 3, 1);
        assert_eq!(sums[0], 4.0);
        assert_eq!(counts[0], 4.0);
        assert_eq!(sums[4], 9.0);
        assert_eq!(counts[4], 9.0);
    }

    #[test]
    fn rejects_zero_levels() {
        let cfg = PyramidalLkConfig {
            levels: 0,
            ..PyramidalLkConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
