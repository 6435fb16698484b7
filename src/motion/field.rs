/// Dense per-pixel displacement from the previous frame to the current one.
///
/// Stored as two row-major planes. Ephemeral: one field per analysed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplacementField {
    width: u32,
    height: u32,
    dx: Vec<f32>,
    dy: Vec<f32>,
}

impl DisplacementField {
    pub fn zeros(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            dx: vec![0.0; n],
            dy: vec![0.0; n],
        }
    }

    /// Build a field from a per-pixel vector function.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> (f32, f32)) -> Self {
        let mut field = Self::zeros(width, height);
        for y in 0..height {
            for x in 0..width {
                field.set(x, y, f(x, y));
            }
        }
        field
    }

    pub(crate) fn from_planes(width: u32, height: u32, dx: Vec<f32>, dy: Vec<f32>) -> Self {
        debug_assert_eq!(dx.len(), width as usize * height as usize);
        debug_assert_eq!(dy.len(), dx.len());
        Self {
            width,
            height,
            dx,
            dy,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.dx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> (f32, f32) {
        let i = self.index(x, y);
        (self.dx[i], self.dy[i])
    }

    pub fn set(&mut self, x: u32, y: u32, v: (f32, f32)) {
        let i = self.index(x, y);
        self.dx[i] = v.0;
        self.dy[i] = v.1;
    }

    pub fn magnitude(&self, x: u32, y: u32) -> f32 {
        let (u, v) = self.get(x, y);
        (u * u + v * v).sqrt()
    }

    /// Iterate `(x, y, dx, dy)` in row-major order.
    pub fn vectors(&self) -> impl Iterator<Item = (u32, u32, f32, f32)> + '_ {
        let w = self.width.max(1);
        self.dx
            .iter()
            .zip(self.dy.iter())
            .enumerate()
            .map(move |(i, (&u, &v))| ((i as u32) % w, (i as u32) / w, u, v))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}
