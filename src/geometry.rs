//! Page geometry: a page's unscaled bounds plus the scaled/rotated pixel view
//! the render pipeline actually allocates buffers and splits bands against.

/// Float rectangle, used for the page's unscaled bounds and for
/// [`crate::band::HorizontalBand`] display-list clips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    fn scaled(self, z: f64) -> Self {
        Self {
            x0: self.x0 * z,
            y0: self.y0 * z,
            x1: self.x1 * z,
            y1: self.y1 * z,
        }
    }
}

/// Integer pixel rectangle obtained by rounding a [`Rect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl IntRect {
    fn from_rect_round(r: Rect) -> Self {
        Self {
            x0: r.x0.round() as i32,
            y0: r.y0.round() as i32,
            x1: r.x1.round() as i32,
            y1: r.y1.round() as i32,
        }
    }
}

/// A page's unscaled bounds and the scaled/rotated pixel view derived from
/// them. Immutable: `scale` and `rotate_quarter_clockwise` return new values.
///
/// Invariant: `byte_size == 3 * width * height` holds after every
/// construction path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Unscaled page bounds as reported by the Parser capability.
    pub base: Rect,
    /// Rounded pixel rect after scaling.
    pub i: IntRect,
    pub width: i32,
    pub height: i32,
    /// `3 * width * height`; the size in bytes of a buffer that holds this page.
    pub byte_size: usize,
    /// Physical aspect width/height, swapped by odd quarter rotations.
    pub acc_width: f64,
    pub acc_height: f64,
    /// Cumulative clockwise rotation in degrees, always one of 0/90/180/270.
    pub rotation: u16,
}

impl PageGeometry {
    /// Build the geometry for a page's unscaled bounds at zoom 1.0, rotation 0.
    pub fn from_bounds(base: Rect) -> Self {
        let i = IntRect::from_rect_round(base);
        let width = i.x1 - i.x0;
        let height = i.y1 - i.y0;
        Self {
            base,
            i,
            width,
            height,
            byte_size: byte_size_of(width, height),
            acc_width: base.x1 - base.x0,
            acc_height: base.y1 - base.y0,
            rotation: 0,
        }
    }

    /// Scale the unscaled bounds by `z`, recomputing the pixel rect and
    /// `byte_size`. Rotation is preserved.
    pub fn scale(&self, z: f64) -> Self {
        let base = self.base.scaled(z);
        let i = IntRect::from_rect_round(base);
        let width = i.x1 - i.x0;
        let height = i.y1 - i.y0;
        Self {
            base,
            i,
            width,
            height,
            byte_size: byte_size_of(width, height),
            acc_width: self.acc_width * z,
            acc_height: self.acc_height * z,
            rotation: self.rotation,
        }
    }

    /// Rotate clockwise by `n` quarter turns (`n` may be negative or >= 4;
    /// it is normalized modulo 4). `byte_size` is preserved; odd rotations
    /// swap `width`/`height` and `acc_width`/`acc_height`.
    pub fn rotate_quarter_clockwise(&self, n: i32) -> Self {
        let quarters = n.rem_euclid(4);
        if quarters % 2 == 0 {
            let rotation = (self.rotation as i32 + quarters * 90).rem_euclid(360) as u16;
            return Self {
                rotation,
                ..*self
            };
        }

        let width = self.height;
        let height = self.width;
        let i = IntRect {
            x0: self.i.y0,
            y0: self.i.x0,
            x1: self.i.y0 + width,
            y1: self.i.x0 + height,
        };
        let rotation = (self.rotation as i32 + quarters * 90).rem_euclid(360) as u16;
        Self {
            base: self.base,
            i,
            width,
            height,
            byte_size: self.byte_size,
            acc_width: self.acc_height,
            acc_height: self.acc_width,
            rotation,
        }
    }
}

fn byte_size_of(width: i32, height: i32) -> usize {
    3 * width.max(0) as usize * height.max(0) as usize
}
