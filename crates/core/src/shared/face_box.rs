use serde::Serialize;

/// Axis-aligned face bounding box in pixel coordinates.
///
/// Edges are stored the way the recognition models report them:
/// `top`/`bottom` are rows, `left`/`right` are columns, `right` and
/// `bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Build from corner coordinates as produced by detector heads.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            top: y1.round() as i32,
            right: x2.round() as i32,
            bottom: y2.round() as i32,
            left: x1.round() as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width().max(0) as i64 * self.height().max(0) as i64
    }

    /// Map a box found on a frame downscaled by `scale` back to the
    /// original frame by dividing every edge by the scale.
    pub fn unscaled(&self, scale: f64) -> Self {
        if scale <= 0.0 {
            return *self;
        }
        Self {
            top: (self.top as f64 / scale).round() as i32,
            right: (self.right as f64 / scale).round() as i32,
            bottom: (self.bottom as f64 / scale).round() as i32,
            left: (self.left as f64 / scale).round() as i32,
        }
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self {
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
            left: self.left + dx,
        }
    }

    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        Self {
            top: self.top.clamp(0, h),
            right: self.right.clamp(0, w),
            bottom: self.bottom.clamp(0, h),
            left: self.left.clamp(0, w),
        }
    }

    /// Intersection over union. 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &FaceBox) -> f64 {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);

        if right <= left || bottom <= top {
            return 0.0;
        }
        let inter = (right - left) as f64 * (bottom - top) as f64;
        let union = self.area() as f64 + other.area() as f64 - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}
