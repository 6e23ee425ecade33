//! Pixel-space geometry: points, rectangles and image extents

use serde::{Deserialize, Serialize};

/// Pointer position in image pixel space
///
/// Signed because pointer events may land outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Clamp to the nearest pixel of a `width` x `height` image
    ///
    /// Returns `None` for an empty image.
    pub fn clamp_to(self, size: ImageSize) -> Option<(u32, u32)> {
        if size.is_empty() {
            return None;
        }
        let x = self.x.clamp(0, size.width.saturating_sub(1) as i32) as u32;
        let y = self.y.clamp(0, size.height.saturating_sub(1) as i32) as u32;
        Some((x, y))
    }

    /// Chebyshev distance to `other`
    pub fn distance_max(self, other: Point) -> i64 {
        let dx = (self.x as i64 - other.x as i64).abs();
        let dy = (self.y as i64 - other.y as i64).abs();
        dx.max(dy)
    }
}

/// Image dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whole-image rectangle, `None` when empty
    pub fn full_rect(&self) -> Option<Rect> {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Check that `rect` lies fully inside the image
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        rect.right() <= self.width as u64 && rect.bottom() <= self.height as u64
    }
}

/// Validated rectangle with positive area
///
/// Serialized as `{x, y, w, h}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
}

impl Rect {
    /// Create a rectangle, `None` if it has zero area
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Exclusive right edge
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Integer centre, matching how click coordinates are generated
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (x as u64) >= self.x as u64
            && (x as u64) < self.right()
            && (y as u64) >= self.y as u64
            && (y as u64) < self.bottom()
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= 0 && point.y >= 0 && self.contains(point.x as u32, point.y as u32)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 as u64 || y1 <= y0 as u64 {
            return None;
        }
        Rect::new(x0, y0, (x1 - x0 as u64) as u32, (y1 - y0 as u64) as u32)
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect {
            x: x0,
            y: y0,
            width: (x1 - x0 as u64) as u32,
            height: (y1 - y0 as u64) as u32,
        }
    }

    /// Intersection over union, 0 for disjoint rectangles
    pub fn iou(&self, other: &Rect) -> f64 {
        let Some(common) = self.intersect(other) else {
            return 0.0;
        };
        let inter = common.area() as f64;
        inter / (self.area() as f64 + other.area() as f64 - inter)
    }

    /// Grow by `margin` on every side, clipped to `size`
    pub fn expanded(&self, margin: u32, size: ImageSize) -> Option<Rect> {
        RectInput::new(
            self.x as i64 - margin as i64,
            self.y as i64 - margin as i64,
            self.width as i64 + 2 * margin as i64,
            self.height as i64 + 2 * margin as i64,
        )
        .clamp_to(size)
    }
}

/// Unvalidated rectangle as supplied by a caller
///
/// Coordinates may be negative and extents may be negative (a drag towards
/// the top-left); [`RectInput::clamp_to`] normalizes and clips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RectInput {
    pub x: i64,
    pub y: i64,
    #[serde(rename = "w")]
    pub width: i64,
    #[serde(rename = "h")]
    pub height: i64,
}

impl RectInput {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two drag corners (the end corner is exclusive)
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x as i64,
            y: a.y as i64,
            width: b.x as i64 - a.x as i64,
            height: b.y as i64 - a.y as i64,
        }
    }

    /// Rectangle of side `2 * half` centred on `p`
    pub fn around(p: Point, half: u32) -> Self {
        Self {
            x: p.x as i64 - half as i64,
            y: p.y as i64 - half as i64,
            width: 2 * half as i64,
            height: 2 * half as i64,
        }
    }

    pub fn offset(self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Normalize, clip to the image and reject degenerate results
    pub fn clamp_to(&self, size: ImageSize) -> Option<Rect> {
        let (x0, x1) = ordered(self.x, self.x.saturating_add(self.width));
        let (y0, y1) = ordered(self.y, self.y.saturating_add(self.height));
        let x0 = x0.clamp(0, size.width as i64);
        let x1 = x1.clamp(0, size.width as i64);
        let y0 = y0.clamp(0, size.height as i64);
        let y1 = y1.clamp(0, size.height as i64);
        Rect::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

impl From<Rect> for RectInput {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x as i64,
            y: rect.y as i64,
            width: rect.width as i64,
            height: rect.height as i64,
        }
    }
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
