//! Binary region masks anchored in image space

use serde::{Deserialize, Serialize};

use super::geometry::{ImageSize, Rect};
use crate::constants::roi::MAX_MASK_PIXELS;
use crate::error::RoiError;

/// Binary mask trimmed to the tight bounding box of its set pixels
///
/// A `Mask` is never empty: every constructor returns `None` when no pixel
/// is set. Coordinates passed to [`Mask::contains`] are image coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MaskRef", into = "MaskRef")]
pub struct Mask {
    bounds: Rect,
    bits: Vec<bool>,
}

/// Run-length encoding of a mask as written to JSON documents
///
/// `counts` alternates unset/set runs in row-major order over `{x, y, w, h}`,
/// starting with an unset run that may be zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRef {
    pub encoding: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub counts: Vec<u32>,
}

const RLE_ENCODING: &str = "rle";

impl Mask {
    /// Build a mask over `region` from a per-pixel predicate on image coordinates
    pub fn from_predicate<F>(region: Rect, mut is_set: F) -> Option<Mask>
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut bits = Vec::with_capacity(region.area() as usize);
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                bits.push(is_set(x, y));
            }
        }
        Self::from_bits(region, bits)
    }

    /// Build a mask from a row-major bitmap covering `region`
    pub fn from_bits(region: Rect, bits: Vec<bool>) -> Option<Mask> {
        if bits.len() as u64 != region.area() {
            return None;
        }
        Mask {
            bounds: region,
            bits,
        }
        .trimmed()
    }

    /// Mask with every pixel of `rect` set
    pub fn full(rect: Rect) -> Mask {
        Mask {
            bounds: rect,
            bits: vec![true; rect.area() as usize],
        }
    }

    /// Tight bounding box of the set pixels
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Number of set pixels
    pub fn area(&self) -> u64 {
        self.bits.iter().filter(|&&b| b).count() as u64
    }

    /// True when every pixel of the bounding box is set
    pub fn is_full(&self) -> bool {
        self.bits.iter().all(|&b| b)
    }

    /// Whether the image pixel `(x, y)` is set
    pub fn contains(&self, x: u32, y: u32) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }
        let idx = (y - self.bounds.y) as usize * self.bounds.width as usize
            + (x - self.bounds.x) as usize;
        self.bits[idx]
    }

    /// Restrict to `rect`, `None` if nothing remains
    pub fn clipped(&self, rect: &Rect) -> Option<Mask> {
        let region = self.bounds.intersect(rect)?;
        Mask::from_predicate(region, |x, y| self.contains(x, y))
    }

    /// Shift by `(dx, dy)` and clip to the image
    pub fn translated(&self, dx: i64, dy: i64, size: ImageSize) -> Option<Mask> {
        let full = size.full_rect()?;
        let shifted = super::geometry::RectInput::from(self.bounds)
            .offset(dx, dy)
            .clamp_to(size)?;
        let region = shifted.intersect(&full)?;
        Mask::from_predicate(region, |x, y| {
            let sx = x as i64 - dx;
            let sy = y as i64 - dy;
            sx >= 0 && sy >= 0 && self.contains(sx as u32, sy as u32)
        })
    }

    /// Union of two masks
    pub fn union(&self, other: &Mask) -> Mask {
        let region = self.bounds.union(&other.bounds);
        let mut bits = Vec::with_capacity(region.area() as usize);
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                bits.push(self.contains(x, y) || other.contains(x, y));
            }
        }
        Mask {
            bounds: region,
            bits,
        }
    }

    fn trimmed(self) -> Option<Mask> {
        let w = self.bounds.width as usize;
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0usize;
        let mut max_y = 0usize;
        for (idx, _) in self.bits.iter().enumerate().filter(|(_, &b)| b) {
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if min_x == usize::MAX {
            return None;
        }
        let tw = max_x - min_x + 1;
        let th = max_y - min_y + 1;
        if tw == w && th == self.bounds.height as usize {
            return Some(self);
        }
        let mut bits = Vec::with_capacity(tw * th);
        for y in min_y..=max_y {
            bits.extend_from_slice(&self.bits[y * w + min_x..y * w + max_x + 1]);
        }
        Some(Mask {
            bounds: Rect {
                x: self.bounds.x + min_x as u32,
                y: self.bounds.y + min_y as u32,
                width: tw as u32,
                height: th as u32,
            },
            bits,
        })
    }
}

impl From<Mask> for MaskRef {
    fn from(mask: Mask) -> Self {
        let mut counts = Vec::new();
        let mut current = false;
        let mut run = 0u32;
        for &bit in &mask.bits {
            if bit == current {
                run += 1;
            } else {
                counts.push(run);
                current = bit;
                run = 1;
            }
        }
        counts.push(run);
        MaskRef {
            encoding: RLE_ENCODING.to_string(),
            x: mask.bounds.x,
            y: mask.bounds.y,
            w: mask.bounds.width,
            h: mask.bounds.height,
            counts,
        }
    }
}

impl TryFrom<MaskRef> for Mask {
    type Error = RoiError;

    fn try_from(encoded: MaskRef) -> Result<Self, Self::Error> {
        if encoded.encoding != RLE_ENCODING {
            return Err(RoiError::format(format!(
                "unsupported mask encoding '{}'",
                encoded.encoding
            )));
        }
        let region = Rect::new(encoded.x, encoded.y, encoded.w, encoded.h)
            .ok_or_else(|| RoiError::format("mask extent has zero area"))?;
        if region.right() > u32::MAX as u64 || region.bottom() > u32::MAX as u64 {
            return Err(RoiError::format("mask extent exceeds the coordinate range"));
        }
        if region.area() > MAX_MASK_PIXELS {
            return Err(RoiError::format(format!(
                "mask extent of {} pixels exceeds the limit of {MAX_MASK_PIXELS}",
                region.area()
            )));
        }
        let total: u64 = encoded.counts.iter().map(|&c| c as u64).sum();
        if total != region.area() {
            return Err(RoiError::format(format!(
                "mask runs cover {total} pixels, extent has {}",
                region.area()
            )));
        }
        let mut bits = Vec::with_capacity(region.area() as usize);
        for (i, &count) in encoded.counts.iter().enumerate() {
            bits.extend(std::iter::repeat(i % 2 == 1).take(count as usize));
        }
        Mask::from_bits(region, bits).ok_or_else(|| RoiError::format("mask has no set pixels"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disc(cx: u32, cy: u32, r: u32) -> Mask {
        let region = Rect::new(cx - r - 2, cy - r - 2, 2 * r + 5, 2 * r + 5).unwrap();
        Mask::from_predicate(region, |x, y| {
            let dx = x as i64 - cx as i64;
            let dy = y as i64 - cy as i64;
            dx * dx + dy * dy <= (r * r) as i64
        })
        .unwrap()
    }

    #[test]
    fn test_mask_is_trimmed_to_set_pixels() {
        let mask = disc(50, 50, 10);
        assert_eq!(mask.bounds(), Rect::new(40, 40, 21, 21).unwrap());
        assert!(mask.contains(50, 50));
        assert!(!mask.contains(40, 40));
    }

    #[test]
    fn test_empty_predicate_yields_none() {
        let region = Rect::new(0, 0, 4, 4).unwrap();
        assert!(Mask::from_predicate(region, |_, _| false).is_none());
    }

    #[test]
    fn test_rle_round_trip_preserves_pixels() {
        let mask = disc(30, 20, 7);
        let json = serde_json::to_string(&mask).unwrap();
        let decoded: Mask = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, mask);
        assert_eq!(decoded.area(), mask.area());
    }

    #[test]
    fn test_rle_rejects_inconsistent_runs() {
        let bad = r#"{"encoding":"rle","x":0,"y":0,"w":2,"h":2,"counts":[1,1]}"#;
        assert!(serde_json::from_str::<Mask>(bad).is_err());
    }

    #[test]
    fn test_rle_rejects_extent_past_coordinate_range() {
        let bad = r#"{"encoding":"rle","x":4294967295,"y":0,"w":3,"h":1,"counts":[1,2]}"#;
        assert!(serde_json::from_str::<Mask>(bad).is_err());
        let tall = r#"{"encoding":"rle","x":0,"y":4294967294,"w":1,"h":4,"counts":[0,4]}"#;
        assert!(serde_json::from_str::<Mask>(tall).is_err());
    }

    #[test]
    fn test_rle_rejects_oversized_extent() {
        let huge = r#"{"encoding":"rle","x":0,"y":0,"w":65536,"h":65536,"counts":[0,4294967295,1]}"#;
        assert!(serde_json::from_str::<Mask>(huge).is_err());
    }

    #[test]
    fn test_clip_and_translate() {
        let mask = Mask::full(Rect::new(10, 10, 10, 10).unwrap());
        let clipped = mask.clipped(&Rect::new(15, 0, 100, 100).unwrap()).unwrap();
        assert_eq!(clipped.bounds(), Rect::new(15, 10, 5, 10).unwrap());

        let moved = mask.translated(-15, 0, ImageSize::new(100, 100)).unwrap();
        assert_eq!(moved.bounds(), Rect::new(0, 10, 5, 10).unwrap());
        assert_eq!(moved.area(), 50);
    }

    #[test]
    fn test_union_counts_overlap_once() {
        let a = Mask::full(Rect::new(0, 0, 4, 4).unwrap());
        let b = Mask::full(Rect::new(2, 2, 4, 4).unwrap());
        assert_eq!(a.union(&b).area(), 16 + 16 - 4);
    }
}
