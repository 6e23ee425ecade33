//! Colour conversion and distance utilities
//!
//! Provides the conversions the segmentation engines work in:
//! - RGB (0-255) to CIE Lab (D65)
//! - Whole-image Lab conversion, parallel over rows
//! - Euclidean RGB distance and ΔE76
//! - HSV for hue-range masks

use image::RgbImage;
use palette::{FromColor, Hsv, Lab, Srgb};
use rayon::prelude::*;

/// Row count above which whole-image conversion runs on the rayon pool
const PARALLEL_ROWS: u32 = 64;

/// Lab colour with plain `f32` channels, cheap to copy and average
pub type LabPixel = [f32; 3];

/// Lab copy of an image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage {
    width: u32,
    height: u32,
    pixels: Vec<LabPixel>,
}

impl LabImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> LabPixel {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn pixels(&self) -> &[LabPixel] {
        &self.pixels
    }
}

/// Stateless converter between sRGB bytes and Lab
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConverter;

impl ColorConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert RGB (0-255) to Lab color space
    pub fn rgb_to_lab(&self, rgb: [u8; 3]) -> LabPixel {
        let srgb = Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>();
        let lab = Lab::from_color(srgb);
        [lab.l, lab.a, lab.b]
    }

    /// Convert RGB (0-255) to HSV as (hue degrees 0-360, saturation 0-1, value 0-1)
    pub fn rgb_to_hsv(&self, rgb: [u8; 3]) -> (f32, f32, f32) {
        let srgb = Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>();
        let hsv: Hsv = Hsv::from_color(srgb);
        (hsv.hue.into_positive_degrees(), hsv.saturation, hsv.value)
    }

    /// Convert every pixel of `image` to Lab
    pub fn image_to_lab(&self, image: &RgbImage) -> LabImage {
        let (width, height) = image.dimensions();
        let row_len = width as usize * 3;
        let raw = image.as_raw();
        let convert_row = |row: &[u8]| -> Vec<LabPixel> {
            row.chunks_exact(3)
                .map(|p| self.rgb_to_lab([p[0], p[1], p[2]]))
                .collect()
        };
        let pixels = if row_len == 0 {
            Vec::new()
        } else if height >= PARALLEL_ROWS {
            raw.par_chunks_exact(row_len).flat_map_iter(convert_row).collect()
        } else {
            raw.chunks_exact(row_len).flat_map(convert_row).collect()
        };
        LabImage {
            width,
            height,
            pixels,
        }
    }

    /// Euclidean distance in RGB byte space (0 to about 441.7)
    pub fn rgb_distance(&self, a: [u8; 3], b: [u8; 3]) -> f32 {
        let sq: i32 = (0..3)
            .map(|i| {
                let d = a[i] as i32 - b[i] as i32;
                d * d
            })
            .sum();
        (sq as f32).sqrt()
    }

    /// Compute Delta E (color difference) between two Lab colors
    ///
    /// Simple Euclidean distance (ΔE76).
    pub fn delta_e(&self, lab1: LabPixel, lab2: LabPixel) -> f32 {
        let dl = lab1[0] - lab2[0];
        let da = lab1[1] - lab2[1];
        let db = lab1[2] - lab2[2];
        (dl * dl + da * da + db * db).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_white_and_black_lightness() {
        let converter = ColorConverter::new();
        let white = converter.rgb_to_lab([255, 255, 255]);
        let black = converter.rgb_to_lab([0, 0, 0]);
        assert!((white[0] - 100.0).abs() < 0.5);
        assert!(black[0].abs() < 0.5);
    }

    #[test]
    fn test_hsv_of_primaries() {
        let converter = ColorConverter::new();
        let (h, s, v) = converter.rgb_to_hsv([255, 0, 0]);
        assert!(h.abs() < 0.5 || (h - 360.0).abs() < 0.5);
        assert!((s - 1.0).abs() < 1e-4 && (v - 1.0).abs() < 1e-4);
        let (h, _, _) = converter.rgb_to_hsv([0, 0, 255]);
        assert!((h - 240.0).abs() < 0.5);
        let (_, s, _) = converter.rgb_to_hsv([128, 128, 128]);
        assert!(s.abs() < 1e-4);
    }

    #[test]
    fn test_image_conversion_matches_per_pixel() {
        let converter = ColorConverter::new();
        let image = RgbImage::from_fn(9, 70, |x, y| Rgb([(x * 20) as u8, (y * 3) as u8, 128]));
        let lab = converter.image_to_lab(&image);
        assert_eq!(lab.pixels().len(), 9 * 70);
        assert_eq!(lab.get(4, 66), converter.rgb_to_lab([80, 198, 128]));
    }

    #[test]
    fn test_distances() {
        let converter = ColorConverter::new();
        assert_eq!(converter.rgb_distance([0, 0, 0], [3, 4, 0]), 5.0);
        assert_eq!(converter.delta_e([50.0, 0.0, 0.0], [50.0, 3.0, 4.0]), 5.0);
    }
}
