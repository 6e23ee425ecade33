//! Rasterizing committed ROIs into exportable RGBA crops

use std::collections::{HashMap, HashSet};

use image::{Rgba, RgbImage, RgbaImage};

use crate::error::{Result, RoiError};
use crate::model::{ImageSize, Roi, RoiId};

/// One entry of a batch render
#[derive(Debug)]
pub struct CropItem {
    pub id: RoiId,
    pub file_name: String,
    pub raster: Result<RgbaImage>,
}

/// Renders crops and assigns their file names
#[derive(Debug, Clone, Default)]
pub struct CropEngine {
    prefix: String,
}

impl CropEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine prepending `prefix` to every file name
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Render `roi` from `image`
    ///
    /// Masked ROIs produce their mask's bounding extent with alpha 0 outside
    /// the mask; unmasked ROIs produce the opaque rectangle.
    pub fn render(&self, image: &RgbImage, roi: &Roi) -> Result<RgbaImage> {
        let size = ImageSize::new(image.width(), image.height());
        if !size.contains_rect(&roi.rect()) {
            return Err(RoiError::validation(format!(
                "ROI {} lies outside the {}x{} image",
                roi.id(),
                size.width,
                size.height
            )));
        }
        let bounds = roi.crop_bounds();
        let mask = roi.mask();
        Ok(RgbaImage::from_fn(bounds.width, bounds.height, |x, y| {
            let (sx, sy) = (bounds.x + x, bounds.y + y);
            let [r, g, b] = image.get_pixel(sx, sy).0;
            let alpha = match mask {
                Some(m) if !m.contains(sx, sy) => 0,
                _ => 255,
            };
            Rgba([r, g, b, alpha])
        }))
    }

    /// File names for `rois`, unique within the list
    ///
    /// A pure function of the ordered list: `prefix + sanitized label + .png`,
    /// with `_<id>` added to every name shared by several ROIs and `_<n>`
    /// added after that until the name is free.
    pub fn file_names(&self, rois: &[Roi]) -> Vec<String> {
        let stems: Vec<String> = rois
            .iter()
            .map(|roi| {
                let label = sanitize(roi.label());
                if label.is_empty() {
                    format!("{}roi_{}", self.prefix, roi.id())
                } else {
                    format!("{}{}", self.prefix, label)
                }
            })
            .collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for stem in &stems {
            *counts.entry(stem.as_str()).or_default() += 1;
        }

        let mut taken: HashSet<String> = HashSet::new();
        let mut names = Vec::with_capacity(rois.len());
        for (roi, stem) in rois.iter().zip(&stems) {
            let base = if counts[stem.as_str()] > 1 {
                format!("{stem}_{}", roi.id())
            } else {
                stem.clone()
            };
            let mut name = base.clone();
            let mut n = 1;
            while taken.contains(&name) {
                name = format!("{base}_{n}");
                n += 1;
            }
            taken.insert(name.clone());
            names.push(format!("{name}.png"));
        }
        names
    }

    /// Render every ROI; failures are reported per item
    pub fn render_all(&self, image: &RgbImage, rois: &[Roi]) -> Vec<CropItem> {
        self.file_names(rois)
            .into_iter()
            .zip(rois)
            .map(|(file_name, roi)| CropItem {
                id: roi.id(),
                file_name,
                raster: self.render(image, roi),
            })
            .collect()
    }
}

/// Replace characters that are unsafe in file names with `_`
pub fn sanitize(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ImageActionKind, ImageSize, Mask, Rect, RectInput, RoiConfig, RoiDraft, RoiSet,
    };
    use image::Rgb;

    fn image() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| Rgb([x as u8, y as u8, 9]))
    }

    fn set_with(labels: &[&str]) -> RoiSet {
        let mut set = RoiSet::new(ImageSize::new(64, 48));
        for (i, label) in labels.iter().enumerate() {
            set.create(
                RoiDraft::new(
                    RectInput::new(i as i64, 0, 10, 10),
                    RoiConfig::image(ImageActionKind::Detect),
                )
                .with_label(*label),
            )
            .unwrap();
        }
        set
    }

    #[test]
    fn test_unmasked_crop_is_opaque_rect() {
        let set = set_with(&["a"]);
        let roi = &set.as_slice()[0];
        let crop = CropEngine::new().render(&image(), roi).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));
        assert!(crop.pixels().all(|p| p.0[3] == 255));
        assert_eq!(crop.get_pixel(3, 4).0, [3, 4, 9, 255]);
    }

    #[test]
    fn test_masked_crop_uses_mask_extent() {
        let mut set = RoiSet::new(ImageSize::new(64, 48));
        let mask = Mask::from_predicate(Rect::new(10, 10, 20, 20).unwrap(), |x, y| {
            (15..25).contains(&x) && (12..30).contains(&y) && !(x == 20 && y == 20)
        });
        let roi = set
            .create(
                RoiDraft::new(
                    RectInput::new(10, 10, 20, 20),
                    RoiConfig::image(ImageActionKind::Detect),
                )
                .with_mask(mask),
            )
            .unwrap();
        let crop = CropEngine::new().render(&image(), &roi).unwrap();
        assert_eq!(crop.dimensions(), (10, 18));
        assert_eq!(crop.get_pixel(0, 0).0, [15, 12, 9, 255]);
        assert_eq!(crop.get_pixel(5, 8).0[3], 0);
    }

    #[test]
    fn test_outside_image_is_validation_error() {
        let set = set_with(&["a"]);
        let small = RgbImage::new(5, 5);
        let result = CropEngine::new().render(&small, &set.as_slice()[0]);
        assert!(matches!(result, Err(RoiError::Validation { .. })));
    }

    #[test]
    fn test_sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize("a/b:c*d?\"e<f>g|h\\i"), "a_b_c_d__e_f_g_h_i");
        assert_eq!(sanitize("tab\there"), "tab_here");
        assert_eq!(sanitize("开始按钮"), "开始按钮");
    }

    #[test]
    fn test_colliding_names_get_ids() {
        let set = set_with(&["btn", "ok", "btn", "btn_3"]);
        let names = CropEngine::with_prefix("img_").file_names(set.as_slice());
        assert_eq!(
            names,
            vec!["img_btn_1.png", "img_ok.png", "img_btn_3.png", "img_btn_3_1.png"]
        );
    }

    #[test]
    fn test_render_all_reports_each_item() {
        let set = set_with(&["a", "b"]);
        let small = RgbImage::new(8, 8);
        let items = CropEngine::new().render_all(&small, set.as_slice());
        assert_eq!(items.len(), 2);
        assert!(items[0].raster.is_err());
        assert!(items[1].raster.is_err());
        assert_eq!(items[1].file_name, "b.png");
    }
}
