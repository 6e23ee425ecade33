//! Seed-point and full-image auto-detection
//!
//! Implements click-to-detect that:
//! - Marks pixels within an RGB distance of the seed colour
//! - Closes single-pixel holes left by anti-aliasing
//! - Labels the connected component that contains the seed
//! - Rejects specks and background-sized components
//!
//! and a full-image scan ([`AutoDetector::detect_all`]) that proposes red
//! notification dots, buttons and icons, dropping proposals that overlap a
//! larger one.

use image::{imageops, GrayImage, RgbImage};
use imageproc::edges::canny;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::components::{Component, Components, Connectivity};
use super::morphology;
use crate::color::ColorConverter;
use crate::constants::auto_detect as defaults;
use crate::error::{Result, RoiError};
use crate::model::{CandidateRegion, ImageSize, Mask, Point, Rect};

/// Tunable parameters of [`AutoDetector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDetectParams {
    /// RGB Euclidean distance tolerance (0-441)
    pub tolerance: f32,
    pub min_area: u32,
    pub max_area_ratio: f64,
    pub connectivity: Connectivity,
    /// Closing kernel side; 0 or 1 disables closing
    pub closing_kernel: u32,
    /// IoU above which a full-image proposal is dropped in favour of a larger one
    pub merge_iou: f64,
}

impl Default for AutoDetectParams {
    fn default() -> Self {
        Self {
            tolerance: defaults::COLOR_TOLERANCE,
            min_area: defaults::MIN_AREA_PX,
            max_area_ratio: defaults::MAX_AREA_RATIO,
            connectivity: Connectivity::default(),
            closing_kernel: defaults::CLOSING_KERNEL,
            merge_iou: defaults::MERGE_IOU,
        }
    }
}

/// Stateless connected-component detector
#[derive(Debug, Clone, Default)]
pub struct AutoDetector {
    params: AutoDetectParams,
    converter: ColorConverter,
}

impl AutoDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: AutoDetectParams) -> Self {
        Self {
            params,
            converter: ColorConverter::new(),
        }
    }

    pub fn params(&self) -> &AutoDetectParams {
        &self.params
    }

    /// Detect the region around `seed` whose colour is within `tolerance`
    ///
    /// Seeds outside the image are clamped to the nearest pixel. Returns
    /// `Ok(None)` when the component is too small or too large.
    ///
    /// # Errors
    ///
    /// Returns `RoiError` if the image is empty or the tolerance is not a
    /// finite non-negative number.
    pub fn detect(
        &self,
        image: &RgbImage,
        seed: Point,
        tolerance: f32,
    ) -> Result<Option<CandidateRegion>> {
        let (grid, seed) = self.similarity_grid(image, seed, tolerance)?;
        let size = ImageSize::new(image.width(), image.height());

        let components = Components::from_binary(&grid, self.params.connectivity);
        let Some(component) = components.at(seed.0, seed.1) else {
            return Ok(None);
        };

        let area = component.area;
        if !self.area_acceptable(area, size) {
            debug!(area, ?seed, "auto-detect component rejected by area limits");
            return Ok(None);
        }

        let candidate = components.mask(component, (0, 0)).map(candidate_from_mask);
        debug!(area, rect = ?candidate.as_ref().map(|c| c.rect), "auto-detect found region");
        Ok(candidate)
    }

    /// Union of every component coloured like the seed pixel
    ///
    /// Components below the minimum area are ignored; the union as a whole
    /// is still subject to the area ceiling.
    pub fn detect_similar(
        &self,
        image: &RgbImage,
        seed: Point,
        tolerance: f32,
    ) -> Result<Option<CandidateRegion>> {
        let (grid, _) = self.similarity_grid(image, seed, tolerance)?;
        let size = ImageSize::new(image.width(), image.height());

        let components = Components::from_binary(&grid, self.params.connectivity);
        let mut union: Option<Mask> = None;
        let mut total = 0u64;
        for component in components.components() {
            if component.area < self.params.min_area as u64 {
                continue;
            }
            total += component.area;
            if let Some(mask) = components.mask(component, (0, 0)) {
                union = Some(match union {
                    Some(acc) => acc.union(&mask),
                    None => mask,
                });
            }
        }

        if total as f64 > self.params.max_area_ratio * size.area() as f64 {
            debug!(total, "similar-colour union rejected as background");
            return Ok(None);
        }
        debug!(total, "similar-colour detection finished");
        Ok(union.map(candidate_from_mask))
    }

    /// Propose every red dot, button and icon in the image
    ///
    /// Proposals are plain rectangles ordered largest first. A proposal whose
    /// IoU with an already kept, larger one exceeds `merge_iou` is dropped.
    ///
    /// # Errors
    ///
    /// Returns `RoiError` if the image is empty.
    pub fn detect_all(&self, image: &RgbImage) -> Result<Vec<CandidateRegion>> {
        let size = ImageSize::new(image.width(), image.height());
        if size.area() == 0 {
            return Err(RoiError::segmentation("image is empty"));
        }
        let gray = imageops::grayscale(image);
        let edges = canny(&gray, defaults::CANNY_LOW, defaults::CANNY_HIGH);

        let mut proposals = self.red_dots(image, size);
        proposals.extend(buttons(&edges, size));
        proposals.extend(icons(&edges, size));

        let total = proposals.len();
        let kept = merge_overlapping(proposals, self.params.merge_iou);
        debug!(total, kept = kept.len(), "full-image detection finished");
        Ok(kept.into_iter().map(CandidateRegion::rect).collect())
    }

    fn red_dots(&self, image: &RgbImage, size: ImageSize) -> Vec<Rect> {
        let red = morphology::binary_from_fn(size.width, size.height, |x, y| {
            let (hue, saturation, value) = self.converter.rgb_to_hsv(image.get_pixel(x, y).0);
            saturation >= defaults::RED_MIN_SATURATION
                && value >= defaults::RED_MIN_VALUE
                && defaults::RED_HUE_BANDS
                    .iter()
                    .any(|&(lo, hi)| hue >= lo && hue <= hi)
        });
        let red = morphology::close(&red, defaults::RED_DOT_KERNEL);
        let (min_area, max_area) = defaults::RED_DOT_AREA_PX;
        Components::from_binary(&red, Connectivity::Eight)
            .components()
            .iter()
            .filter(|c| {
                (min_area..=max_area).contains(&c.area)
                    && c.fill_ratio() >= defaults::RED_DOT_MIN_FILL
                    && c.aspect() <= defaults::RED_DOT_MAX_ASPECT
            })
            .filter_map(|c| c.bounds.expanded(defaults::RED_DOT_MARGIN, size))
            .collect()
    }

    fn similarity_grid(
        &self,
        image: &RgbImage,
        seed: Point,
        tolerance: f32,
    ) -> Result<(GrayImage, (u32, u32))> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(RoiError::invalid_parameter("tolerance", tolerance));
        }
        let size = ImageSize::new(image.width(), image.height());
        let (sx, sy) = seed
            .clamp_to(size)
            .ok_or_else(|| RoiError::segmentation("image is empty"))?;

        // Step 1: colour threshold against the seed pixel
        let reference = image.get_pixel(sx, sy).0;
        let grid = morphology::binary_from_fn(size.width, size.height, |x, y| {
            self.converter
                .rgb_distance(image.get_pixel(x, y).0, reference)
                <= tolerance
        });

        // Step 2: closing pass
        Ok((morphology::close(&grid, self.params.closing_kernel), (sx, sy)))
    }

    fn area_acceptable(&self, area: u64, size: ImageSize) -> bool {
        area >= self.params.min_area as u64
            && area as f64 <= self.params.max_area_ratio * size.area() as f64
    }
}

// Closed edge outlines: boxes of plausible button size and shape.
fn buttons(edges: &GrayImage, size: ImageSize) -> Vec<Rect> {
    let closed = morphology::close(edges, defaults::BUTTON_KERNEL);
    let max_area = defaults::BUTTON_MAX_AREA_RATIO * size.area() as f64;
    let (min_aspect, max_aspect) = defaults::BUTTON_ASPECT_RANGE;
    outline_boxes(&closed, |c| {
        let area = c.bounds.area();
        let aspect = c.bounds.width as f64 / c.bounds.height as f64;
        area >= defaults::BUTTON_MIN_AREA_PX
            && area as f64 <= max_area
            && (min_aspect..=max_aspect).contains(&aspect)
    })
}

// Dilated edge outlines: roughly square boxes.
fn icons(edges: &GrayImage, size: ImageSize) -> Vec<Rect> {
    let dilated = morphology::dilate(edges, defaults::ICON_KERNEL);
    let max_area = defaults::ICON_MAX_AREA_RATIO * size.area() as f64;
    outline_boxes(&dilated, |c| {
        let area = c.bounds.area();
        area >= defaults::ICON_MIN_AREA_PX
            && area as f64 <= max_area
            && c.aspect() <= defaults::ICON_MAX_ASPECT
    })
}

fn outline_boxes<F>(binary: &GrayImage, keep: F) -> Vec<Rect>
where
    F: Fn(&Component) -> bool,
{
    Components::from_binary(binary, Connectivity::Eight)
        .components()
        .iter()
        .filter(|c| keep(c))
        .map(|c| c.bounds)
        .collect()
}

/// Keep rectangles largest first, skipping any whose IoU with a kept one exceeds `max_iou`
pub fn merge_overlapping(mut rects: Vec<Rect>, max_iou: f64) -> Vec<Rect> {
    rects.sort_by(|a, b| b.area().cmp(&a.area()).then((a.y, a.x).cmp(&(b.y, b.x))));
    let mut kept: Vec<Rect> = Vec::with_capacity(rects.len());
    for rect in rects {
        if kept.iter().all(|k| k.iou(&rect) <= max_iou) {
            kept.push(rect);
        }
    }
    kept
}

// A mask covering its whole bounding box carries no extra information.
fn candidate_from_mask(mask: Mask) -> CandidateRegion {
    if mask.is_full() {
        CandidateRegion::rect(mask.bounds())
    } else {
        CandidateRegion::from_mask(mask)
    }
}
