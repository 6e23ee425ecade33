//! Iterative foreground refinement from a coarse box or point seed
//!
//! Implements a GrabCut-style extractor that:
//! - Fixes pixels outside the seed rectangle as background
//! - Models foreground and background colour with Gaussian mixtures
//! - Relabels uncertain pixels by likelihood ratio and neighbour agreement
//! - Keeps the component under the seed and falls back to the plain box
//!   when the result is degenerate

use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::components::{Components, Connectivity};
use super::morphology;
use crate::cancel::CancelToken;
use crate::constants::smart as defaults;
use crate::error::{Result, RoiError};
use crate::model::{CandidateRegion, ImageSize, Point, Rect, RectInput};

/// Samples used per colour model fit, larger sets are strided down
const MAX_MODEL_SAMPLES: usize = 20_000;

/// Lloyd passes used to settle mixture components
const MODEL_FIT_PASSES: usize = 3;

/// Width of the seed border treated as background when no margin fits
const BORDER_RING: u32 = 2;

/// Closing kernel applied to the final mask
const CLEANUP_KERNEL: u32 = 3;

/// Tunable parameters of [`SmartSegmenter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartParams {
    pub iterations: u32,
    /// Gaussian components per colour model
    pub components: usize,
    pub smoothness: f32,
    pub convergence_pixels: u32,
    pub background_margin: u32,
    pub point_expansion: u32,
    pub min_area: u32,
}

impl Default for SmartParams {
    fn default() -> Self {
        Self {
            iterations: defaults::ITERATIONS,
            components: defaults::GMM_COMPONENTS,
            smoothness: defaults::SMOOTHNESS,
            convergence_pixels: defaults::CONVERGENCE_PIXELS,
            background_margin: defaults::BACKGROUND_MARGIN,
            point_expansion: defaults::POINT_EXPANSION,
            min_area: defaults::MIN_AREA_PX,
        }
    }
}

/// Coarse user input to refine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmartSeed {
    Rect(RectInput),
    /// Hard foreground points; their bounding box is expanded to form the rectangle
    Points(Vec<Point>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelState {
    Probable,
    FixedBackground,
    FixedForeground,
}

/// Foreground extractor
#[derive(Debug, Clone, Default)]
pub struct SmartSegmenter {
    params: SmartParams,
}

impl SmartSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: SmartParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SmartParams {
        &self.params
    }

    /// Refine `seed` into a masked candidate
    ///
    /// Always yields a candidate for a usable seed: when refinement produces
    /// an empty, tiny or box-shaped mask, the seed rectangle is returned
    /// without a mask.
    ///
    /// # Errors
    ///
    /// Returns `RoiError` if the image is empty, the seed has no area inside
    /// the image, or `cancel` fires.
    pub fn refine(
        &self,
        image: &RgbImage,
        seed: &SmartSeed,
        iterations: u32,
        cancel: &CancelToken,
    ) -> Result<CandidateRegion> {
        let size = ImageSize::new(image.width(), image.height());
        if size.is_empty() {
            return Err(RoiError::segmentation("image is empty"));
        }
        let (seed_rect, hard_points) = self.resolve_seed(seed, size)?;
        let work = seed_rect
            .expanded(self.params.background_margin, size)
            .unwrap_or(seed_rect);
        let ring_only = work == seed_rect;
        let (ww, wh) = (work.width as usize, work.height as usize);
        let n = ww * wh;

        // Step 1: initial labelling
        let mut states = vec![PixelState::Probable; n];
        let mut fg = vec![false; n];
        let mut pixels = Vec::with_capacity(n);
        for ly in 0..wh {
            for lx in 0..ww {
                let (gx, gy) = (work.x + lx as u32, work.y + ly as u32);
                let p = image.get_pixel(gx, gy).0;
                pixels.push([p[0] as f32, p[1] as f32, p[2] as f32]);
                let idx = ly * ww + lx;
                let on_ring = ring_only && on_border(&seed_rect, gx, gy);
                if seed_rect.contains(gx, gy) && !on_ring {
                    fg[idx] = true;
                } else {
                    states[idx] = PixelState::FixedBackground;
                }
            }
        }
        for (px, py) in hard_points {
            let idx = (py - work.y) as usize * ww + (px - work.x) as usize;
            states[idx] = PixelState::FixedForeground;
            fg[idx] = true;
        }
        if !states.contains(&PixelState::Probable)
            || !states.contains(&PixelState::FixedBackground)
        {
            debug!(?seed_rect, "nothing to refine, using seed rectangle");
            return Ok(CandidateRegion::rect(seed_rect));
        }

        // Step 2: alternate model fitting and relabelling
        for pass in 0..iterations {
            cancel.check("smart refinement")?;
            let fg_model = Gmm::fit(&samples(&pixels, &fg, true), self.params.components);
            let bg_model = Gmm::fit(&samples(&pixels, &fg, false), self.params.components);
            let (Some(fg_model), Some(bg_model)) = (fg_model, bg_model) else {
                debug!(pass, "one colour model is empty, stopping");
                break;
            };
            // The first pass relabels on colour alone.
            let weight = if pass == 0 { 0.0 } else { self.params.smoothness };
            let next: Vec<bool> = (0..n)
                .into_par_iter()
                .map(|i| match states[i] {
                    PixelState::FixedBackground => false,
                    PixelState::FixedForeground => true,
                    PixelState::Probable => {
                        let data = fg_model.log_likelihood(pixels[i])
                            - bg_model.log_likelihood(pixels[i]);
                        data + weight * neighbour_balance(&fg, i, ww, wh) > 0.0
                    }
                })
                .collect();
            let changed = next.iter().zip(&fg).filter(|(a, b)| a != b).count();
            fg = next;
            debug!(pass, changed, "smart refinement pass");
            if changed < self.params.convergence_pixels as usize {
                break;
            }
        }

        // Step 3: clean up and keep the component under the seed
        let grid = morphology::binary_from_fn(work.width, work.height, |x, y| {
            fg[y as usize * ww + x as usize]
        });
        let parts = Components::from_binary(
            &morphology::close(&grid, CLEANUP_KERNEL),
            Connectivity::Eight,
        );
        let (cx, cy) = seed_rect.center();
        let chosen = parts
            .at(cx - work.x, cy - work.y)
            .or_else(|| parts.largest());
        let mask = chosen.and_then(|component| {
            parts
                .mask(component, (work.x, work.y))?
                .clipped(&seed_rect)
        });

        // Step 4: degenerate results fall back to the box
        match mask {
            Some(mask)
                if mask.area() >= self.params.min_area as u64
                    && !(mask.bounds() == seed_rect && mask.is_full()) =>
            {
                debug!(area = mask.area(), bounds = ?mask.bounds(), "smart refinement found mask");
                Ok(CandidateRegion::from_mask(mask))
            }
            _ => {
                debug!(?seed_rect, "smart refinement degenerate, using seed rectangle");
                Ok(CandidateRegion::rect(seed_rect))
            }
        }
    }

    fn resolve_seed(&self, seed: &SmartSeed, size: ImageSize) -> Result<(Rect, Vec<(u32, u32)>)> {
        match seed {
            SmartSeed::Rect(input) => {
                let rect = input.clamp_to(size).ok_or_else(|| {
                    RoiError::segmentation("seed rectangle has no area inside the image")
                })?;
                Ok((rect, Vec::new()))
            }
            SmartSeed::Points(points) => {
                let clamped: Vec<(u32, u32)> =
                    points.iter().filter_map(|p| p.clamp_to(size)).collect();
                let (Some(min_x), Some(max_x), Some(min_y), Some(max_y)) = (
                    clamped.iter().map(|p| p.0).min(),
                    clamped.iter().map(|p| p.0).max(),
                    clamped.iter().map(|p| p.1).min(),
                    clamped.iter().map(|p| p.1).max(),
                ) else {
                    return Err(RoiError::invalid_parameter("seed", "no points"));
                };
                let e = self.params.point_expansion as i64;
                let rect = RectInput::new(
                    min_x as i64 - e,
                    min_y as i64 - e,
                    (max_x - min_x) as i64 + 1 + 2 * e,
                    (max_y - min_y) as i64 + 1 + 2 * e,
                )
                .clamp_to(size)
                .ok_or_else(|| RoiError::segmentation("point seed has no area"))?;
                Ok((rect, clamped))
            }
        }
    }
}

fn on_border(rect: &Rect, x: u32, y: u32) -> bool {
    x < rect.x + BORDER_RING
        || y < rect.y + BORDER_RING
        || x as u64 >= rect.right().saturating_sub(BORDER_RING as u64)
        || y as u64 >= rect.bottom().saturating_sub(BORDER_RING as u64)
}

fn samples(pixels: &[[f32; 3]], fg: &[bool], want: bool) -> Vec<[f32; 3]> {
    let count = fg.iter().filter(|&&f| f == want).count();
    let stride = count.div_ceil(MAX_MODEL_SAMPLES).max(1);
    pixels
        .iter()
        .zip(fg)
        .filter(|(_, &f)| f == want)
        .step_by(stride)
        .map(|(p, _)| *p)
        .collect()
}

// Foreground minus background among the 8 neighbours inside the working area.
fn neighbour_balance(fg: &[bool], idx: usize, w: usize, h: usize) -> f32 {
    let (x, y) = ((idx % w) as i64, (idx / w) as i64);
    let mut balance = 0i32;
    for dy in -1..=1i64 {
        for dx in -1..=1i64 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            balance += if fg[ny as usize * w + nx as usize] { 1 } else { -1 };
        }
    }
    balance as f32
}

#[derive(Debug, Clone)]
struct Gaussian {
    log_weight: f32,
    mean: [f32; 3],
    inv_var: [f32; 3],
    log_norm: f32,
}

/// Diagonal-covariance Gaussian mixture over RGB
#[derive(Debug, Clone)]
struct Gmm {
    components: Vec<Gaussian>,
}

impl Gmm {
    /// Fit up to `k` components with farthest-point initialisation
    fn fit(samples: &[[f32; 3]], k: usize) -> Option<Gmm> {
        let first = *samples.first()?;
        let mut centers = vec![first];
        let mut nearest: Vec<f32> = samples.iter().map(|s| sq(s, &first)).collect();
        while centers.len() < k.max(1) {
            let (far, &dist) = nearest
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))?;
            if dist <= 0.0 {
                break;
            }
            let c = samples[far];
            centers.push(c);
            for (d, s) in nearest.iter_mut().zip(samples) {
                *d = d.min(sq(s, &c));
            }
        }

        let mut assignment = vec![0usize; samples.len()];
        for _ in 0..MODEL_FIT_PASSES {
            for (a, s) in assignment.iter_mut().zip(samples) {
                *a = closest(&centers, s);
            }
            for (ci, c) in centers.iter_mut().enumerate() {
                let members: Vec<&[f32; 3]> = samples
                    .iter()
                    .zip(&assignment)
                    .filter(|(_, &a)| a == ci)
                    .map(|(s, _)| s)
                    .collect();
                if let Some(m) = mean(&members) {
                    *c = m;
                }
            }
        }

        let total = samples.len() as f32;
        let components = centers
            .iter()
            .enumerate()
            .filter_map(|(ci, &center)| {
                let members: Vec<&[f32; 3]> = samples
                    .iter()
                    .zip(&assignment)
                    .filter(|(_, &a)| a == ci)
                    .map(|(s, _)| s)
                    .collect();
                let mean = mean(&members).unwrap_or(center);
                if members.is_empty() {
                    return None;
                }
                let mut var = [0f32; 3];
                for m in &members {
                    for c in 0..3 {
                        var[c] += (m[c] - mean[c]).powi(2);
                    }
                }
                let var = var.map(|v| (v / members.len() as f32).max(defaults::VARIANCE_FLOOR));
                let log_norm = -0.5
                    * var
                        .iter()
                        .map(|v| (2.0 * std::f32::consts::PI * v).ln())
                        .sum::<f32>();
                Some(Gaussian {
                    log_weight: (members.len() as f32 / total).ln(),
                    mean,
                    inv_var: var.map(|v| 1.0 / v),
                    log_norm,
                })
            })
            .collect::<Vec<_>>();
        (!components.is_empty()).then_some(Gmm { components })
    }

    fn log_likelihood(&self, x: [f32; 3]) -> f32 {
        let terms: Vec<f32> = self
            .components
            .iter()
            .map(|g| {
                let maha: f32 = (0..3).map(|c| (x[c] - g.mean[c]).powi(2) * g.inv_var[c]).sum();
                g.log_weight + g.log_norm - 0.5 * maha
            })
            .collect();
        let max = terms.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        max + terms.iter().map(|t| (t - max).exp()).sum::<f32>().ln()
    }
}

fn sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|c| (a[c] - b[c]).powi(2)).sum()
}

fn closest(centers: &[[f32; 3]], s: &[f32; 3]) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|a, b| sq(a.1, s).total_cmp(&sq(b.1, s)))
        .map_or(0, |(i, _)| i)
}

fn mean(members: &[&[f32; 3]]) -> Option<[f32; 3]> {
    if members.is_empty() {
        return None;
    }
    let mut sum = [0f32; 3];
    for m in members {
        for c in 0..3 {
            sum[c] += m[c];
        }
    }
    Some(sum.map(|s| s / members.len() as f32))
}
