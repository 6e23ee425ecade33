//! SLIC superpixel atoms and interactive merge-based selection
//!
//! Implements region building that:
//! - Partitions the image into compact Lab-homogeneous atoms (SLIC)
//! - Enforces atom connectivity by absorbing small fragments
//! - Grows a selection by clicked atoms and similar neighbours
//! - Selects every atom touched by a dragged rectangle
//! - Converts the selection into a masked candidate region

use std::collections::{BTreeSet, HashMap};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::components::{Components, Connectivity, LabelGrid};
use crate::cancel::CancelToken;
use crate::color::{ColorConverter, LabImage, LabPixel};
use crate::constants::superpixel as defaults;
use crate::error::{Result, RoiError};
use crate::model::{CandidateRegion, ImageSize, Mask, Point, Rect, RectInput};

/// Index of an atom within its [`SegmentationMap`]
pub type AtomId = u32;

/// Tunable parameters of [`SuperpixelSegmenter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperpixelParams {
    /// Explicit atom count; derived from `region_size` when absent
    pub region_count: Option<u32>,
    /// Nominal atom side used to derive the atom count
    pub region_size: u32,
    pub compactness: f32,
    pub iterations: u32,
    /// ΔE76 under which neighbours join a clicked atom; `None` adds one atom per click
    pub similarity_threshold: Option<f32>,
}

impl Default for SuperpixelParams {
    fn default() -> Self {
        Self {
            region_count: None,
            region_size: defaults::REGION_SIZE,
            compactness: defaults::COMPACTNESS,
            iterations: defaults::ITERATIONS,
            similarity_threshold: Some(defaults::SIMILARITY_THRESHOLD),
        }
    }
}

impl SuperpixelParams {
    /// Atom count to request for an image of `size`
    pub fn region_count_for(&self, size: ImageSize) -> u32 {
        self.region_count.unwrap_or_else(|| {
            let side = self.region_size.max(1) as u64;
            let derived = size.area() / (side * side);
            (derived.min(u32::MAX as u64) as u32).max(defaults::MIN_REGION_COUNT)
        })
    }
}

/// One superpixel
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub id: AtomId,
    /// Pixel count
    pub area: u32,
    pub bounds: Rect,
    pub mean_rgb: [u8; 3],
    pub mean_lab: LabPixel,
    /// Ids of 4-adjacent atoms, ascending
    pub neighbors: Vec<AtomId>,
}

/// Immutable per-pixel atom labelling of one image
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMap {
    width: u32,
    height: u32,
    labels: Vec<AtomId>,
    atoms: Vec<Atom>,
}

impl SegmentationMap {
    /// Build a map from an externally supplied label grid
    ///
    /// Label values are arbitrary; they are renumbered densely in scan
    /// order. Atoms are not required to be connected.
    pub fn from_labels(image: &RgbImage, labels: &[u32]) -> Result<Self> {
        let (width, height) = image.dimensions();
        if labels.len() != width as usize * height as usize {
            return Err(RoiError::invalid_parameter(
                "labels",
                format!("{} entries for a {width}x{height} image", labels.len()),
            ));
        }
        let mut remap: HashMap<u32, AtomId> = HashMap::new();
        let dense: Vec<AtomId> = labels
            .iter()
            .map(|l| {
                let next = remap.len() as AtomId;
                *remap.entry(*l).or_insert(next)
            })
            .collect();
        let lab = ColorConverter::new().image_to_lab(image);
        Self::assemble(image, &lab, dense, remap.len(), &CancelToken::new())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn label_at(&self, x: u32, y: u32) -> AtomId {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Atom under `point`, `None` outside the image
    pub fn pick_atom(&self, point: Point) -> Option<AtomId> {
        if point.x < 0 || point.y < 0 {
            return None;
        }
        let (x, y) = (point.x as u32, point.y as u32);
        (x < self.width && y < self.height).then(|| self.label_at(x, y))
    }

    /// Add `atom` and, with a threshold, its similar direct neighbours
    ///
    /// The additions form one batch so [`Selection::shrink`] removes them
    /// together. An atom already selected leaves the selection unchanged.
    pub fn grow_selection(
        &self,
        selection: &Selection,
        atom: AtomId,
        similarity_threshold: Option<f32>,
    ) -> Selection {
        let Some(clicked) = self.atom(atom) else {
            return selection.clone();
        };
        if selection.contains(atom) {
            return selection.clone();
        }
        let converter = ColorConverter::new();
        let mut batch = vec![atom];
        if let Some(threshold) = similarity_threshold {
            batch.extend(clicked.neighbors.iter().copied().filter(|&n| {
                !selection.contains(n)
                    && converter.delta_e(clicked.mean_lab, self.atoms[n as usize].mean_lab)
                        <= threshold
            }));
        }
        let mut grown = selection.clone();
        grown.batches.push(batch);
        grown
    }

    /// Atoms with at least one pixel inside `rect`, ascending
    ///
    /// The rectangle is clamped to the image first; one lying wholly outside
    /// touches no atom.
    pub fn atoms_in_rect(&self, rect: RectInput) -> Vec<AtomId> {
        let Some(rect) = rect.clamp_to(ImageSize::new(self.width, self.height)) else {
            return Vec::new();
        };
        let mut found = BTreeSet::new();
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                found.insert(self.label_at(x, y));
            }
        }
        found.into_iter().collect()
    }

    /// Add the atoms touched by `rect` as one batch
    ///
    /// Atoms already selected are skipped; when nothing new is touched the
    /// selection is returned unchanged.
    pub fn select_rect(&self, selection: &Selection, rect: RectInput) -> Selection {
        let batch: Vec<AtomId> = self
            .atoms_in_rect(rect)
            .into_iter()
            .filter(|&a| !selection.contains(a))
            .collect();
        let mut grown = selection.clone();
        if !batch.is_empty() {
            grown.batches.push(batch);
        }
        grown
    }

    /// Candidate covering the selected atoms, `None` for an empty selection
    pub fn to_candidate(&self, selection: &Selection) -> Option<CandidateRegion> {
        let mut selected = vec![false; self.atoms.len()];
        let mut bounds: Option<Rect> = None;
        for id in selection.atoms() {
            let atom = self.atom(id)?;
            selected[id as usize] = true;
            bounds = Some(bounds.map_or(atom.bounds, |b| b.union(&atom.bounds)));
        }
        let mask = Mask::from_predicate(bounds?, |x, y| selected[self.label_at(x, y) as usize])?;
        Some(CandidateRegion::from_mask(mask))
    }

    // Per-atom statistics and adjacency from a dense labelling.
    fn assemble(
        image: &RgbImage,
        lab: &LabImage,
        labels: Vec<AtomId>,
        count: usize,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let (width, height) = image.dimensions();
        let w = width as usize;

        #[derive(Clone)]
        struct Accum {
            area: u32,
            min: (u32, u32),
            max: (u32, u32),
            rgb: [u64; 3],
            lab: [f64; 3],
            neighbors: BTreeSet<AtomId>,
        }
        let mut acc = vec![
            Accum {
                area: 0,
                min: (u32::MAX, u32::MAX),
                max: (0, 0),
                rgb: [0; 3],
                lab: [0.0; 3],
                neighbors: BTreeSet::new(),
            };
            count
        ];

        for y in 0..height {
            for x in 0..width {
                let idx = y as usize * w + x as usize;
                let id = labels[idx];
                let a = &mut acc[id as usize];
                a.area += 1;
                a.min = (a.min.0.min(x), a.min.1.min(y));
                a.max = (a.max.0.max(x), a.max.1.max(y));
                let px = image.get_pixel(x, y).0;
                let lx = lab.get(x, y);
                for c in 0..3 {
                    a.rgb[c] += px[c] as u64;
                    a.lab[c] += lx[c] as f64;
                }
                if x + 1 < width && labels[idx + 1] != id {
                    let other = labels[idx + 1];
                    acc[id as usize].neighbors.insert(other);
                    acc[other as usize].neighbors.insert(id);
                }
                if y + 1 < height && labels[idx + w] != id {
                    let other = labels[idx + w];
                    acc[id as usize].neighbors.insert(other);
                    acc[other as usize].neighbors.insert(id);
                }
            }
        }

        let mut atoms = Vec::with_capacity(count);
        for (id, a) in acc.into_iter().enumerate() {
            cancel.check("superpixel atom statistics")?;
            let bounds = Rect::new(
                a.min.0,
                a.min.1,
                a.max.0.saturating_sub(a.min.0) + 1,
                a.max.1.saturating_sub(a.min.1) + 1,
            )
            .ok_or_else(|| RoiError::segmentation("empty superpixel"))?;
            let n = a.area.max(1) as u64;
            atoms.push(Atom {
                id: id as AtomId,
                area: a.area,
                bounds,
                mean_rgb: [
                    (a.rgb[0] / n) as u8,
                    (a.rgb[1] / n) as u8,
                    (a.rgb[2] / n) as u8,
                ],
                mean_lab: [
                    (a.lab[0] / n as f64) as f32,
                    (a.lab[1] / n as f64) as f32,
                    (a.lab[2] / n as f64) as f32,
                ],
                neighbors: a.neighbors.into_iter().collect(),
            });
        }

        Ok(Self {
            width,
            height,
            labels,
            atoms,
        })
    }
}

/// Selected atoms, grouped in the batches they were added in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    batches: Vec<Vec<AtomId>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, atom: AtomId) -> bool {
        self.batches.iter().any(|b| b.contains(&atom))
    }

    pub fn atoms(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.batches.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Drop the most recent batch
    pub fn shrink(&self) -> Selection {
        let mut shrunk = self.clone();
        shrunk.batches.pop();
        shrunk
    }

    /// Drop a single atom wherever it was added
    pub fn remove_atom(&self, atom: AtomId) -> Selection {
        let batches = self
            .batches
            .iter()
            .map(|b| b.iter().copied().filter(|&a| a != atom).collect::<Vec<_>>())
            .filter(|b| !b.is_empty())
            .collect();
        Selection { batches }
    }
}

/// SLIC segmenter
#[derive(Debug, Clone, Default)]
pub struct SuperpixelSegmenter {
    params: SuperpixelParams,
    converter: ColorConverter,
}

#[derive(Debug, Clone, Copy)]
struct Center {
    lab: LabPixel,
    x: f32,
    y: f32,
}

impl SuperpixelSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: SuperpixelParams) -> Self {
        Self {
            params,
            converter: ColorConverter::new(),
        }
    }

    pub fn params(&self) -> &SuperpixelParams {
        &self.params
    }

    /// Segment `image` into about `target_regions` atoms
    ///
    /// # Errors
    ///
    /// Returns `RoiError` if the image is smaller than the minimum side,
    /// the parameters are out of range, or `cancel` fires.
    pub fn precompute(
        &self,
        image: &RgbImage,
        target_regions: u32,
        compactness: f32,
        cancel: &CancelToken,
    ) -> Result<SegmentationMap> {
        let (width, height) = image.dimensions();
        if width < defaults::MIN_IMAGE_SIDE || height < defaults::MIN_IMAGE_SIDE {
            return Err(RoiError::segmentation(format!(
                "image {width}x{height} is too small for superpixels"
            )));
        }
        if target_regions == 0 {
            return Err(RoiError::invalid_parameter("target_regions", target_regions));
        }
        if !compactness.is_finite() || compactness <= 0.0 {
            return Err(RoiError::invalid_parameter("compactness", compactness));
        }

        let n = width as usize * height as usize;
        let k = (target_regions as usize).min(n);
        let lab = self.converter.image_to_lab(image);

        // Step 1: grid seeding with gradient perturbation
        let nominal = (n as f32 / k as f32).sqrt();
        let cols = ((width as f32 / nominal).round() as u32).max(1);
        let rows = ((height as f32 / nominal).round() as u32).max(1);
        let step_x = width as f32 / cols as f32;
        let step_y = height as f32 / rows as f32;
        let step = step_x.max(step_y);
        let mut centers = Vec::with_capacity((cols * rows) as usize);
        for j in 0..rows {
            for i in 0..cols {
                let gx = ((i as f32 + 0.5) * step_x) as u32;
                let gy = ((j as f32 + 0.5) * step_y) as u32;
                let (x, y) = lowest_gradient(&lab, gx.min(width - 1), gy.min(height - 1));
                centers.push(Center {
                    lab: lab.get(x, y),
                    x: x as f32,
                    y: y as f32,
                });
            }
        }

        let mut labels: Vec<u32> = (0..n)
            .map(|idx| {
                let x = (idx % width as usize) as f32;
                let y = (idx / width as usize) as f32;
                let i = ((x / step_x) as u32).min(cols - 1);
                let j = ((y / step_y) as u32).min(rows - 1);
                j * cols + i
            })
            .collect();

        // Step 2: local k-means in a 2S x 2S window
        let spatial_weight = (compactness / step).powi(2);
        let radius = step.ceil() as i64;
        for iteration in 0..self.params.iterations {
            cancel.check("superpixel iteration")?;
            let mut distances = vec![f32::INFINITY; n];
            for (ci, c) in centers.iter().enumerate() {
                let x0 = (c.x as i64 - radius).max(0) as u32;
                let x1 = ((c.x as i64 + radius) as u32).min(width - 1);
                let y0 = (c.y as i64 - radius).max(0) as u32;
                let y1 = ((c.y as i64 + radius) as u32).min(height - 1);
                for y in y0..=y1 {
                    for x in x0..=x1 {
                        let p = lab.get(x, y);
                        let dc = sq_dist(p, c.lab);
                        let dx = x as f32 - c.x;
                        let dy = y as f32 - c.y;
                        let d = dc + (dx * dx + dy * dy) * spatial_weight;
                        let idx = y as usize * width as usize + x as usize;
                        if d < distances[idx] {
                            distances[idx] = d;
                            labels[idx] = ci as u32;
                        }
                    }
                }
            }

            let mut sums = vec![[0f64; 5]; centers.len()];
            let mut counts = vec![0u32; centers.len()];
            for (idx, &label) in labels.iter().enumerate() {
                let (x, y) = (idx % width as usize, idx / width as usize);
                let p = lab.pixels()[idx];
                let s = &mut sums[label as usize];
                s[0] += p[0] as f64;
                s[1] += p[1] as f64;
                s[2] += p[2] as f64;
                s[3] += x as f64;
                s[4] += y as f64;
                counts[label as usize] += 1;
            }
            for ((c, s), &count) in centers.iter_mut().zip(&sums).zip(&counts) {
                if count == 0 {
                    continue;
                }
                let m = count as f64;
                c.lab = [(s[0] / m) as f32, (s[1] / m) as f32, (s[2] / m) as f32];
                c.x = (s[3] / m) as f32;
                c.y = (s[4] / m) as f32;
            }
            debug!(iteration, "slic pass complete");
        }

        // Step 3: connectivity enforcement
        let min_fragment = (n / k) / defaults::MIN_FRAGMENT_DIVISOR as usize;
        let (dense, count) = enforce_connectivity(width, height, &labels, min_fragment, cancel)?;

        // Step 4: atom statistics
        let map = SegmentationMap::assemble(image, &lab, dense, count, cancel)?;
        debug!(
            atoms = map.len(),
            requested = target_regions,
            "superpixel segmentation finished"
        );
        Ok(map)
    }
}

fn sq_dist(a: LabPixel, b: LabPixel) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn gradient(lab: &LabImage, x: u32, y: u32) -> f32 {
    let (w, h) = (lab.width(), lab.height());
    let left = lab.get(x.saturating_sub(1), y);
    let right = lab.get((x + 1).min(w - 1), y);
    let up = lab.get(x, y.saturating_sub(1));
    let down = lab.get(x, (y + 1).min(h - 1));
    sq_dist(left, right) + sq_dist(up, down)
}

fn lowest_gradient(lab: &LabImage, x: u32, y: u32) -> (u32, u32) {
    let mut best = (x, y);
    let mut best_g = gradient(lab, x, y);
    for ny in y.saturating_sub(1)..=(y + 1).min(lab.height() - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(lab.width() - 1) {
            let g = gradient(lab, nx, ny);
            if g < best_g {
                best_g = g;
                best = (nx, ny);
            }
        }
    }
    best
}

// Relabel 4-connected pieces densely; pieces smaller than `min_fragment`
// join the already relabelled piece to their left or above.
fn enforce_connectivity(
    width: u32,
    height: u32,
    labels: &[u32],
    min_fragment: usize,
    cancel: &CancelToken,
) -> Result<(Vec<AtomId>, usize)> {
    let grid = LabelGrid::from_raw(width, height, labels.to_vec())
        .ok_or_else(|| RoiError::segmentation("label grid does not match the image size"))?;
    let pieces = Components::from_label_grid(&grid, Connectivity::Four);

    let w = width as usize;
    let mut targets: HashMap<u32, AtomId> = HashMap::with_capacity(pieces.len());
    let mut dense = vec![AtomId::MAX; labels.len()];
    let mut next: AtomId = 0;
    for (idx, (x, y, _)) in grid.enumerate_pixels().enumerate() {
        let label = pieces.label_at(x, y);
        if let Some(&target) = targets.get(&label) {
            dense[idx] = target;
            continue;
        }
        cancel.check("superpixel connectivity")?;
        let area = pieces.by_label(label).map_or(0, |c| c.area);
        let adjacent = [
            (x > 0).then(|| idx - 1),
            (y > 0).then(|| idx - w),
        ]
        .into_iter()
        .flatten()
        .map(|i| dense[i])
        .find(|&l| l != AtomId::MAX);

        let target = match adjacent {
            Some(l) if area < min_fragment as u64 => l,
            _ => {
                next += 1;
                next - 1
            }
        };
        targets.insert(label, target);
        dense[idx] = target;
    }
    Ok((dense, next as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn two_tone(width: u32, height: u32, split: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < split {
                Rgb([220, 30, 30])
            } else {
                Rgb([30, 30, 220])
            }
        })
    }

    #[test]
    fn test_merge_of_adjacent_atoms_covers_both_areas() {
        let image = RgbImage::from_pixel(55, 20, Rgb([90, 90, 90]));
        let labels: Vec<u32> = (0..55 * 20).map(|i| if i % 55 < 25 { 7 } else { 3 }).collect();
        let map = SegmentationMap::from_labels(&image, &labels).unwrap();
        assert_eq!(map.atom(0).unwrap().area, 500);
        assert_eq!(map.atom(1).unwrap().area, 600);

        let selection = map.grow_selection(&Selection::new(), 0, Some(5.0));
        let candidate = map.to_candidate(&selection).unwrap();
        assert_eq!(candidate.area(), 1100);
        assert_eq!(candidate.rect, Rect::new(0, 0, 55, 20).unwrap());
    }

    #[test]
    fn test_grow_without_threshold_adds_one_atom() {
        let image = two_tone(40, 10, 20);
        let labels: Vec<u32> = (0..400).map(|i| (i % 40 / 10) as u32).collect();
        let map = SegmentationMap::from_labels(&image, &labels).unwrap();
        let one = map.grow_selection(&Selection::new(), 1, None);
        assert_eq!(one.len(), 1);
        // similar neighbour 0 joins, dissimilar neighbour 2 does not
        let similar = map.grow_selection(&Selection::new(), 1, Some(10.0));
        assert_eq!(similar.atoms().collect::<Vec<_>>(), vec![1, 0]);
        assert_eq!(map.grow_selection(&similar, 0, Some(10.0)), similar);
    }

    #[test]
    fn test_shrink_and_remove() {
        let image = two_tone(40, 10, 20);
        let labels: Vec<u32> = (0..400).map(|i| (i % 40 / 10) as u32).collect();
        let map = SegmentationMap::from_labels(&image, &labels).unwrap();
        let s = map.grow_selection(&Selection::new(), 0, None);
        let s = map.grow_selection(&s, 3, None);
        assert_eq!(s.shrink().atoms().collect::<Vec<_>>(), vec![0]);
        assert!(s.shrink().shrink().is_empty());
        assert!(map.to_candidate(&Selection::new()).is_none());
        assert_eq!(s.remove_atom(0).atoms().collect::<Vec<_>>(), vec![3]);
        assert!(s.remove_atom(0).remove_atom(3).is_empty());
    }

    #[test]
    fn test_slic_respects_strong_edges() {
        let image = two_tone(120, 90, 60);
        let map = SuperpixelSegmenter::new()
            .precompute(&image, 12, 15.0, &CancelToken::new())
            .unwrap();
        assert!(map.len() >= 4);
        let total: u32 = map.atoms().iter().map(|a| a.area).sum();
        assert_eq!(total, 120 * 90);
        for y in 0..90 {
            for x in 0..120 {
                let atom = map.atom(map.label_at(x, y)).unwrap();
                assert_eq!(atom.mean_rgb, image.get_pixel(x, y).0);
            }
        }
    }

    #[test]
    fn test_atoms_are_connected() {
        let image = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 100]));
        let map = SuperpixelSegmenter::new()
            .precompute(&image, 20, 10.0, &CancelToken::new())
            .unwrap();
        let grid = LabelGrid::from_raw(64, 48, map.labels.clone()).unwrap();
        let pieces = Components::from_label_grid(&grid, Connectivity::Four);
        assert_eq!(pieces.len(), map.len());
        let total: u64 = pieces.components().iter().map(|c| c.area).sum();
        assert_eq!(total, 64 * 48);
    }

    #[test]
    fn test_drag_selects_every_touched_atom() {
        let image = RgbImage::from_pixel(30, 20, Rgb([120, 120, 120]));
        let labels: Vec<u32> = (0..30 * 20).map(|i| (i % 30) / 10).collect();
        let map = SegmentationMap::from_labels(&image, &labels).unwrap();
        assert_eq!(map.len(), 3);

        assert_eq!(map.atoms_in_rect(RectInput::new(8, 2, 4, 4)), vec![0, 1]);
        assert_eq!(map.atoms_in_rect(RectInput::new(25, 5, -20, 3)), vec![0, 1, 2]);
        assert!(map.atoms_in_rect(RectInput::new(40, 0, 5, 5)).is_empty());

        let selection = map.grow_selection(&Selection::new(), 1, None);
        let dragged = map.select_rect(&selection, RectInput::new(5, 0, 20, 20));
        assert_eq!(dragged.atoms().collect::<Vec<_>>(), vec![1, 0, 2]);
        assert_eq!(dragged.shrink(), selection);
        assert_eq!(map.to_candidate(&dragged).unwrap().area(), 600);

        let unchanged = map.select_rect(&dragged, RectInput::new(0, 0, 30, 20));
        assert_eq!(unchanged, dragged);
    }

    #[test]
    fn test_pick_atom_outside_image() {
        let image = two_tone(20, 20, 10);
        let map = SuperpixelSegmenter::new()
            .precompute(&image, 4, 15.0, &CancelToken::new())
            .unwrap();
        assert!(map.pick_atom(Point::new(-1, 5)).is_none());
        assert!(map.pick_atom(Point::new(5, 20)).is_none());
        assert!(map.pick_atom(Point::new(19, 19)).is_some());
    }

    #[test]
    fn test_cancelled_precompute() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = SuperpixelSegmenter::new().precompute(&two_tone(40, 40, 20), 8, 15.0, &cancel);
        assert!(matches!(result, Err(RoiError::Cancelled { .. })));
    }

    #[test]
    fn test_tiny_image_fails() {
        let result = SuperpixelSegmenter::new().precompute(
            &two_tone(3, 40, 1),
            8,
            15.0,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(RoiError::SegmentationFailure { .. })));
    }

    #[test]
    fn test_region_count_derivation() {
        let params = SuperpixelParams::default();
        assert_eq!(params.region_count_for(ImageSize::new(300, 300)), 100);
        assert_eq!(params.region_count_for(ImageSize::new(50, 50)), 10);
    }
}
