//! Connected-component labelling on top of `imageproc::region_labelling`

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{self, connected_components};
use serde::{Deserialize, Serialize};

use crate::model::{Mask, Rect};

/// Label grid produced by the labelling pass, 0 is background
pub type LabelGrid = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Pixel adjacency used by component labelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

impl From<Connectivity> for region_labelling::Connectivity {
    fn from(value: Connectivity) -> Self {
        match value {
            Connectivity::Four => region_labelling::Connectivity::Four,
            Connectivity::Eight => region_labelling::Connectivity::Eight,
        }
    }
}

/// Summary of one labelled component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub label: u32,
    pub area: u64,
    pub bounds: Rect,
}

impl Component {
    /// Set pixels over bounding box area
    pub fn fill_ratio(&self) -> f64 {
        self.area as f64 / self.bounds.area() as f64
    }

    /// Long side over short side of the bounding box
    pub fn aspect(&self) -> f64 {
        let (w, h) = (self.bounds.width as f64, self.bounds.height as f64);
        w.max(h) / w.min(h)
    }
}

/// Labelled image plus per-component statistics
#[derive(Debug, Clone)]
pub struct Components {
    labels: LabelGrid,
    components: Vec<Component>,
    /// Label to index into `components`
    index: Vec<Option<usize>>,
}

impl Components {
    /// Components of the set pixels of a 0/255 binary image
    pub fn from_binary(image: &GrayImage, connectivity: Connectivity) -> Self {
        Self::summarize(connected_components(image, connectivity.into(), Luma([0u8])))
    }

    /// Spatially connected pieces of equal values in `grid`
    ///
    /// Every value is foreground, so a value that occurs in two disjoint
    /// places yields two components.
    pub fn from_label_grid(grid: &LabelGrid, connectivity: Connectivity) -> Self {
        Self::summarize(connected_components(grid, connectivity.into(), Luma([u32::MAX])))
    }

    fn summarize(labels: LabelGrid) -> Self {
        let mut index: Vec<Option<usize>> = Vec::new();
        let mut extents: Vec<(u32, u64, u32, u32, u32, u32)> = Vec::new();
        for (x, y, pixel) in labels.enumerate_pixels() {
            let label = pixel[0];
            if label == 0 {
                continue;
            }
            let slot = label as usize;
            if slot >= index.len() {
                index.resize(slot + 1, None);
            }
            let i = *index[slot].get_or_insert_with(|| {
                extents.push((label, 0, x, y, x, y));
                extents.len() - 1
            });
            let e = &mut extents[i];
            e.1 += 1;
            e.2 = e.2.min(x);
            e.3 = e.3.min(y);
            e.4 = e.4.max(x);
            e.5 = e.5.max(y);
        }

        let components = extents
            .into_iter()
            .filter_map(|(label, area, x0, y0, x1, y1)| {
                Some(Component {
                    label,
                    area,
                    bounds: Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)?,
                })
            })
            .collect();
        Self {
            labels,
            components,
            index,
        }
    }

    /// Components in scan order of their first pixel
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Label at `(x, y)`, 0 for background or out of range
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels.get_pixel_checked(x, y).map_or(0, |p| p[0])
    }

    /// Component containing `(x, y)`
    pub fn at(&self, x: u32, y: u32) -> Option<&Component> {
        self.by_label(self.label_at(x, y))
    }

    pub fn by_label(&self, label: u32) -> Option<&Component> {
        let i = (*self.index.get(label as usize)?)?;
        self.components.get(i)
    }

    pub fn largest(&self) -> Option<&Component> {
        self.components.iter().max_by_key(|c| c.area)
    }

    /// Footprint of `component` as an image-space mask, offset by `origin`
    pub fn mask(&self, component: &Component, origin: (u32, u32)) -> Option<Mask> {
        let b = component.bounds;
        let region = Rect::new(origin.0.checked_add(b.x)?, origin.1.checked_add(b.y)?, b.width, b.height)?;
        Mask::from_predicate(region, |x, y| {
            self.labels.get_pixel(x - origin.0, y - origin.1)[0] == component.label
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::morphology::binary_from_fn;

    fn diagonal_pair() -> GrayImage {
        binary_from_fn(4, 4, |x, y| (x, y) == (1, 1) || (x, y) == (2, 2))
    }

    #[test]
    fn test_connectivity_controls_diagonal_joins() {
        let grid = diagonal_pair();
        assert_eq!(Components::from_binary(&grid, Connectivity::Four).len(), 2);
        assert_eq!(Components::from_binary(&grid, Connectivity::Eight).len(), 1);
    }

    #[test]
    fn test_component_bounds_and_mask() {
        let grid = binary_from_fn(10, 10, |x, y| (2..5).contains(&x) && (3..9).contains(&y));
        let components = Components::from_binary(&grid, Connectivity::Four);
        let component = *components.at(3, 4).unwrap();
        assert_eq!(component.area, 18);
        assert_eq!(component.bounds, Rect::new(2, 3, 3, 6).unwrap());
        let mask = components.mask(&component, (100, 0)).unwrap();
        assert_eq!(mask.area(), 18);
        assert_eq!(mask.bounds(), Rect::new(102, 3, 3, 6).unwrap());
    }

    #[test]
    fn test_background_has_no_component() {
        let components = Components::from_binary(&diagonal_pair(), Connectivity::Eight);
        assert_eq!(components.label_at(0, 0), 0);
        assert!(components.at(0, 0).is_none());
        assert!(components.at(40, 40).is_none());
    }

    #[test]
    fn test_label_grid_splits_disjoint_equal_values() {
        let grid = LabelGrid::from_fn(6, 2, |x, _| Luma([if (2..4).contains(&x) { 1 } else { 0 }]));
        let components = Components::from_label_grid(&grid, Connectivity::Four);
        assert_eq!(components.len(), 3);
        let areas: Vec<u64> = components.components().iter().map(|c| c.area).collect();
        assert_eq!(areas, vec![4, 4, 4]);
    }
}
