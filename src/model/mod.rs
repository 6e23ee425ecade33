//! ROI data model: geometry, masks, action configuration and the ROI set

pub mod geometry;
pub mod history;
pub mod mask;
pub mod roi;
pub mod set;

pub use geometry::{ImageSize, Point, Rect, RectInput};
pub use history::{Edit, EditLog};
pub use mask::{Mask, MaskRef};
pub use roi::{
    ClickMode, ImageActionKind, RegionActionKind, Roi, RoiAction, RoiConfig, RoiId, RoiKind,
    RoiRecord, SwipeDirection,
};
pub use set::{default_label, RoiDocument, RoiDraft, RoiPatch, RoiSet};

/// Uncommitted region proposal produced by an engine
///
/// The mask, when present, lies inside `rect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRegion {
    pub rect: Rect,
    pub mask: Option<Mask>,
}

impl CandidateRegion {
    /// Plain rectangular candidate
    pub fn rect(rect: Rect) -> Self {
        Self { rect, mask: None }
    }

    /// Candidate whose rectangle is the mask's bounds
    pub fn from_mask(mask: Mask) -> Self {
        Self {
            rect: mask.bounds(),
            mask: Some(mask),
        }
    }

    /// Pixel footprint: mask area, or rect area without a mask
    pub fn area(&self) -> u64 {
        self.mask.as_ref().map_or(self.rect.area(), Mask::area)
    }

    /// Draft for committing this candidate with `config`
    pub fn into_draft(self, config: RoiConfig, label: Option<String>) -> RoiDraft {
        RoiDraft {
            rect: self.rect.into(),
            config,
            label,
            mask: self.mask,
        }
    }
}
