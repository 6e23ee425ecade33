//! The ROI collection of one image, with validation, undo/redo and persistence

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::geometry::{ImageSize, Point, Rect, RectInput};
use super::history::{Edit, EditLog};
use super::mask::Mask;
use super::roi::{Roi, RoiConfig, RoiId, RoiKind, RoiRecord};
use crate::constants::roi as defaults;
use crate::error::{Result, RoiError};

/// Input for [`RoiSet::create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiDraft {
    pub rect: RectInput,
    pub config: RoiConfig,
    pub label: Option<String>,
    pub mask: Option<Mask>,
}

impl RoiDraft {
    pub fn new(rect: impl Into<RectInput>, config: RoiConfig) -> Self {
        Self {
            rect: rect.into(),
            config,
            label: None,
            mask: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mask(mut self, mask: Option<Mask>) -> Self {
        self.mask = mask;
        self
    }
}

/// Partial update for [`RoiSet::update`]; `None` fields keep the current value
///
/// `mask: Some(None)` removes the mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoiPatch {
    pub label: Option<String>,
    pub rect: Option<RectInput>,
    pub config: Option<RoiConfig>,
    pub mask: Option<Option<Mask>>,
}

impl RoiPatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn rect(rect: impl Into<RectInput>) -> Self {
        Self {
            rect: Some(rect.into()),
            ..Self::default()
        }
    }

    pub fn config(config: RoiConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }
}

/// Serialized form of a whole [`RoiSet`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiDocument {
    pub version: String,
    pub image: ImageSize,
    /// Id counter, so ids of deleted ROIs are not handed out again after reload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<u64>,
    pub rois: Vec<RoiRecord>,
}

/// Ordered ROIs of one image plus their edit log
///
/// List position is creation order. Ids are allocated from 1 and never
/// reused, even after delete or undo.
#[derive(Debug, Clone)]
pub struct RoiSet {
    image: ImageSize,
    rois: Vec<Roi>,
    next_id: u64,
    log: EditLog,
}

impl PartialEq for RoiSet {
    fn eq(&self, other: &Self) -> bool {
        self.image == other.image && self.rois == other.rois && self.next_id == other.next_id
    }
}

impl RoiSet {
    /// Empty set for an image of `image` dimensions
    pub fn new(image: ImageSize) -> Self {
        Self {
            image,
            rois: Vec::new(),
            next_id: 1,
            log: EditLog::new(),
        }
    }

    pub fn image_size(&self) -> ImageSize {
        self.image
    }

    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// ROIs in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Roi> {
        self.rois.iter()
    }

    pub fn as_slice(&self) -> &[Roi] {
        &self.rois
    }

    pub fn get(&self, id: RoiId) -> Option<&Roi> {
        self.rois.iter().find(|r| r.id == id)
    }

    /// Most recently created ROI whose rectangle contains `point`
    pub fn find_at(&self, point: Point) -> Option<&Roi> {
        self.rois.iter().rev().find(|r| r.contains(point))
    }

    pub fn history(&self) -> &EditLog {
        &self.log
    }

    /// Validate and append a new ROI
    pub fn create(&mut self, draft: RoiDraft) -> Result<Roi> {
        let id = RoiId(self.next_id);
        let roi = self.build(id, draft.label.as_deref(), draft.rect, &draft.config, draft.mask)?;
        self.next_id += 1;
        let index = self.rois.len();
        self.rois.push(roi.clone());
        self.log.record(Edit::Create {
            index,
            roi: roi.clone(),
        });
        debug!(id = %roi.id, kind = %roi.kind(), label = %roi.label, "roi created");
        Ok(roi)
    }

    /// Apply `patch` to ROI `id`
    ///
    /// The merged result is validated as a whole. On failure the ROI is left
    /// unchanged and the patch is returned inside [`RoiError::PatchRejected`].
    pub fn update(&mut self, id: RoiId, patch: RoiPatch) -> Result<Roi> {
        let index = self.index_of(id)?;
        let current = &self.rois[index];

        let rect = patch.rect.unwrap_or_else(|| RectInput::from(current.rect));
        let config = patch
            .config
            .clone()
            .unwrap_or_else(|| RoiConfig::from(&current.action));
        let mask = match &patch.mask {
            Some(mask) => mask.clone(),
            None => current.mask.clone(),
        };
        let label = patch.label.as_deref().unwrap_or(&current.label);

        let updated = match self.build(id, Some(label), rect, &config, mask) {
            Ok(roi) => roi,
            Err(err) => {
                let reason = match err {
                    RoiError::Validation { reason } => reason,
                    other => other.to_string(),
                };
                return Err(RoiError::PatchRejected {
                    id,
                    reason,
                    patch: Box::new(patch),
                });
            }
        };

        if updated == self.rois[index] {
            return Ok(updated);
        }
        let before = std::mem::replace(&mut self.rois[index], updated.clone());
        self.log.record(Edit::Modify {
            index,
            before,
            after: updated.clone(),
        });
        debug!(id = %id, "roi updated");
        Ok(updated)
    }

    /// Remove ROI `id`
    pub fn delete(&mut self, id: RoiId) -> Result<Roi> {
        let index = self.index_of(id)?;
        let roi = self.rois.remove(index);
        self.log.record(Edit::Delete {
            index,
            roi: roi.clone(),
        });
        debug!(id = %id, "roi deleted");
        Ok(roi)
    }

    /// Copy ROI `id` shifted by `offset`, clamped to the image
    ///
    /// The copy is labelled `label_N` with the smallest free `N >= 1`.
    pub fn duplicate(&mut self, id: RoiId, offset: (i64, i64)) -> Result<Roi> {
        let source = self.get(id).ok_or(RoiError::UnknownRoi { id })?.clone();
        let (dx, dy) = offset;
        let rect = RectInput::from(source.rect).offset(dx, dy);
        let mask = match (&source.mask, source.kind()) {
            (Some(mask), RoiKind::Image) => mask.translated(dx, dy, self.image),
            _ => None,
        };
        let label = self.free_label(&source.label);
        self.create(RoiDraft {
            rect,
            config: RoiConfig::from(&source.action),
            label: Some(label),
            mask,
        })
    }

    /// Duplicate with the default offset
    pub fn duplicate_default(&mut self, id: RoiId) -> Result<Roi> {
        self.duplicate(id, defaults::DUPLICATE_OFFSET)
    }

    /// Revert the latest edit; `false` when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        let Some(edit) = self.log.take_undo() else {
            return false;
        };
        match edit {
            Edit::Create { roi, .. } => {
                self.rois.retain(|r| r.id != roi.id);
            }
            Edit::Delete { index, roi } => {
                let index = index.min(self.rois.len());
                self.rois.insert(index, roi);
            }
            Edit::Modify { index, before, .. } => self.replace_at(index, before),
        }
        true
    }

    /// Replay the latest undone edit; `false` when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        let Some(edit) = self.log.take_redo() else {
            return false;
        };
        match edit {
            Edit::Create { index, roi } => {
                let index = index.min(self.rois.len());
                self.rois.insert(index, roi);
            }
            Edit::Delete { roi, .. } => {
                self.rois.retain(|r| r.id != roi.id);
            }
            Edit::Modify { index, after, .. } => self.replace_at(index, after),
        }
        true
    }

    /// Persisted records in creation order
    pub fn to_records(&self) -> Vec<RoiRecord> {
        self.rois.iter().map(Roi::to_record).collect()
    }

    pub fn to_document(&self) -> RoiDocument {
        RoiDocument {
            version: defaults::DOCUMENT_VERSION.to_string(),
            image: self.image,
            next_id: Some(self.next_id),
            rois: self.to_records(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_document())
            .map_err(|e| RoiError::format_with("failed to serialize ROI document", e))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: RoiDocument = serde_json::from_str(json)
            .map_err(|e| RoiError::format_with("malformed ROI document", e))?;
        Self::from_document(document)
    }

    pub fn from_document(document: RoiDocument) -> Result<Self> {
        let mut set = Self::from_records(document.image, document.rois)?;
        if let Some(next_id) = document.next_id {
            set.next_id = set.next_id.max(next_id);
        }
        Ok(set)
    }

    /// Rebuild a set from persisted records, validating every entry
    ///
    /// Unlike interactive edits, out-of-bounds rectangles are rejected rather
    /// than clamped. The edit log starts empty.
    pub fn from_records(image: ImageSize, records: Vec<RoiRecord>) -> Result<Self> {
        let mut set = Self::new(image);
        let mut seen = HashSet::new();
        for record in records {
            let id = record.id;
            if id.0 == 0 {
                return Err(RoiError::format("ROI id 0 is reserved"));
            }
            if !seen.insert(id) {
                return Err(RoiError::format(format!("duplicate ROI id {id}")));
            }
            let rect = Rect::new(record.rect.x, record.rect.y, record.rect.width, record.rect.height)
                .filter(|r| image.contains_rect(r))
                .ok_or_else(|| {
                    RoiError::format(format!("ROI {id} rectangle is empty or outside the image"))
                })?;
            if record.kind != record.action.kind() {
                return Err(RoiError::format(format!(
                    "ROI {id} is typed {} but carries a {} action",
                    record.kind,
                    record.action.name()
                )));
            }
            let config = RoiConfig::from(&record.action);
            let roi = set
                .build(id, Some(&record.label), rect.into(), &config, record.mask_ref)
                .map_err(|e| RoiError::format(format!("ROI {id}: {e}")))?;
            set.rois.push(roi);
            set.next_id = set.next_id.max(id.0 + 1);
        }
        debug!(count = set.rois.len(), "roi set imported");
        Ok(set)
    }

    fn build(
        &self,
        id: RoiId,
        label: Option<&str>,
        rect: RectInput,
        config: &RoiConfig,
        mask: Option<Mask>,
    ) -> Result<Roi> {
        let rect = rect
            .clamp_to(self.image)
            .ok_or_else(|| RoiError::validation("rectangle has no area inside the image"))?;
        let action = config.validate()?;
        let mask = match (action.kind(), mask) {
            (RoiKind::Image, Some(mask)) => Some(
                mask.clipped(&rect)
                    .ok_or_else(|| RoiError::validation("mask lies outside the rectangle"))?,
            ),
            _ => None,
        };
        let label = match label.map(str::trim) {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => default_label(id),
        };
        Ok(Roi {
            id,
            label,
            rect,
            mask,
            action,
        })
    }

    fn index_of(&self, id: RoiId) -> Result<usize> {
        self.rois
            .iter()
            .position(|r| r.id == id)
            .ok_or(RoiError::UnknownRoi { id })
    }

    fn replace_at(&mut self, index: usize, roi: Roi) {
        if let Some(slot) = self.rois.iter_mut().find(|r| r.id == roi.id) {
            *slot = roi;
        } else {
            let index = index.min(self.rois.len());
            self.rois.insert(index, roi);
        }
    }

    fn free_label(&self, base: &str) -> String {
        let taken: HashSet<&str> = self.rois.iter().map(|r| r.label.as_str()).collect();
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Label given to ROIs created without one
pub fn default_label(id: RoiId) -> String {
    format!("roi_{:03}", id.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::roi::{
        ClickMode, ImageActionKind, RegionActionKind, RoiAction, SwipeDirection,
    };

    fn set() -> RoiSet {
        RoiSet::new(ImageSize::new(800, 600))
    }

    fn image_draft(x: i64, y: i64) -> RoiDraft {
        RoiDraft::new(
            RectInput::new(x, y, 100, 50),
            RoiConfig::image(ImageActionKind::Detect),
        )
    }

    #[test]
    fn test_create_assigns_monotonic_ids_and_default_labels() {
        let mut rois = set();
        let a = rois.create(image_draft(10, 10)).unwrap();
        let b = rois.create(image_draft(200, 10).with_label("ok_button")).unwrap();
        assert_eq!(a.id(), RoiId(1));
        assert_eq!(a.label(), "roi_001");
        assert_eq!(b.id(), RoiId(2));
        assert_eq!(b.label(), "ok_button");
    }

    #[test]
    fn test_create_clamps_rect() {
        let mut rois = set();
        let roi = rois
            .create(RoiDraft::new(
                RectInput::new(-20, 580, 100, 100),
                RoiConfig::image(ImageActionKind::Detect),
            ))
            .unwrap();
        assert_eq!(roi.rect(), Rect::new(0, 580, 80, 20).unwrap());
    }

    #[test]
    fn test_swipe_without_direction_adds_nothing() {
        let mut rois = set();
        let draft = RoiDraft::new(RectInput::new(0, 0, 10, 10), RoiConfig::swipe(None, 400));
        assert!(matches!(
            rois.create(draft),
            Err(RoiError::Validation { .. })
        ));
        assert!(rois.is_empty());
        assert!(!rois.history().can_undo());
    }

    #[test]
    fn test_region_type_drops_mask() {
        let mut rois = set();
        let mask = Mask::full(Rect::new(0, 0, 10, 10).unwrap());
        let roi = rois
            .create(
                RoiDraft::new(
                    RectInput::new(0, 0, 10, 10),
                    RoiConfig::click(ClickMode::Single, 1, 500),
                )
                .with_mask(Some(mask)),
            )
            .unwrap();
        assert!(roi.mask().is_none());
    }

    #[test]
    fn test_mask_outside_rect_rejected() {
        let mut rois = set();
        let mask = Mask::full(Rect::new(300, 300, 10, 10).unwrap());
        let result = rois.create(image_draft(0, 0).with_mask(Some(mask)));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejected_patch_leaves_roi_unchanged() {
        let mut rois = set();
        let roi = rois.create(image_draft(10, 10)).unwrap();
        let patch = RoiPatch {
            config: Some(RoiConfig {
                kind: RoiKind::Region,
                action: Some(RegionActionKind::Swipe),
                ..RoiConfig::default()
            }),
            label: Some("renamed".into()),
            ..RoiPatch::default()
        };
        match rois.update(roi.id(), patch.clone()) {
            Err(RoiError::PatchRejected { id, patch: rejected, .. }) => {
                assert_eq!(id, roi.id());
                assert_eq!(*rejected, patch);
            }
            other => panic!("expected rejected patch, got {other:?}"),
        }
        assert_eq!(rois.get(roi.id()), Some(&roi));
        assert_eq!(rois.history().len(), 1);
    }

    #[test]
    fn test_update_switches_type_and_drops_mask() {
        let mut rois = set();
        let mask = Mask::full(Rect::new(20, 20, 10, 10).unwrap());
        let roi = rois.create(image_draft(10, 10).with_mask(Some(mask))).unwrap();
        assert!(roi.mask().is_some());
        let updated = rois
            .update(
                roi.id(),
                RoiPatch::config(RoiConfig::swipe(Some(SwipeDirection::Up), 600)),
            )
            .unwrap();
        assert!(updated.mask().is_none());
        assert_eq!(
            updated.action(),
            &RoiAction::Swipe {
                direction: SwipeDirection::Up,
                speed: 600
            }
        );
    }

    #[test]
    fn test_noop_update_not_logged() {
        let mut rois = set();
        let roi = rois.create(image_draft(10, 10)).unwrap();
        rois.update(roi.id(), RoiPatch::label(roi.label())).unwrap();
        assert_eq!(rois.history().len(), 1);
    }

    #[test]
    fn test_delete_then_undo_restores_order() {
        let mut rois = set();
        let a = rois.create(image_draft(10, 10)).unwrap();
        let b = rois.create(image_draft(200, 10)).unwrap();
        let before = rois.clone();
        rois.delete(a.id()).unwrap();
        assert_eq!(rois.len(), 1);
        assert!(rois.undo());
        assert_eq!(rois, before);
        let ids: Vec<_> = rois.iter().map(Roi::id).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }

    #[test]
    fn test_redo_cleared_by_new_edit() {
        let mut rois = set();
        rois.create(image_draft(10, 10)).unwrap();
        assert!(rois.undo());
        assert!(rois.history().can_redo());
        rois.create(image_draft(50, 50)).unwrap();
        assert!(!rois.redo());
        // ids are not reused after undo
        assert_eq!(rois.as_slice()[0].id(), RoiId(2));
    }

    #[test]
    fn test_undo_redo_modify() {
        let mut rois = set();
        let roi = rois.create(image_draft(10, 10)).unwrap();
        rois.update(roi.id(), RoiPatch::label("play")).unwrap();
        assert!(rois.undo());
        assert_eq!(rois.get(roi.id()).unwrap().label(), "roi_001");
        assert!(rois.redo());
        assert_eq!(rois.get(roi.id()).unwrap().label(), "play");
    }

    #[test]
    fn test_duplicate_offsets_and_suffixes_label() {
        let mut rois = set();
        let roi = rois.create(image_draft(10, 10).with_label("coin")).unwrap();
        let first = rois.duplicate_default(roi.id()).unwrap();
        let second = rois.duplicate_default(roi.id()).unwrap();
        assert_eq!(first.rect(), Rect::new(30, 30, 100, 50).unwrap());
        assert_eq!(first.label(), "coin_1");
        assert_eq!(second.label(), "coin_2");
        assert_eq!(second.id(), RoiId(3));
    }

    #[test]
    fn test_duplicate_clamps_at_edge() {
        let mut rois = set();
        let roi = rois
            .create(RoiDraft::new(
                RectInput::new(750, 560, 50, 20),
                RoiConfig::image(ImageActionKind::Detect),
            ))
            .unwrap();
        let copy = rois.duplicate_default(roi.id()).unwrap();
        assert_eq!(copy.rect(), Rect::new(770, 580, 30, 20).unwrap());

        let corner = rois
            .create(RoiDraft::new(
                RectInput::new(790, 590, 10, 10),
                RoiConfig::image(ImageActionKind::Detect),
            ))
            .unwrap();
        assert!(rois.duplicate_default(corner.id()).is_err());
    }

    #[test]
    fn test_find_at_prefers_latest() {
        let mut rois = set();
        rois.create(image_draft(0, 0)).unwrap();
        let top = rois.create(image_draft(50, 20)).unwrap();
        assert_eq!(rois.find_at(Point::new(60, 30)).map(Roi::id), Some(top.id()));
        assert!(rois.find_at(Point::new(700, 500)).is_none());
    }

    #[test]
    fn test_document_round_trip() {
        let mut rois = set();
        let mask = Mask::from_predicate(Rect::new(10, 10, 100, 50).unwrap(), |x, y| {
            (x + y) % 3 != 0
        });
        rois.create(image_draft(10, 10).with_mask(mask)).unwrap();
        rois.create(RoiDraft::new(
            RectInput::new(300, 300, 40, 40),
            RoiConfig::ocr(Some("chi_sim".into()), None),
        ))
        .unwrap();
        let deleted = rois.create(image_draft(500, 500)).unwrap();
        rois.delete(deleted.id()).unwrap();

        let json = rois.to_json().unwrap();
        let restored = RoiSet::from_json(&json).unwrap();
        assert_eq!(restored, rois);
    }

    #[test]
    fn test_import_rejects_bad_entries() {
        let size = ImageSize::new(100, 100);
        let doc = |rois: &str| {
            format!(r#"{{"version":"1.0.0","image":{{"width":100,"height":100}},"rois":{rois}}}"#)
        };
        let out_of_bounds = doc(
            r#"[{"id":1,"label":"a","type":"image","rect":{"x":90,"y":0,"w":20,"h":5},"action":{"kind":"detect"}}]"#,
        );
        assert!(matches!(
            RoiSet::from_json(&out_of_bounds),
            Err(RoiError::Format { .. })
        ));

        let mismatched = doc(
            r#"[{"id":1,"label":"a","type":"image","rect":{"x":0,"y":0,"w":20,"h":5},"action":{"kind":"ocr"}}]"#,
        );
        assert!(RoiSet::from_json(&mismatched).is_err());

        let duplicated = doc(
            r#"[{"id":4,"label":"a","type":"image","rect":{"x":0,"y":0,"w":5,"h":5},"action":{"kind":"detect"}},
                {"id":4,"label":"b","type":"image","rect":{"x":0,"y":0,"w":5,"h":5},"action":{"kind":"detect"}}]"#,
        );
        assert!(RoiSet::from_json(&duplicated).is_err());

        let good = doc(
            r#"[{"id":7,"label":"a","type":"region","rect":{"x":0,"y":0,"w":5,"h":5},"action":{"kind":"click","mode":"single","count":1,"interval_ms":500}}]"#,
        );
        let overflowing_mask = doc(
            r#"[{"id":1,"label":"a","type":"image","rect":{"x":0,"y":0,"w":5,"h":5},"action":{"kind":"detect"},
                "maskRef":{"encoding":"rle","x":4294967295,"y":0,"w":3,"h":1,"counts":[1,2]}}]"#,
        );
        assert!(matches!(
            RoiSet::from_json(&overflowing_mask),
            Err(RoiError::Format { .. })
        ));

        let mut set = RoiSet::from_json(&good).unwrap();
        assert_eq!(set.image_size(), size);
        let next = set.create(image_draft(0, 0)).unwrap();
        assert_eq!(next.id(), RoiId(8));
    }
}
