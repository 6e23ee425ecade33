//! Interactive editing session for one screenshot at a time
//!
//! Routes pointer events to the engine selected by the explicit mode, holds
//! the pending candidate, the ROI set with its undo log and the per-image
//! superpixel cache.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::SlicerConfig;
use crate::detection::{
    AutoDetector, SegmentationMap, Selection, SmartSeed, SmartSegmenter, SuperpixelParams,
    SuperpixelSegmenter,
};
use crate::error::{Result, RoiError};
use crate::export::{ExportManager, ExportReport, SnippetFormat};
use crate::image_loader::{ImageId, SourceImage};
use crate::model::{
    CandidateRegion, Point, RectInput, Roi, RoiConfig, RoiId, RoiPatch, RoiSet,
};

/// Which engine pointer events are routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    /// Drag a rectangle
    #[default]
    Manual,
    /// Click a uniformly coloured element
    AutoDetect,
    /// Click atoms to grow or shrink a selection
    Superpixel,
    /// Drag a box or click a point to extract the foreground
    Smart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// Superpixel precompute running on its own thread
#[derive(Debug)]
pub struct PrecomputeJob {
    image_id: ImageId,
    cancel: CancelToken,
    handle: JoinHandle<Result<SegmentationMap>>,
}

impl PrecomputeJob {
    /// Start segmenting `image` in the background
    pub fn spawn(image: &SourceImage, params: SuperpixelParams) -> Self {
        let cancel = CancelToken::new();
        let pixels = image.shared_pixels();
        let token = cancel.clone();
        let target = params.region_count_for(image.size());
        let handle = thread::spawn(move || {
            let compactness = params.compactness;
            SuperpixelSegmenter::with_params(params).precompute(
                &pixels,
                target,
                compactness,
                &token,
            )
        });
        debug!(image = %image.id(), target, "superpixel precompute started");
        Self {
            image_id: image.id(),
            cancel,
            handle,
        }
    }

    pub fn image_id(&self) -> ImageId {
        self.image_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the result
    pub fn join(self) -> Result<(ImageId, SegmentationMap)> {
        let map = self
            .handle
            .join()
            .map_err(|_| RoiError::segmentation("superpixel worker panicked"))??;
        Ok((self.image_id, map))
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: Point,
    current: Point,
    button: PointerButton,
}

/// Core call surface used by a front end
#[derive(Debug)]
pub struct Session {
    config: SlicerConfig,
    auto: AutoDetector,
    superpixel: SuperpixelSegmenter,
    smart: SmartSegmenter,
    exporter: ExportManager,
    mode: InteractionMode,
    image: Option<SourceImage>,
    rois: Option<RoiSet>,
    candidate: Option<CandidateRegion>,
    drag: Option<Drag>,
    selection: Selection,
    segmentation: Option<(ImageId, Arc<SegmentationMap>)>,
    job: Option<PrecomputeJob>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SlicerConfig::default())
    }
}

impl Session {
    pub fn new(config: SlicerConfig) -> Self {
        Self {
            auto: AutoDetector::with_params(config.auto_detect.clone()),
            superpixel: SuperpixelSegmenter::with_params(config.superpixel.clone()),
            smart: SmartSegmenter::with_params(config.smart.clone()),
            exporter: ExportManager::with_config(config.export.clone()),
            config,
            mode: InteractionMode::default(),
            image: None,
            rois: None,
            candidate: None,
            drag: None,
            selection: Selection::new(),
            segmentation: None,
            job: None,
        }
    }

    pub fn config(&self) -> &SlicerConfig {
        &self.config
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn rois(&self) -> Option<&RoiSet> {
        self.rois.as_ref()
    }

    pub fn candidate(&self) -> Option<&CandidateRegion> {
        self.candidate.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Cached superpixel map of the current image, if computed
    pub fn segmentation(&self) -> Option<&SegmentationMap> {
        let current = self.image.as_ref()?.id();
        self.segmentation
            .as_ref()
            .filter(|(id, _)| *id == current)
            .map(|(_, map)| map.as_ref())
    }

    /// Replace the current image
    ///
    /// Starts a fresh ROI set and undo log, cancels background work and
    /// evicts caches belonging to a different image.
    pub fn load_image(&mut self, image: SourceImage) {
        if let Some(job) = self.job.take() {
            job.cancel();
        }
        if self
            .segmentation
            .as_ref()
            .is_some_and(|(id, _)| *id != image.id())
        {
            debug!("segmentation cache evicted");
            self.segmentation = None;
        }
        info!(id = %image.id(), size = ?image.size(), "image loaded into session");
        self.rois = Some(RoiSet::new(image.size()));
        self.image = Some(image);
        self.reset_interaction();
    }

    /// Switch engines; any pending candidate is discarded
    pub fn set_mode(&mut self, mode: InteractionMode) {
        if mode != self.mode {
            debug!(?mode, "interaction mode changed");
        }
        self.mode = mode;
        self.reset_interaction();
    }

    pub fn pointer_down(&mut self, point: Point, button: PointerButton) -> Result<()> {
        self.current_image()?;
        self.drag = Some(Drag {
            start: point,
            current: point,
            button,
        });
        Ok(())
    }

    /// Track a drag; in manual mode the candidate follows the pointer
    pub fn pointer_drag(&mut self, point: Point) -> Result<()> {
        let size = self.current_image()?.size();
        let Some(drag) = self.drag.as_mut() else {
            return Ok(());
        };
        drag.current = point;
        if self.mode == InteractionMode::Manual {
            self.candidate = RectInput::from_corners(drag.start, point)
                .clamp_to(size)
                .map(CandidateRegion::rect);
        }
        Ok(())
    }

    /// Finish a press and run the engine of the current mode
    ///
    /// Returns the resulting candidate, `None` when the engine found nothing.
    pub fn pointer_up(
        &mut self,
        point: Point,
        button: PointerButton,
    ) -> Result<Option<CandidateRegion>> {
        let image = self.current_image()?.clone();
        let start = self.drag.take().map_or(point, |d| d.start);
        let is_click = start.distance_max(point) <= self.config.roi.click_slop_px;

        if self.mode == InteractionMode::AutoDetect && !is_click {
            return Ok(self.candidate.clone());
        }
        self.candidate = None;

        let candidate = match self.mode {
            InteractionMode::Manual => RectInput::from_corners(start, point)
                .clamp_to(image.size())
                .filter(|_| !is_click)
                .map(CandidateRegion::rect),
            InteractionMode::AutoDetect => {
                let tolerance = self.config.auto_detect.tolerance;
                match button {
                    PointerButton::Primary => self.auto.detect(image.pixels(), point, tolerance)?,
                    PointerButton::Secondary => {
                        self.auto.detect_similar(image.pixels(), point, tolerance)?
                    }
                }
            }
            InteractionMode::Superpixel => {
                let map = self.ensure_segmentation()?;
                let atom = map.pick_atom(point);
                self.selection = match (button, atom) {
                    _ if !is_click => {
                        map.select_rect(&self.selection, RectInput::from_corners(start, point))
                    }
                    (PointerButton::Primary, Some(atom)) => map.grow_selection(
                        &self.selection,
                        atom,
                        self.config.superpixel.similarity_threshold,
                    ),
                    (PointerButton::Primary, None) => self.selection.clone(),
                    (PointerButton::Secondary, Some(atom)) if self.selection.contains(atom) => {
                        self.selection.remove_atom(atom)
                    }
                    (PointerButton::Secondary, _) => self.selection.shrink(),
                };
                map.to_candidate(&self.selection)
            }
            InteractionMode::Smart => {
                let seed = if is_click {
                    SmartSeed::Points(vec![point])
                } else {
                    SmartSeed::Rect(RectInput::from_corners(start, point))
                };
                let iterations = self.config.smart.iterations;
                Some(
                    self.smart
                        .refine(image.pixels(), &seed, iterations, &CancelToken::new())?,
                )
            }
        };

        debug!(mode = ?self.mode, found = candidate.is_some(), "pointer released");
        self.candidate = candidate.clone();
        Ok(candidate)
    }

    /// Propose every red dot, button and icon of the current image
    ///
    /// Proposals are returned without becoming the pending candidate; pick
    /// one with [`Session::set_candidate`].
    pub fn detect_all(&self) -> Result<Vec<CandidateRegion>> {
        let image = self.current_image()?;
        let proposals = self.auto.detect_all(image.pixels())?;
        info!(count = proposals.len(), "full-image detection");
        Ok(proposals)
    }

    /// Make `candidate` the pending candidate, replacing any other
    pub fn set_candidate(&mut self, candidate: CandidateRegion) -> Result<()> {
        self.current_image()?;
        self.candidate = Some(candidate);
        Ok(())
    }

    /// Commit the pending candidate as a new ROI
    ///
    /// On validation failure the candidate stays pending.
    pub fn commit_candidate(&mut self, config: RoiConfig, label: Option<String>) -> Result<Roi> {
        let candidate = self.candidate.take().ok_or(RoiError::NoCandidate)?;
        let rois = self.rois.as_mut().ok_or(RoiError::NoImageLoaded)?;
        match rois.create(candidate.clone().into_draft(config, label)) {
            Ok(roi) => {
                self.selection = Selection::new();
                Ok(roi)
            }
            Err(err) => {
                self.candidate = Some(candidate);
                Err(err)
            }
        }
    }

    /// Drop the pending candidate without a trace
    pub fn discard_candidate(&mut self) {
        self.candidate = None;
        self.selection = Selection::new();
    }

    pub fn update(&mut self, id: RoiId, patch: RoiPatch) -> Result<Roi> {
        self.rois_mut()?.update(id, patch)
    }

    pub fn delete(&mut self, id: RoiId) -> Result<Roi> {
        self.rois_mut()?.delete(id)
    }

    /// Duplicate with the configured offset
    pub fn duplicate(&mut self, id: RoiId) -> Result<Roi> {
        let offset = self.config.roi.duplicate_offset;
        self.rois_mut()?.duplicate(id, offset)
    }

    pub fn undo(&mut self) -> Result<bool> {
        Ok(self.rois_mut()?.undo())
    }

    pub fn redo(&mut self) -> Result<bool> {
        Ok(self.rois_mut()?.redo())
    }

    /// Replace the ROI set with a serialized document for the same image size
    pub fn import_rois(&mut self, json: &str) -> Result<()> {
        let size = self.current_image()?.size();
        let set = RoiSet::from_json(json)?;
        if set.image_size() != size {
            return Err(RoiError::format(format!(
                "document is for a {}x{} image, loaded image is {}x{}",
                set.image_size().width,
                set.image_size().height,
                size.width,
                size.height
            )));
        }
        self.rois = Some(set);
        Ok(())
    }

    /// Write crops, JSON and scripts for the current image
    pub fn export_all(&self, output_dir: &Path) -> Result<ExportReport> {
        let image = self.current_image()?;
        let rois = self.rois.as_ref().ok_or(RoiError::NoImageLoaded)?;
        self.exporter
            .export_bundle(image.pixels(), rois.as_slice(), output_dir)
    }

    /// Script preview for one ROI of the current set
    pub fn snippet(&self, id: RoiId, format: SnippetFormat) -> Result<String> {
        let rois = self.rois.as_ref().ok_or(RoiError::NoImageLoaded)?;
        self.exporter.snippet(rois.as_slice(), id, format)
    }

    /// Start computing superpixels off the interactive path
    pub fn start_precompute(&mut self) -> Result<()> {
        let image = self.current_image()?.clone();
        if self.segmentation().is_some()
            || self.job.as_ref().is_some_and(|j| j.image_id() == image.id())
        {
            return Ok(());
        }
        if let Some(job) = self.job.take() {
            job.cancel();
        }
        self.job = Some(PrecomputeJob::spawn(&image, self.config.superpixel.clone()));
        Ok(())
    }

    /// Collect a finished background job, if any; `true` when a map was installed
    pub fn poll_precompute(&mut self) -> Result<bool> {
        if !self.job.as_ref().is_some_and(PrecomputeJob::is_finished) {
            return Ok(false);
        }
        match self.job.take() {
            Some(job) => {
                let (id, map) = job.join()?;
                Ok(self.install_segmentation(id, map))
            }
            None => Ok(false),
        }
    }

    /// Accept a map computed for `image_id`; stale results are dropped
    pub fn install_segmentation(&mut self, image_id: ImageId, map: SegmentationMap) -> bool {
        let current = self.image.as_ref().map(SourceImage::id);
        if current != Some(image_id) {
            debug!(%image_id, "stale segmentation dropped");
            return false;
        }
        self.segmentation = Some((image_id, Arc::new(map)));
        true
    }

    /// Cached map for the current image, computing it now if needed
    pub fn ensure_segmentation(&mut self) -> Result<Arc<SegmentationMap>> {
        let image = self.current_image()?.clone();
        if let Some((id, map)) = &self.segmentation {
            if *id == image.id() {
                return Ok(Arc::clone(map));
            }
        }
        let map = match self.job.take() {
            Some(job) if job.image_id() == image.id() => job.join()?.1,
            other => {
                if let Some(job) = other {
                    job.cancel();
                }
                let params = self.superpixel.params();
                self.superpixel.precompute(
                    image.pixels(),
                    params.region_count_for(image.size()),
                    params.compactness,
                    &CancelToken::new(),
                )?
            }
        };
        let map = Arc::new(map);
        self.segmentation = Some((image.id(), Arc::clone(&map)));
        Ok(map)
    }

    fn current_image(&self) -> Result<&SourceImage> {
        self.image.as_ref().ok_or(RoiError::NoImageLoaded)
    }

    fn rois_mut(&mut self) -> Result<&mut RoiSet> {
        self.rois.as_mut().ok_or(RoiError::NoImageLoaded)
    }

    fn reset_interaction(&mut self) {
        self.candidate = None;
        self.drag = None;
        self.selection = Selection::new();
    }
}
