//! Writing export bundles to disk

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::{info, warn};

use super::{json, scripts, ExportConfig, SnippetFormat};
use crate::crop::CropEngine;
use crate::error::{Result, RoiError};
use crate::model::{Roi, RoiId, RoiKind, RoiRecord};

/// Artifact an export step produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportItem {
    Crop(RoiId),
    Json,
    Autojs,
    Python,
}

/// A failed export step; the other steps still ran
#[derive(Debug)]
pub struct ExportFailure {
    pub item: ExportItem,
    pub error: RoiError,
}

/// Outcome of [`ExportManager::export_bundle`]
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, item: ExportItem, outcome: Result<PathBuf>) {
        match outcome {
            Ok(path) => self.written.push(path),
            Err(error) => {
                warn!(?item, %error, "export step failed");
                self.failures.push(ExportFailure { item, error });
            }
        }
    }
}

/// Aggregates the ROIs of one image into JSON, scripts and PNG crops
#[derive(Debug, Clone, Default)]
pub struct ExportManager {
    config: ExportConfig,
    crops: CropEngine,
}

impl ExportManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExportConfig) -> Self {
        let crops = CropEngine::with_prefix(config.file_prefix.clone());
        Self { config, crops }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Records in creation order with crop file names filled in
    pub fn records(&self, rois: &[Roi]) -> Vec<RoiRecord> {
        let image_rois: Vec<Roi> = rois
            .iter()
            .filter(|r| r.kind() == RoiKind::Image)
            .cloned()
            .collect();
        let mut names = self.crops.file_names(&image_rois).into_iter();
        rois.iter()
            .map(|roi| {
                let mut record = roi.to_record();
                if roi.kind() == RoiKind::Image {
                    record.asset = names.next();
                }
                record
            })
            .collect()
    }

    /// JSON document text
    pub fn render_json(&self, rois: &[Roi]) -> Result<String> {
        json::render_json(&self.records(rois))
    }

    pub fn render_autojs(&self, rois: &[Roi]) -> String {
        scripts::render_autojs(&self.records(rois), &self.config.script_options())
    }

    pub fn render_python(&self, rois: &[Roi]) -> String {
        scripts::render_python(&self.records(rois), &self.config.script_options())
    }

    /// Preview of the script block for ROI `id`, named as a full export names it
    ///
    /// # Errors
    ///
    /// Returns `RoiError::UnknownRoi` if no ROI in `rois` has `id`.
    pub fn snippet(&self, rois: &[Roi], id: RoiId, format: SnippetFormat) -> Result<String> {
        let record = self
            .records(rois)
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(RoiError::UnknownRoi { id })?;
        Ok(scripts::snippet(&record, format, &self.config.script_options()))
    }

    /// Write the full bundle for `rois` into `output_dir`
    ///
    /// # Errors
    ///
    /// Only a failure to create `output_dir` aborts; every other failure is
    /// collected in the returned report.
    pub fn export_bundle(
        &self,
        image: &RgbImage,
        rois: &[Roi],
        output_dir: &Path,
    ) -> Result<ExportReport> {
        fs::create_dir_all(output_dir).map_err(|e| RoiError::export_io(output_dir, e))?;
        let mut report = ExportReport::default();

        // Step 1: crops for image-type ROIs
        let image_rois: Vec<Roi> = rois
            .iter()
            .filter(|r| r.kind() == RoiKind::Image)
            .cloned()
            .collect();
        if !image_rois.is_empty() {
            let crop_dir = output_dir.join(&self.config.crop_dir);
            let dir_ready = fs::create_dir_all(&crop_dir);
            for item in self.crops.render_all(image, &image_rois) {
                let path = crop_dir.join(&item.file_name);
                let outcome = match (&dir_ready, item.raster) {
                    (Err(e), _) => Err(RoiError::export_io(
                        &crop_dir,
                        std::io::Error::new(e.kind(), e.to_string()),
                    )),
                    (Ok(()), Err(e)) => Err(e),
                    (Ok(()), Ok(raster)) => raster
                        .save_with_format(&path, ImageFormat::Png)
                        .map(|_| path.clone())
                        .map_err(|source| RoiError::ImageEncode {
                            path: path.clone(),
                            source,
                        }),
                };
                report.record(ExportItem::Crop(item.id), outcome);
            }
        }

        // Step 2: text artifacts
        let records = self.records(rois);
        let options = self.config.script_options();
        let json_path = output_dir.join(&self.config.json_file);
        let json_outcome =
            json::render_json(&records).and_then(|text| write_text(&json_path, &text));
        report.record(ExportItem::Json, json_outcome);

        let autojs_path = output_dir.join(&self.config.autojs_file);
        let autojs = scripts::render_autojs(&records, &options);
        report.record(ExportItem::Autojs, write_text(&autojs_path, &autojs));

        let python_path = output_dir.join(&self.config.python_file);
        let python = scripts::render_python(&records, &options);
        report.record(ExportItem::Python, write_text(&python_path, &python));

        info!(
            dir = %output_dir.display(),
            rois = rois.len(),
            written = report.written.len(),
            failed = report.failures.len(),
            "export finished"
        );
        Ok(report)
    }
}

fn write_text(path: &Path, text: &str) -> Result<PathBuf> {
    fs::write(path, text).map_err(|e| RoiError::export_io(path, e))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ClickMode, ImageActionKind, ImageSize, RectInput, RoiConfig, RoiDraft, RoiSet,
    };
    use image::Rgb;

    fn fixture() -> (RgbImage, RoiSet) {
        let image = RgbImage::from_fn(120, 80, |x, y| Rgb([x as u8, y as u8, 50]));
        let mut set = RoiSet::new(ImageSize::new(120, 80));
        set.create(
            RoiDraft::new(RectInput::new(5, 5, 20, 10), RoiConfig::image(ImageActionKind::Detect))
                .with_label("logo"),
        )
        .unwrap();
        set.create(RoiDraft::new(
            RectInput::new(50, 50, 10, 10),
            RoiConfig::click(ClickMode::Single, 1, 500),
        ))
        .unwrap();
        (image, set)
    }

    #[test]
    fn test_bundle_writes_all_artifacts() {
        let (image, set) = fixture();
        let dir = tempfile::tempdir().unwrap();
        let report = ExportManager::new()
            .export_bundle(&image, set.as_slice(), dir.path())
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.written.len(), 4);

        let crop = image::open(dir.path().join("res").join("logo.png")).unwrap();
        assert_eq!((crop.width(), crop.height()), (20, 10));
        assert!(dir.path().join("roi_data.json").exists());
        assert!(dir.path().join("auto_script.js").exists());
        assert!(dir.path().join("auto_script.py").exists());
    }

    #[test]
    fn test_region_rois_have_no_asset() {
        let (_, set) = fixture();
        let records = ExportManager::new().records(set.as_slice());
        assert_eq!(records[0].asset.as_deref(), Some("logo.png"));
        assert_eq!(records[1].asset, None);
    }

    #[test]
    fn test_snippet_uses_export_crop_names() {
        let (_, mut set) = fixture();
        let twin = set
            .create(
                RoiDraft::new(RectInput::new(60, 5, 20, 10), RoiConfig::image(ImageActionKind::Detect))
                    .with_label("logo"),
            )
            .unwrap();
        let manager = ExportManager::with_config(ExportConfig {
            file_prefix: "btn_".into(),
            ..ExportConfig::default()
        });
        let asset = manager.records(set.as_slice())[2].asset.clone().unwrap();
        assert!(asset.starts_with("btn_logo"));
        assert_ne!(asset, "btn_logo.png");

        let js = manager
            .snippet(set.as_slice(), twin.id(), SnippetFormat::Autojs)
            .unwrap();
        assert!(js.contains(&format!("images.read(\"./res/{asset}\")")));
        assert!(matches!(
            manager.snippet(set.as_slice(), RoiId(99), SnippetFormat::Raw),
            Err(RoiError::UnknownRoi { .. })
        ));
    }

    #[test]
    fn test_repeated_export_is_byte_identical() {
        let (image, set) = fixture();
        let manager = ExportManager::new();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        manager.export_bundle(&image, set.as_slice(), first.path()).unwrap();
        manager.export_bundle(&image, set.as_slice(), second.path()).unwrap();
        for file in ["roi_data.json", "auto_script.js", "auto_script.py"] {
            let a = fs::read(first.path().join(file)).unwrap();
            let b = fs::read(second.path().join(file)).unwrap();
            assert_eq!(a, b, "{file} differs");
        }
    }

    #[test]
    fn test_failed_crop_does_not_abort_export() {
        let (_, set) = fixture();
        let small = RgbImage::new(10, 10);
        let dir = tempfile::tempdir().unwrap();
        let report = ExportManager::new()
            .export_bundle(&small, set.as_slice(), dir.path())
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item, ExportItem::Crop(set.as_slice()[0].id()));
        assert!(dir.path().join("roi_data.json").exists());
    }

    #[test]
    fn test_unwritable_output_dir_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, b"file").unwrap();
        let (image, set) = fixture();
        let result = ExportManager::new().export_bundle(&image, set.as_slice(), &blocker.join("out"));
        assert!(matches!(result, Err(RoiError::ExportIo { .. })));
    }
}
