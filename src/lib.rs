//! # ROI Slicer
//!
//! A Rust crate for marking regions of interest on screenshots and exporting
//! them as an automation dataset.
//!
//! This library turns coarse pointer input into precise regions by:
//! - Flood-filling uniformly coloured UI elements from a seed point
//! - Precomputing SLIC superpixels and growing selections atom by atom
//! - Refining a drag box or a click into a foreground mask
//! - Validating ROI records with undo/redo editing
//! - Exporting PNG crops, a JSON dataset and Auto.js/Python scripts
//!
//! ## Example
//!
//! ```rust,no_run
//! use roi_slicer::{load_image, AutoDetector, ExportManager, Point, RoiConfig, RoiSet};
//! use roi_slicer::model::ImageActionKind;
//! use std::path::Path;
//!
//! let image = load_image(Path::new("screen.png"))?;
//! let mut rois = RoiSet::new(image.size());
//!
//! if let Some(candidate) = AutoDetector::new().detect(image.pixels(), Point::new(120, 40), 30.0)? {
//!     let config = RoiConfig::image(ImageActionKind::DetectAndClick);
//!     rois.create(candidate.into_draft(config, Some("start".into())))?;
//! }
//!
//! let report = ExportManager::new().export_bundle(image.pixels(), rois.as_slice(), Path::new("out"))?;
//! println!("{} files written", report.written.len());
//! # Ok::<(), roi_slicer::RoiError>(())
//! ```

pub mod cancel;
pub mod color;
pub mod config;
pub mod constants;
pub mod crop;
pub mod detection;
pub mod error;
pub mod export;
pub mod image_loader;
pub mod model;
pub mod session;

pub use cancel::CancelToken;
pub use config::{RoiSettings, SlicerConfig};
pub use crop::{CropEngine, CropItem};
pub use detection::{
    AutoDetector, SegmentationMap, Selection, SmartSeed, SmartSegmenter, SuperpixelSegmenter,
};
pub use error::{Result, RoiError};
pub use export::{ExportConfig, ExportManager, ExportReport, SnippetFormat};
pub use image_loader::{load_from_memory, load_image, ImageId, SourceImage};
pub use model::{
    CandidateRegion, ImageSize, Mask, Point, Rect, RectInput, Roi, RoiAction, RoiConfig, RoiId,
    RoiKind, RoiPatch, RoiRecord, RoiSet,
};
pub use session::{InteractionMode, PointerButton, PrecomputeJob, Session};
