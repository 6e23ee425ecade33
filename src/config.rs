//! Configuration structures for the roi_slicer engines and exporter.
//!
//! This module gathers all tunable parameters, organized per engine.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use roi_slicer::SlicerConfig;
//! use std::path::Path;
//!
//! // Load from file; omitted sections and fields keep their defaults
//! let config = SlicerConfig::from_json_file(Path::new("slicer.json"))?;
//!
//! // Or use defaults
//! let config = SlicerConfig::default();
//! # Ok::<(), roi_slicer::RoiError>(())
//! ```
//!
//! # Configuration Sections
//!
//! - [`AutoDetectParams`]: colour tolerance, area limits, connectivity, proposal overlap
//! - [`SuperpixelParams`]: SLIC atom size, compactness, merge threshold
//! - [`SmartParams`]: refinement passes, mixture size, seed handling
//! - [`RoiSettings`]: editing behaviour
//! - [`ExportConfig`]: output layout and script parameters

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::roi as roi_defaults;
use crate::detection::{AutoDetectParams, SmartParams, SuperpixelParams};
use crate::error::{Result, RoiError};
use crate::export::ExportConfig;

/// Complete configuration.
///
/// Can be serialized to/from JSON; partial files are completed with defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerConfig {
    /// Seed-point detection
    pub auto_detect: AutoDetectParams,

    /// Superpixel segmentation
    pub superpixel: SuperpixelParams,

    /// Foreground refinement
    pub smart: SmartParams,

    /// ROI editing
    pub roi: RoiSettings,

    /// Export layout
    pub export: ExportConfig,
}

/// ROI editing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiSettings {
    /// Offset applied by duplicate, in pixels
    pub duplicate_offset: (i64, i64),

    /// Pointer travel under which a press/release pair counts as a click
    pub click_slop_px: i64,
}

impl Default for RoiSettings {
    fn default() -> Self {
        Self {
            duplicate_offset: roi_defaults::DUPLICATE_OFFSET,
            click_slop_px: roi_defaults::CLICK_SLOP_PX,
        }
    }
}

impl SlicerConfig {
    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RoiError::config(format!("cannot read {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RoiError::config(format!("cannot parse {}", path.display()), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RoiError::config("cannot serialize configuration", e))?;
        std::fs::write(path, json)
            .map_err(|e| RoiError::config(format!("cannot write {}", path.display()), e))?;
        Ok(())
    }

    /// Check value ranges the engines rely on
    pub fn validate(&self) -> Result<()> {
        let a = &self.auto_detect;
        if !a.tolerance.is_finite() || a.tolerance < 0.0 {
            return Err(RoiError::invalid_parameter("auto_detect.tolerance", a.tolerance));
        }
        if !(0.0..=1.0).contains(&a.max_area_ratio) {
            return Err(RoiError::invalid_parameter(
                "auto_detect.max_area_ratio",
                a.max_area_ratio,
            ));
        }
        if !(0.0..=1.0).contains(&a.merge_iou) {
            return Err(RoiError::invalid_parameter("auto_detect.merge_iou", a.merge_iou));
        }
        let s = &self.superpixel;
        if s.region_size == 0 || s.region_count == Some(0) {
            return Err(RoiError::invalid_parameter("superpixel.region_size", s.region_size));
        }
        if !s.compactness.is_finite() || s.compactness <= 0.0 {
            return Err(RoiError::invalid_parameter("superpixel.compactness", s.compactness));
        }
        if self.smart.components == 0 {
            return Err(RoiError::invalid_parameter("smart.components", 0));
        }
        if !(0.0..=1.0).contains(&self.export.match_threshold) {
            return Err(RoiError::invalid_parameter(
                "export.match_threshold",
                self.export.match_threshold,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SlicerConfig =
            serde_json::from_str(r#"{"auto_detect": {"tolerance": 12.5}, "export": {"file_prefix": "btn_"}}"#)
                .unwrap();
        assert_eq!(config.auto_detect.tolerance, 12.5);
        assert_eq!(config.auto_detect.min_area, 20);
        assert_eq!(config.export.file_prefix, "btn_");
        assert_eq!(config.export.json_file, "roi_data.json");
        assert_eq!(config.smart, SmartParams::default());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slicer.json");
        let mut config = SlicerConfig::default();
        config.superpixel.region_count = Some(250);
        config.to_json_file(&path).unwrap();
        assert_eq!(SlicerConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = SlicerConfig::default();
        config.superpixel.compactness = 0.0;
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SlicerConfig::from_json_file(&path),
            Err(RoiError::Config { .. })
        ));
    }
}
