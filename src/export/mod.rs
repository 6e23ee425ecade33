//! Export of ROI sets: JSON document, automation scripts and PNG crops
//!
//! The text generators are pure functions of the record list, so exporting
//! an unchanged set twice yields byte-identical files.

pub mod json;
pub mod manager;
pub mod scripts;

use serde::{Deserialize, Serialize};

use crate::constants::export as defaults;

pub use json::render_json;
pub use manager::{ExportFailure, ExportItem, ExportManager, ExportReport};
pub use scripts::{render_autojs, render_python, snippet, ScriptOptions, SnippetFormat};

/// File layout and script parameters of an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
    pub json_file: String,
    pub autojs_file: String,
    pub python_file: String,
    /// Subdirectory of the output directory receiving the PNG crops
    pub crop_dir: String,
    /// Prefix prepended to every crop file name
    pub file_prefix: String,
    /// Asset directory the generated scripts read crops from; `./<crop_dir>/` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_dir: Option<String>,
    pub match_threshold: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::OUTPUT_DIR.to_string(),
            json_file: defaults::JSON_FILE.to_string(),
            autojs_file: defaults::AUTOJS_FILE.to_string(),
            python_file: defaults::PYTHON_FILE.to_string(),
            crop_dir: defaults::CROP_DIR.to_string(),
            file_prefix: String::new(),
            asset_dir: None,
            match_threshold: defaults::MATCH_THRESHOLD,
        }
    }
}

impl ExportConfig {
    /// Directory prefix scripts put in front of crop file names
    pub fn asset_dir(&self) -> String {
        self.asset_dir
            .clone()
            .unwrap_or_else(|| format!("./{}/", self.crop_dir))
    }

    pub fn script_options(&self) -> ScriptOptions {
        ScriptOptions {
            asset_dir: self.asset_dir(),
            match_threshold: self.match_threshold,
        }
    }
}
