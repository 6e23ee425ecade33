//! ROI records and their type-specific action configuration

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::{Point, Rect};
use super::mask::Mask;
use crate::constants::roi as defaults;
use crate::error::{Result, RoiError};

/// Session-unique ROI identifier, allocated monotonically from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoiId(pub u64);

impl fmt::Display for RoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an ROI is used for in the generated script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoiKind {
    /// A template image cropped from the screenshot
    #[default]
    Image,
    /// A screen area acted on by coordinates only
    Region,
}

impl fmt::Display for RoiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoiKind::Image => f.write_str("image"),
            RoiKind::Region => f.write_str("region"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    Single,
    Loop,
}

/// Finger travel direction of a swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    #[serde(alias = "bottom_to_top")]
    Up,
    #[serde(alias = "top_to_bottom")]
    Down,
    #[serde(alias = "right_to_left")]
    Left,
    #[serde(alias = "left_to_right")]
    Right,
}

/// Image-type action selector used in [`RoiConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageActionKind {
    Detect,
    DetectAndClick,
}

/// Region-type action selector used in [`RoiConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionActionKind {
    Click,
    Swipe,
    Ocr,
}

/// Validated action configuration, one variant per type/action pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoiAction {
    /// Check whether the template is on screen
    Detect,
    /// Find the template and click its centre
    DetectAndClick,
    Click {
        mode: ClickMode,
        count: u32,
        interval_ms: u32,
    },
    Swipe {
        direction: SwipeDirection,
        /// Pixels per second
        speed: u32,
    },
    Ocr {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
}

impl RoiAction {
    /// The ROI type this action belongs to
    pub fn kind(&self) -> RoiKind {
        match self {
            RoiAction::Detect | RoiAction::DetectAndClick => RoiKind::Image,
            RoiAction::Click { .. } | RoiAction::Swipe { .. } | RoiAction::Ocr { .. } => {
                RoiKind::Region
            }
        }
    }

    /// Short name used in logs and generated code comments
    pub fn name(&self) -> &'static str {
        match self {
            RoiAction::Detect => "detect",
            RoiAction::DetectAndClick => "detect_and_click",
            RoiAction::Click { .. } => "click",
            RoiAction::Swipe { .. } => "swipe",
            RoiAction::Ocr { .. } => "ocr",
        }
    }
}

/// Loosely-filled action form as supplied by an editing dialog
///
/// Fields not relevant to the chosen type/action must stay `None`;
/// [`RoiConfig::validate`] turns the form into a [`RoiAction`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    #[serde(rename = "type")]
    pub kind: RoiKind,
    pub image_action: Option<ImageActionKind>,
    pub action: Option<RegionActionKind>,
    pub click_mode: Option<ClickMode>,
    pub click_count: Option<u32>,
    pub click_interval_ms: Option<u32>,
    pub swipe_direction: Option<SwipeDirection>,
    pub swipe_speed: Option<u32>,
    pub ocr_language: Option<String>,
    pub ocr_hint: Option<String>,
}

impl RoiConfig {
    /// Image-type form
    pub fn image(action: ImageActionKind) -> Self {
        Self {
            kind: RoiKind::Image,
            image_action: Some(action),
            ..Self::default()
        }
    }

    /// Region click form
    pub fn click(mode: ClickMode, count: u32, interval_ms: u32) -> Self {
        Self {
            kind: RoiKind::Region,
            action: Some(RegionActionKind::Click),
            click_mode: Some(mode),
            click_count: Some(count),
            click_interval_ms: Some(interval_ms),
            ..Self::default()
        }
    }

    /// Region swipe form; a missing direction fails validation
    pub fn swipe(direction: Option<SwipeDirection>, speed: u32) -> Self {
        Self {
            kind: RoiKind::Region,
            action: Some(RegionActionKind::Swipe),
            swipe_direction: direction,
            swipe_speed: Some(speed),
            ..Self::default()
        }
    }

    /// Region OCR form
    pub fn ocr(language: Option<String>, hint: Option<String>) -> Self {
        Self {
            kind: RoiKind::Region,
            action: Some(RegionActionKind::Ocr),
            ocr_language: language,
            ocr_hint: hint,
            ..Self::default()
        }
    }

    /// Validate the form against its declared type and the per-action rules
    pub fn validate(&self) -> Result<RoiAction> {
        match self.kind {
            RoiKind::Image => {
                if self.action.is_some() {
                    return Err(RoiError::validation(
                        "image ROI cannot carry a region action",
                    ));
                }
                self.reject_click_fields("image")?;
                self.reject_swipe_fields("image")?;
                self.reject_ocr_fields("image")?;
                Ok(match self.image_action.unwrap_or(ImageActionKind::Detect) {
                    ImageActionKind::Detect => RoiAction::Detect,
                    ImageActionKind::DetectAndClick => RoiAction::DetectAndClick,
                })
            }
            RoiKind::Region => {
                if self.image_action.is_some() {
                    return Err(RoiError::validation(
                        "region ROI cannot carry an image action",
                    ));
                }
                let action = self
                    .action
                    .ok_or_else(|| RoiError::validation("region ROI requires an action"))?;
                match action {
                    RegionActionKind::Click => {
                        self.reject_swipe_fields("click")?;
                        self.reject_ocr_fields("click")?;
                        self.validate_click()
                    }
                    RegionActionKind::Swipe => {
                        self.reject_click_fields("swipe")?;
                        self.reject_ocr_fields("swipe")?;
                        self.validate_swipe()
                    }
                    RegionActionKind::Ocr => {
                        self.reject_click_fields("ocr")?;
                        self.reject_swipe_fields("ocr")?;
                        self.validate_ocr()
                    }
                }
            }
        }
    }

    fn validate_click(&self) -> Result<RoiAction> {
        let mode = self.click_mode.unwrap_or(ClickMode::Single);
        let count = self.click_count.unwrap_or(defaults::CLICK_COUNT);
        let interval_ms = self.click_interval_ms.unwrap_or(defaults::CLICK_INTERVAL_MS);
        if count == 0 {
            return Err(RoiError::validation("click count must be positive"));
        }
        if mode == ClickMode::Loop && interval_ms == 0 {
            return Err(RoiError::validation(
                "loop click requires a positive interval",
            ));
        }
        Ok(RoiAction::Click {
            mode,
            count,
            interval_ms,
        })
    }

    fn validate_swipe(&self) -> Result<RoiAction> {
        let direction = self
            .swipe_direction
            .ok_or_else(|| RoiError::validation("swipe requires a direction"))?;
        let speed = self.swipe_speed.unwrap_or(defaults::SWIPE_SPEED);
        if speed == 0 {
            return Err(RoiError::validation("swipe speed must be positive"));
        }
        Ok(RoiAction::Swipe { direction, speed })
    }

    fn validate_ocr(&self) -> Result<RoiAction> {
        let language = non_blank(&self.ocr_language, "ocr language")?;
        let hint = non_blank(&self.ocr_hint, "ocr hint")?;
        Ok(RoiAction::Ocr { language, hint })
    }

    fn reject_click_fields(&self, context: &str) -> Result<()> {
        if self.click_mode.is_some() || self.click_count.is_some() || self.click_interval_ms.is_some()
        {
            return Err(RoiError::validation(format!(
                "click settings are not allowed on a {context} ROI"
            )));
        }
        Ok(())
    }

    fn reject_swipe_fields(&self, context: &str) -> Result<()> {
        if self.swipe_direction.is_some() || self.swipe_speed.is_some() {
            return Err(RoiError::validation(format!(
                "swipe settings are not allowed on a {context} ROI"
            )));
        }
        Ok(())
    }

    fn reject_ocr_fields(&self, context: &str) -> Result<()> {
        if self.ocr_language.is_some() || self.ocr_hint.is_some() {
            return Err(RoiError::validation(format!(
                "ocr settings are not allowed on a {context} ROI"
            )));
        }
        Ok(())
    }
}

fn non_blank(value: &Option<String>, field: &str) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(RoiError::validation(format!("{field} must not be blank")))
        }
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

impl From<&RoiAction> for RoiConfig {
    fn from(action: &RoiAction) -> Self {
        match action {
            RoiAction::Detect => RoiConfig::image(ImageActionKind::Detect),
            RoiAction::DetectAndClick => RoiConfig::image(ImageActionKind::DetectAndClick),
            RoiAction::Click {
                mode,
                count,
                interval_ms,
            } => RoiConfig::click(*mode, *count, *interval_ms),
            RoiAction::Swipe { direction, speed } => RoiConfig::swipe(Some(*direction), *speed),
            RoiAction::Ocr { language, hint } => RoiConfig::ocr(language.clone(), hint.clone()),
        }
    }
}

/// A committed region of interest
///
/// Constructed only through [`crate::model::RoiSet`], which enforces the
/// bounds, mask and type/action invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roi {
    pub(crate) id: RoiId,
    pub(crate) label: String,
    pub(crate) rect: Rect,
    pub(crate) mask: Option<Mask>,
    pub(crate) action: RoiAction,
}

impl Roi {
    pub fn id(&self) -> RoiId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> RoiKind {
        self.action.kind()
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Alpha mask, only ever present on image-type ROIs
    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn action(&self) -> &RoiAction {
        &self.action
    }

    /// Extent of the rendered crop: the mask bounds when masked, else the rect
    pub fn crop_bounds(&self) -> Rect {
        self.mask.as_ref().map_or(self.rect, Mask::bounds)
    }

    pub fn contains(&self, point: Point) -> bool {
        self.rect.contains_point(point)
    }

    /// Persisted form of this ROI
    pub fn to_record(&self) -> RoiRecord {
        RoiRecord {
            id: self.id,
            label: self.label.clone(),
            kind: self.kind(),
            rect: self.rect,
            mask_ref: self.mask.clone(),
            asset: None,
            action: self.action.clone(),
        }
    }
}

/// Persisted JSON form of an ROI
///
/// `{id, label, type, rect:{x,y,w,h}, maskRef?, asset?, action:{kind, ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRecord {
    pub id: RoiId,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: RoiKind,
    pub rect: Rect,
    #[serde(rename = "maskRef", default, skip_serializing_if = "Option::is_none")]
    pub mask_ref: Option<Mask>,
    /// Crop file name, filled in by the export manager for image-type ROIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub action: RoiAction,
}
