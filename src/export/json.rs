//! JSON export of ROI records

use crate::error::{Result, RoiError};
use crate::model::RoiRecord;

/// Pretty-printed top-level array of records, in the given order
pub fn render_json(records: &[RoiRecord]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(records)
        .map_err(|e| RoiError::format_with("failed to serialize ROI records", e))?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ClickMode, ImageActionKind, ImageSize, RectInput, RoiConfig, RoiDraft, RoiSet,
    };
    use serde_json::Value;

    #[test]
    fn test_records_keep_creation_order_and_schema() {
        let mut set = RoiSet::new(ImageSize::new(320, 240));
        set.create(
            RoiDraft::new(RectInput::new(10, 20, 30, 40), RoiConfig::image(ImageActionKind::DetectAndClick))
                .with_label("start"),
        )
        .unwrap();
        set.create(RoiDraft::new(
            RectInput::new(100, 100, 50, 50),
            RoiConfig::click(ClickMode::Loop, 3, 200),
        ))
        .unwrap();
        let mut records = set.to_records();
        records[0].asset = Some("start.png".into());

        let value: Value = serde_json::from_str(&render_json(&records).unwrap()).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["id"], 1);
        assert_eq!(entries[0]["type"], "image");
        assert_eq!(entries[0]["rect"]["w"], 30);
        assert_eq!(entries[0]["asset"], "start.png");
        assert_eq!(entries[0]["action"]["kind"], "detect_and_click");
        assert_eq!(entries[1]["type"], "region");
        assert_eq!(entries[1]["action"]["count"], 3);
        assert!(entries[1].get("asset").is_none());
        assert!(entries[1].get("maskRef").is_none());
    }
}
