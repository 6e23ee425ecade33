//! Auto.js and Python script generation
//!
//! One function per ROI named `roi_<id>`, so every label is usable; labels
//! only appear inside quoted string literals and comments.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::model::{ClickMode, Rect, RoiAction, RoiRecord, SwipeDirection};

/// Parameters embedded in generated scripts
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    pub asset_dir: String,
    pub match_threshold: f32,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        super::ExportConfig::default().script_options()
    }
}

/// Target of a single-ROI preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetFormat {
    #[default]
    Autojs,
    Python,
    /// One-line geometry summary
    Raw,
}

/// String literal valid in both JavaScript and Python
///
/// JSON leaves U+2028 and U+2029 raw, but JavaScript ends a `//` comment
/// at either, so both are escaped as well.
fn quote(text: &str) -> String {
    serde_json::to_string(text)
        .unwrap_or_else(|_| format!("{text:?}"))
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

// Start and end points of a swipe across `rect`, plus duration in ms.
fn swipe_path(rect: &Rect, direction: SwipeDirection, speed: u32) -> ((u32, u32), (u32, u32), u32) {
    let (cx, cy) = rect.center();
    let (left, top) = (rect.x, rect.y);
    let right = rect.x + rect.width - 1;
    let bottom = rect.y + rect.height - 1;
    let (from, to) = match direction {
        SwipeDirection::Up => ((cx, bottom), (cx, top)),
        SwipeDirection::Down => ((cx, top), (cx, bottom)),
        SwipeDirection::Left => ((right, cy), (left, cy)),
        SwipeDirection::Right => ((left, cy), (right, cy)),
    };
    let distance = from.0.abs_diff(to.0) + from.1.abs_diff(to.1);
    let duration = (distance as u64 * 1000 / speed.max(1) as u64).max(1) as u32;
    (from, to, duration)
}

fn asset_literal(options: &ScriptOptions, record: &RoiRecord) -> String {
    quote(&format!(
        "{}{}",
        options.asset_dir,
        record.asset.as_deref().unwrap_or_default()
    ))
}

fn autojs_block(out: &mut String, record: &RoiRecord, options: &ScriptOptions) {
    let r = &record.rect;
    let (cx, cy) = r.center();
    let _ = writeln!(out, "// {} ({})", quote(&record.label), record.action.name());
    let _ = writeln!(out, "function roi_{}() {{", record.id);
    match &record.action {
        RoiAction::Detect | RoiAction::DetectAndClick => {
            let _ = writeln!(
                out,
                "    var template = images.read({});",
                asset_literal(options, record)
            );
            let _ = writeln!(
                out,
                "    var found = images.findImage(captureScreen(), template, {{ threshold: MATCH_THRESHOLD }});"
            );
            let _ = writeln!(out, "    template.recycle();");
            if record.action == RoiAction::DetectAndClick {
                let _ = writeln!(out, "    if (found) {{");
                let _ = writeln!(
                    out,
                    "        click(found.x + {}, found.y + {});",
                    r.width / 2,
                    r.height / 2
                );
                let _ = writeln!(out, "    }}");
            }
            let _ = writeln!(out, "    return found;");
        }
        RoiAction::Click {
            mode,
            count,
            interval_ms,
        } => match mode {
            ClickMode::Single => {
                let _ = writeln!(out, "    click({cx}, {cy});");
                let _ = writeln!(out, "    return true;");
            }
            ClickMode::Loop => {
                let _ = writeln!(out, "    for (var i = 0; i < {count}; i++) {{");
                let _ = writeln!(out, "        click({cx}, {cy});");
                let _ = writeln!(out, "        sleep({interval_ms});");
                let _ = writeln!(out, "    }}");
                let _ = writeln!(out, "    return true;");
            }
        },
        RoiAction::Swipe { direction, speed } => {
            let ((x1, y1), (x2, y2), duration) = swipe_path(r, *direction, *speed);
            let _ = writeln!(out, "    return swipe({x1}, {y1}, {x2}, {y2}, {duration});");
        }
        RoiAction::Ocr { language, hint } => {
            if let Some(language) = language {
                let _ = writeln!(out, "    // language: {}", quote(language));
            }
            if let Some(hint) = hint {
                let _ = writeln!(out, "    // expected: {}", quote(hint));
            }
            let _ = writeln!(
                out,
                "    var clip = images.clip(captureScreen(), {}, {}, {}, {});",
                r.x, r.y, r.width, r.height
            );
            let _ = writeln!(out, "    var text = ocr.recognizeText(clip);");
            let _ = writeln!(out, "    clip.recycle();");
            let _ = writeln!(out, "    return text;");
        }
    }
    let _ = writeln!(out, "}}");
}

/// Auto.js script with one function per record and a run list in order
pub fn render_autojs(records: &[RoiRecord], options: &ScriptOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// Auto.js script generated by roi-slicer");
    let _ = writeln!(out, "var ASSET_DIR = {};", quote(&options.asset_dir));
    let _ = writeln!(out, "var MATCH_THRESHOLD = {};", options.match_threshold);
    let _ = writeln!(out);
    let _ = writeln!(out, "if (!requestScreenCapture()) {{");
    let _ = writeln!(out, "    toast(\"screen capture permission denied\");");
    let _ = writeln!(out, "    exit();");
    let _ = writeln!(out, "}}");
    for record in records {
        let _ = writeln!(out);
        autojs_block(&mut out, record, options);
    }
    let _ = writeln!(out);
    let steps: Vec<String> = records.iter().map(|r| format!("roi_{}", r.id)).collect();
    let _ = writeln!(out, "var ROUTINE = [{}];", steps.join(", "));
    let _ = writeln!(out, "ROUTINE.forEach(function (step) {{");
    let _ = writeln!(out, "    step();");
    let _ = writeln!(out, "}});");
    out
}

fn python_block(out: &mut String, record: &RoiRecord, options: &ScriptOptions) {
    let r = &record.rect;
    let (cx, cy) = r.center();
    let _ = writeln!(out, "def roi_{}(screen):", record.id);
    let _ = writeln!(out, "    # {} ({})", quote(&record.label), record.action.name());
    match &record.action {
        RoiAction::Detect | RoiAction::DetectAndClick => {
            let _ = writeln!(
                out,
                "    pos = match_template(screen, {}, MATCH_THRESHOLD)",
                asset_literal(options, record)
            );
            if record.action == RoiAction::DetectAndClick {
                let _ = writeln!(out, "    if pos is not None:");
                let _ = writeln!(
                    out,
                    "        click(pos[0] + {}, pos[1] + {})",
                    r.width / 2,
                    r.height / 2
                );
            }
            let _ = writeln!(out, "    return pos");
        }
        RoiAction::Click {
            mode,
            count,
            interval_ms,
        } => match mode {
            ClickMode::Single => {
                let _ = writeln!(out, "    click({cx}, {cy})");
                let _ = writeln!(out, "    return True");
            }
            ClickMode::Loop => {
                let _ = writeln!(out, "    for _ in range({count}):");
                let _ = writeln!(out, "        click({cx}, {cy})");
                let _ = writeln!(out, "        time.sleep({})", *interval_ms as f64 / 1000.0);
                let _ = writeln!(out, "    return True");
            }
        },
        RoiAction::Swipe { direction, speed } => {
            let ((x1, y1), (x2, y2), duration) = swipe_path(r, *direction, *speed);
            let _ = writeln!(out, "    return swipe({x1}, {y1}, {x2}, {y2}, {duration})");
        }
        RoiAction::Ocr { language, hint } => {
            let language = language.as_deref().map_or("None".to_string(), quote);
            let hint = hint.as_deref().map_or("None".to_string(), quote);
            let _ = writeln!(
                out,
                "    clip = screen[{}:{}, {}:{}]",
                r.y,
                r.bottom(),
                r.x,
                r.right()
            );
            let _ = writeln!(out, "    return recognize_text(clip, {language}, {hint})");
        }
    }
}

const PYTHON_HELPERS: &str = r#"def capture_screen():
    raise NotImplementedError("connect a screen source")


def match_template(screen, template_path, threshold):
    template = cv2.imread(template_path)
    if template is None:
        return None
    result = cv2.matchTemplate(screen, template, cv2.TM_CCOEFF_NORMED)
    _, max_val, _, max_loc = cv2.minMaxLoc(result)
    if max_val >= threshold:
        return max_loc
    return None


def click(x, y):
    print(f"click ({x}, {y})")
    return True


def swipe(x1, y1, x2, y2, duration_ms):
    print(f"swipe ({x1}, {y1}) -> ({x2}, {y2}) in {duration_ms} ms")
    return True


def recognize_text(image, language=None, hint=None):
    import pytesseract
    return pytesseract.image_to_string(image, lang=language or "eng")
"#;

/// Python script using OpenCV template matching against the crops
pub fn render_python(records: &[RoiRecord], options: &ScriptOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Python script generated by roi-slicer");
    let _ = writeln!(out, "import time");
    let _ = writeln!(out);
    let _ = writeln!(out, "import cv2");
    let _ = writeln!(out);
    let _ = writeln!(out, "ASSET_DIR = {}", quote(&options.asset_dir));
    let _ = writeln!(out, "MATCH_THRESHOLD = {}", options.match_threshold);
    let _ = writeln!(out);
    let _ = writeln!(out);
    out.push_str(PYTHON_HELPERS);
    for record in records {
        let _ = writeln!(out);
        let _ = writeln!(out);
        python_block(&mut out, record, options);
    }
    let _ = writeln!(out);
    let _ = writeln!(out);
    let steps: Vec<String> = records.iter().map(|r| format!("roi_{}", r.id)).collect();
    let _ = writeln!(out, "ROUTINE = [{}]", steps.join(", "));
    let _ = writeln!(out);
    let _ = writeln!(out, "if __name__ == \"__main__\":");
    let _ = writeln!(out, "    screen = capture_screen()");
    let _ = writeln!(out, "    for step in ROUTINE:");
    let _ = writeln!(out, "        step(screen)");
    out
}

/// Code preview for a single record
///
/// The record's `asset` should already carry the crop name the full export
/// would give it; see [`super::ExportManager::snippet`].
pub fn snippet(record: &RoiRecord, format: SnippetFormat, options: &ScriptOptions) -> String {
    let mut out = String::new();
    match format {
        SnippetFormat::Autojs => autojs_block(&mut out, record, options),
        SnippetFormat::Python => python_block(&mut out, record, options),
        SnippetFormat::Raw => {
            let r = record.rect;
            let (cx, cy) = r.center();
            let _ = writeln!(
                out,
                "{}: ({}, {}, {}, {}) -> center: ({cx}, {cy})",
                record.label, r.x, r.y, r.width, r.height
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageActionKind, ImageSize, RectInput, RoiConfig, RoiDraft, RoiSet};

    fn records() -> Vec<RoiRecord> {
        let mut set = RoiSet::new(ImageSize::new(400, 300));
        set.create(
            RoiDraft::new(RectInput::new(10, 10, 40, 20), RoiConfig::image(ImageActionKind::DetectAndClick))
                .with_label("say \"hi\""),
        )
        .unwrap();
        set.create(RoiDraft::new(
            RectInput::new(100, 50, 100, 200),
            RoiConfig::swipe(Some(SwipeDirection::Up), 400),
        ))
        .unwrap();
        set.create(RoiDraft::new(
            RectInput::new(0, 0, 10, 10),
            RoiConfig::click(ClickMode::Loop, 4, 250),
        ))
        .unwrap();
        let mut records = set.to_records();
        records[0].asset = Some("say _hi_.png".into());
        records
    }

    #[test]
    fn test_autojs_has_block_per_roi_and_run_list() {
        let script = render_autojs(&records(), &ScriptOptions::default());
        assert!(script.contains("function roi_1() {"));
        assert!(script.contains("images.read(\"./res/say _hi_.png\")"));
        assert!(script.contains("click(found.x + 20, found.y + 10);"));
        assert!(script.contains("return swipe(150, 249, 150, 50, 497);"));
        assert!(script.contains("for (var i = 0; i < 4; i++) {"));
        assert!(script.contains("var ROUTINE = [roi_1, roi_2, roi_3];"));
        assert!(script.contains("// \"say \\\"hi\\\"\" (detect_and_click)"));
    }

    #[test]
    fn test_python_mirrors_actions() {
        let script = render_python(&records(), &ScriptOptions::default());
        assert!(script.contains("def roi_2(screen):"));
        assert!(script.contains("pos = match_template(screen, \"./res/say _hi_.png\", MATCH_THRESHOLD)"));
        assert!(script.contains("time.sleep(0.25)"));
        assert!(script.contains("ROUTINE = [roi_1, roi_2, roi_3]"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let options = ScriptOptions::default();
        assert_eq!(render_autojs(&records(), &options), render_autojs(&records(), &options));
        assert_eq!(render_python(&records(), &options), render_python(&records(), &options));
    }

    #[test]
    fn test_raw_snippet() {
        let mut set = RoiSet::new(ImageSize::new(400, 300));
        let roi = set
            .create(
                RoiDraft::new(RectInput::new(10, 20, 30, 40), RoiConfig::ocr(None, None))
                    .with_label("score"),
            )
            .unwrap();
        let record = roi.to_record();
        assert_eq!(
            snippet(&record, SnippetFormat::Raw, &ScriptOptions::default()),
            "score: (10, 20, 30, 40) -> center: (25, 40)\n"
        );
        let js = snippet(&record, SnippetFormat::Autojs, &ScriptOptions::default());
        assert!(js.contains("images.clip(captureScreen(), 10, 20, 30, 40)"));
    }

    #[test]
    fn test_line_separators_escaped_in_comments() {
        let mut records = records();
        records[0].label = "a\u{2028}alert(1)\u{2029}b".into();
        let script = render_autojs(&records, &ScriptOptions::default());
        assert!(!script.contains('\u{2028}') && !script.contains('\u{2029}'));
        assert!(script.contains("// \"a\\u2028alert(1)\\u2029b\" (detect_and_click)"));
        assert_eq!(quote("x\u{2029}"), "\"x\\u2029\"");
    }
}
