//! Default parameters and limits for region extraction and export
//!
//! Values grouped per engine. Most of them seed the defaults of
//! [`crate::config::SlicerConfig`] and can be overridden from a JSON file.

/// Seed-point auto-detection defaults
pub mod auto_detect {
    /// Default RGB Euclidean distance tolerance (0-441)
    pub const COLOR_TOLERANCE: f32 = 30.0;

    /// Components smaller than this many pixels are treated as noise
    pub const MIN_AREA_PX: u32 = 20;

    /// Components larger than this fraction of the image are treated as background
    pub const MAX_AREA_RATIO: f64 = 0.9;

    /// Side of the square structuring element used for the closing pass
    pub const CLOSING_KERNEL: u32 = 3;

    /// Full-image scans discard a region overlapping a larger kept one above this IoU
    pub const MERGE_IOU: f64 = 0.3;

    /// Red-dot pass: hue bands in degrees and minimum saturation/value
    pub const RED_HUE_BANDS: [(f32, f32); 2] = [(0.0, 20.0), (320.0, 360.0)];
    pub const RED_MIN_SATURATION: f32 = 100.0 / 255.0;
    pub const RED_MIN_VALUE: f32 = 100.0 / 255.0;
    pub const RED_DOT_AREA_PX: (u64, u64) = (30, 5000);
    /// A disc fills about 0.785 of its bounding box
    pub const RED_DOT_MIN_FILL: f64 = 0.6;
    pub const RED_DOT_MAX_ASPECT: f64 = 1.5;
    /// Pixels added around each red dot
    pub const RED_DOT_MARGIN: u32 = 2;
    pub const RED_DOT_KERNEL: u32 = 5;

    /// Canny hysteresis thresholds shared by the button and icon passes
    pub const CANNY_LOW: f32 = 50.0;
    pub const CANNY_HIGH: f32 = 150.0;

    /// Button pass: minimum box area and maximum share of the image
    pub const BUTTON_MIN_AREA_PX: u64 = 200;
    pub const BUTTON_MAX_AREA_RATIO: f64 = 0.5;
    pub const BUTTON_ASPECT_RANGE: (f64, f64) = (0.1, 10.0);
    pub const BUTTON_KERNEL: u32 = 5;

    /// Icon pass: minimum box area and maximum share of the image
    pub const ICON_MIN_AREA_PX: u64 = 100;
    pub const ICON_MAX_AREA_RATIO: f64 = 0.3;
    pub const ICON_MAX_ASPECT: f64 = 2.0;
    pub const ICON_KERNEL: u32 = 3;
}

/// SLIC superpixel defaults
pub mod superpixel {
    /// Nominal atom side in pixels, used to derive the default region count
    pub const REGION_SIZE: u32 = 30;

    /// Colour/space trade-off (larger values give more compact atoms)
    pub const COMPACTNESS: f32 = 15.0;

    /// Number of assignment/update passes
    pub const ITERATIONS: u32 = 10;

    /// Lower bound on the requested atom count
    pub const MIN_REGION_COUNT: u32 = 10;

    /// Fragments below `nominal_area / MIN_FRAGMENT_DIVISOR` are absorbed by a neighbour
    pub const MIN_FRAGMENT_DIVISOR: u32 = 4;

    /// Mean-colour ΔE under which an adjacent atom is merged with the clicked one
    pub const SIMILARITY_THRESHOLD: f32 = 10.0;

    /// Smallest image side SLIC accepts
    pub const MIN_IMAGE_SIDE: u32 = 4;
}

/// Foreground refinement defaults
pub mod smart {
    /// Maximum refinement passes
    pub const ITERATIONS: u32 = 5;

    /// Gaussian components per colour model
    pub const GMM_COMPONENTS: usize = 5;

    /// Weight of the neighbourhood agreement term in the relabelling step
    pub const SMOOTHNESS: f32 = 0.75;

    /// A pass changing fewer labels than this is considered converged
    pub const CONVERGENCE_PIXELS: u32 = 16;

    /// Margin (px) added around the seed rectangle to sample background
    pub const BACKGROUND_MARGIN: u32 = 12;

    /// Half-size of the rectangle built around point seeds
    pub const POINT_EXPANSION: u32 = 50;

    /// Masks smaller than this are degenerate
    pub const MIN_AREA_PX: u32 = 100;

    /// Floor on per-channel variance so flat synthetic colours stay comparable
    pub const VARIANCE_FLOOR: f32 = 4.0;
}

/// ROI editing defaults
pub mod roi {
    /// Pixel offset applied by duplicate
    pub const DUPLICATE_OFFSET: (i64, i64) = (20, 20);

    /// Default click count
    pub const CLICK_COUNT: u32 = 1;

    /// Default click interval in milliseconds
    pub const CLICK_INTERVAL_MS: u32 = 500;

    /// Default swipe speed in pixels per second
    pub const SWIPE_SPEED: u32 = 400;

    /// Pointer travel (px) under which a press/release pair is a click
    pub const CLICK_SLOP_PX: i64 = 3;

    /// Largest mask extent accepted from a document, in pixels
    pub const MAX_MASK_PIXELS: u64 = 1 << 28;

    /// Version written into serialized ROI documents
    pub const DOCUMENT_VERSION: &str = "1.0.0";
}

/// Export defaults
pub mod export {
    /// Default output directory
    pub const OUTPUT_DIR: &str = "./res_output";

    /// JSON document file name
    pub const JSON_FILE: &str = "roi_data.json";

    /// Auto.js script file name
    pub const AUTOJS_FILE: &str = "auto_script.js";

    /// Python script file name
    pub const PYTHON_FILE: &str = "auto_script.py";

    /// Subdirectory of the output directory receiving the PNG crops
    pub const CROP_DIR: &str = "res";

    /// Template-matching threshold written into generated scripts
    pub const MATCH_THRESHOLD: f32 = 0.8;
}
