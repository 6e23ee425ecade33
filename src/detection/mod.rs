//! Region extraction engines
//!
//! This module turns a raster plus sparse user input (a click, a drag or a
//! set of merge clicks) into candidate regions.

pub mod auto;
pub mod components;
pub mod morphology;
pub mod smart;
pub mod superpixel;

pub use auto::{AutoDetectParams, AutoDetector};
pub use components::Connectivity;
pub use smart::{SmartParams, SmartSeed, SmartSegmenter};
pub use superpixel::{
    Atom, AtomId, SegmentationMap, Selection, SuperpixelParams, SuperpixelSegmenter,
};
