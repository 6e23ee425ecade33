//! Color conversion module
//!
//! Lab conversion and colour distances shared by the segmentation engines.

pub mod conversion;

pub use conversion::{ColorConverter, LabImage, LabPixel};
