//! Screenshot loading into immutable, identity-carrying images
//!
//! This module provides a single entry point for loading screenshots from
//! files or in-memory buffers (for example a capture streamed from a device).
//!
//! ## Supported Formats
//!
//! Via the `image` crate: PNG, JPEG, GIF (first frame), WebP, TIFF, BMP.
//!
//! ## Design
//!
//! Every image is converted to RGB8 and wrapped in a [`SourceImage`], whose
//! [`ImageId`] is a hash of dimensions and pixels. Per-image caches are keyed
//! by that id. Alpha is discarded; screenshots are opaque.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, ImageReader, RgbImage};
use tracing::debug;

use crate::error::{Result, RoiError};
use crate::model::ImageSize;

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG image
    Jpeg,
    /// PNG image
    Png,
    /// GIF image (first frame only)
    Gif,
    /// WebP image
    WebP,
    /// TIFF image
    Tiff,
    /// BMP image
    Bmp,
}

impl ImageFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<ImageFormat> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::WebP),
            "tiff" | "tif" => Some(ImageFormat::Tiff),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::WebP => image::ImageFormat::WebP,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

/// Content hash identifying a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Immutable decoded screenshot
///
/// Cloning is cheap: the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct SourceImage {
    id: ImageId,
    pixels: Arc<RgbImage>,
}

impl SourceImage {
    /// Wrap an already decoded RGB buffer
    pub fn from_rgb(pixels: RgbImage) -> Self {
        let mut hasher = DefaultHasher::new();
        pixels.dimensions().hash(&mut hasher);
        pixels.as_raw().hash(&mut hasher);
        Self {
            id: ImageId(hasher.finish()),
            pixels: Arc::new(pixels),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.pixels.width(), self.pixels.height())
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Shared handle to the pixel buffer, for background jobs
    pub fn shared_pixels(&self) -> Arc<RgbImage> {
        Arc::clone(&self.pixels)
    }
}

impl PartialEq for SourceImage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.size() == other.size()
    }
}

/// Load an image file from disk
///
/// # Errors
///
/// Returns `RoiError::ImageLoad` if:
/// - File cannot be opened
/// - Format is not supported
/// - Decoding fails or yields an empty image
pub fn load_image(path: &Path) -> Result<SourceImage> {
    let format = ImageFormat::from_extension(path).ok_or_else(|| RoiError::ImageLoad {
        message: format!("Unknown image format for file: {}", path.display()),
        source: None,
    })?;

    let mut reader = ImageReader::open(path).map_err(|e| {
        RoiError::image_load(format!("Failed to open image file: {}", path.display()), e)
    })?;
    reader.set_format(format.into());
    let decoded = reader.decode().map_err(|e| {
        RoiError::image_load(format!("Failed to decode image: {}", path.display()), e)
    })?;

    let image = into_source(decoded)?;
    debug!(path = %path.display(), ?format, id = %image.id(), size = ?image.size(), "image loaded");
    Ok(image)
}

/// Decode an encoded image held in memory
pub fn load_from_memory(bytes: &[u8]) -> Result<SourceImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| RoiError::image_load("Failed to decode image buffer", e))?;
    into_source(decoded)
}

fn into_source(decoded: DynamicImage) -> Result<SourceImage> {
    let rgb = decoded.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(RoiError::ImageLoad {
            message: "Image has zero width or height".into(),
            source: None,
        });
    }
    Ok(SourceImage::from_rgb(rgb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ImageFormat::from_extension(Path::new("shot.PNG")),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_extension(Path::new("shot.jpeg")),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_extension(Path::new("shot.heic")), None);
        assert_eq!(
            image::ImageFormat::from(ImageFormat::Tiff),
            image::ImageFormat::Tiff
        );
    }

    #[test]
    fn test_load_decodes_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bmp");
        let original = RgbImage::from_fn(6, 4, |x, y| Rgb([x as u8 * 30, y as u8 * 60, 200]));
        original.save_with_format(&path, image::ImageFormat::Bmp).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.pixels(), &original);

        let mislabelled = dir.path().join("capture.png");
        std::fs::copy(&path, &mislabelled).unwrap();
        assert!(matches!(
            load_image(&mislabelled),
            Err(RoiError::ImageLoad { .. })
        ));
    }

    #[test]
    fn test_identity_follows_content() {
        let a = SourceImage::from_rgb(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let b = SourceImage::from_rgb(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let c = SourceImage::from_rgb(RgbImage::from_pixel(4, 4, Rgb([1, 2, 4])));
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_load_from_memory_png() {
        let original = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 80, 7]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(original.clone())
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let loaded = load_from_memory(&bytes).unwrap();
        assert_eq!(loaded.pixels(), &original);
        assert_eq!(loaded, SourceImage::from_rgb(original));
    }

    #[test]
    fn test_garbage_buffer_fails() {
        assert!(matches!(
            load_from_memory(b"not an image"),
            Err(RoiError::ImageLoad { .. })
        ));
    }

    #[test]
    fn test_unknown_extension_fails() {
        assert!(load_image(Path::new("capture.xyz")).is_err());
    }
}
