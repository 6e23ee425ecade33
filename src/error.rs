//! Error types for the roi_slicer library

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{RoiId, RoiPatch};

/// Result type alias for roi_slicer operations
pub type Result<T> = std::result::Result<T, RoiError>;

/// Error taxonomy for ROI editing, segmentation and export
///
/// A detection or segmentation that simply finds nothing is not an error:
/// engines return `Ok(None)` for that case.
#[derive(Error, Debug)]
pub enum RoiError {
    /// Image file or buffer could not be loaded or decoded
    #[error("Failed to load image: {message}")]
    ImageLoad {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed or out-of-bounds ROI or action configuration
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// An update patch failed validation; the ROI was left unchanged
    #[error("Update of ROI {id} rejected: {reason}")]
    PatchRejected {
        id: RoiId,
        reason: String,
        patch: Box<RoiPatch>,
    },

    /// No ROI with this id exists in the set
    #[error("Unknown ROI id {id}")]
    UnknownRoi { id: RoiId },

    /// The segmentation algorithm cannot run on this input
    #[error("Segmentation failed: {reason}")]
    SegmentationFailure { reason: String },

    /// A long-running operation observed its cancellation token
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Import or deserialization of a malformed document
    #[error("Format error: {message}")]
    Format {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A file write failed during export
    #[error("Export write failed for {}", path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cropped raster could not be encoded
    #[error("Image encoding failed for {}", path.display())]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Configuration file could not be read or written
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// An interaction or export was requested before any image was loaded
    #[error("No image loaded")]
    NoImageLoaded,

    /// Commit was requested without a pending candidate region
    #[error("No candidate region to commit")]
    NoCandidate,
}

impl RoiError {
    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a segmentation failure
    pub fn segmentation(reason: impl Into<String>) -> Self {
        Self::SegmentationFailure {
            reason: reason.into(),
        }
    }

    /// Create a cancellation error for the named operation
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create an image load error with context
    pub fn image_load<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageLoad {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a format error without an underlying cause
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            source: None,
        }
    }

    /// Create a format error wrapping a parser error
    pub fn format_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Format {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an export write error for `path`
    pub fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ExportIo {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Check if this error leaves the session usable without intervention
    ///
    /// Validation, segmentation and per-item export failures only abort the
    /// operation in progress; committed ROIs and undo history are untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RoiError::Validation { .. }
                | RoiError::PatchRejected { .. }
                | RoiError::SegmentationFailure { .. }
                | RoiError::Cancelled { .. }
                | RoiError::ExportIo { .. }
                | RoiError::ImageEncode { .. }
                | RoiError::NoCandidate
        )
    }

    /// Get user-friendly error description for application display
    pub fn user_message(&self) -> String {
        match self {
            RoiError::ImageLoad { .. } => {
                "Could not load the image. Please check the file format and try again.".to_string()
            }
            RoiError::Validation { reason } | RoiError::PatchRejected { reason, .. } => {
                format!("The region settings are not valid: {reason}.")
            }
            RoiError::SegmentationFailure { .. } => {
                "Could not find a region here. Try another point or a different mode.".to_string()
            }
            RoiError::Format { .. } => {
                "The ROI file is malformed and could not be imported.".to_string()
            }
            RoiError::ExportIo { path, .. } | RoiError::ImageEncode { path, .. } => {
                format!("Could not write {}.", path.display())
            }
            RoiError::NoImageLoaded => "Load an image first.".to_string(),
            _ => "The operation failed. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(RoiError::validation("zero area").is_recoverable());
        assert!(RoiError::segmentation("image too small").is_recoverable());
        assert!(!RoiError::format("not json").is_recoverable());
        assert!(!RoiError::NoImageLoaded.is_recoverable());
    }

    #[test]
    fn test_user_message_mentions_reason() {
        let err = RoiError::validation("swipe requires a direction");
        assert!(err.user_message().contains("swipe requires a direction"));
    }

    #[test]
    fn test_display_includes_path() {
        let err = RoiError::export_io(
            "/tmp/out/roi_data.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("roi_data.json"));
    }
}
