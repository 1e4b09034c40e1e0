//! Error types for the nesting engine.
//!
//! The pipeline prefers degrading over aborting. Only missing inputs, an
//! empty packing result and failed writes stop a job; unreadable geometry
//! and missing configuration are logged and worked around.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while nesting a job.
#[derive(Error, Debug)]
pub enum NestError {
    /// The manifest or a referenced CAD file does not exist.
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// A CAD file exists but could not be parsed.
    #[error("Unreadable geometry in {}: {reason}", path.display())]
    GeometryUnreadable { path: PathBuf, reason: String },

    /// The manifest is malformed or lacks a required field.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// A part does not fit on any sheet of its material.
    #[error("Part '{part}' ({length} x {width}) does not fit on a {sheet_width} x {sheet_height} sheet of {material}")]
    PackingInfeasible {
        part: String,
        material: String,
        length: f64,
        width: f64,
        sheet_width: f64,
        sheet_height: f64,
    },

    /// No catalog was available and no fallback applies.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// I/O error while reading inputs or writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// XML reading or writing failed.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Raster encoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON encoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A model invariant was violated.
    #[error("Model error: {0}")]
    Core(#[from] nestkit_core::Error),

    /// The catalog could not be used.
    #[error("Settings error: {0}")]
    Settings(#[from] nestkit_settings::SettingsError),
}

/// Result type alias for nesting operations.
pub type NestResult<T> = Result<T, NestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nest_error_display() {
        let err = NestError::InputNotFound(PathBuf::from("job/parts.dxt"));
        assert_eq!(err.to_string(), "Input not found: job/parts.dxt");

        let err = NestError::PackingInfeasible {
            part: "tampo".to_string(),
            material: "MDF-18".to_string(),
            length: 3000.0,
            width: 600.0,
            sheet_width: 2750.0,
            sheet_height: 1850.0,
        };
        assert_eq!(
            err.to_string(),
            "Part 'tampo' (3000 x 600) does not fit on a 2750 x 1850 sheet of MDF-18"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: NestError = io_err.into();
        assert!(matches!(err, NestError::Io(_)));
    }
}
