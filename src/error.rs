//! Error types for background removal and mesh normalization

use std::path::Path;
use thiserror::Error;

/// Result type alias for asset preparation operations
pub type Result<T> = std::result::Result<T, PrepError>;

/// Error types surfaced by the two pipelines
///
/// Per-method segmentation failures are not part of this enum: they are
/// recovered inside the engine (see [`crate::segmentation::MethodFailure`]).
#[derive(Error, Debug)]
pub enum PrepError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input file missing, corrupt, or not decodable as the expected type
    #[error("Failed to load input: {0}")]
    InputLoad(String),

    /// Merged mesh has no vertices or a zero-sized bounding box
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Final encode/write/persist step failed
    #[error("Export failed: {0}")]
    Export(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported file format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl PrepError {
    /// Create a new input load error
    pub fn input_load<S: Into<String>>(msg: S) -> Self {
        Self::InputLoad(msg.into())
    }

    /// Create a new degenerate geometry error
    pub fn degenerate_geometry<S: Into<String>>(msg: S) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    /// Create a new export error
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create an input load error carrying the offending path
    pub fn input_load_error<P: AsRef<Path>>(
        kind: &str,
        path: P,
        error: &dyn std::fmt::Display,
    ) -> Self {
        Self::InputLoad(format!(
            "Could not load {} '{}': {}",
            kind,
            path.as_ref().display(),
            error
        ))
    }

    /// Create an export error carrying the destination path and the failed step
    pub fn export_error<P: AsRef<Path>>(
        operation: &str,
        path: P,
        error: &dyn std::fmt::Display,
    ) -> Self {
        Self::Export(format!(
            "Failed to {} '{}': {}",
            operation,
            path.as_ref().display(),
            error
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Short machine-friendly category name, used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Image(_) => "image",
            Self::InputLoad(_) => "input_load",
            Self::DegenerateGeometry(_) => "degenerate_geometry",
            Self::Export(_) => "export",
            Self::InvalidConfig(_) => "invalid_config",
            Self::UnsupportedFormat(_) => "unsupported_format",
        }
    }
}
