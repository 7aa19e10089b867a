#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # asset-prep
//!
//! Preparation of product assets for 3D printing pipelines:
//!
//! - **Background removal**: classical, model-free segmentation of product
//!   photos. Several mask estimators (region growing with colour models, edge
//!   morphology, HSV colour thresholds, Otsu contours and a circular fallback)
//!   are combined by a [`SegmentationPolicy`]. The result is an RGBA image
//!   whose alpha channel is the foreground mask.
//! - **Mesh normalization**: glTF/GLB scenes (or STL) are merged into one
//!   mesh, centred on the origin, scaled so the largest dimension matches a
//!   target size in millimetres, checked for watertightness, hole-filled when
//!   possible and exported as STL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asset_prep::{remove_background, normalize_mesh, NormalizationConfig, SegmentationConfig};
//!
//! # fn example() -> asset_prep::Result<()> {
//! let report = remove_background("photo.jpg", "cutout.png", &SegmentationConfig::default())?;
//! println!("foreground: {:.1}%", report.foreground_ratio * 100.0);
//!
//! let config = NormalizationConfig::builder().target_size_mm(50.0).build()?;
//! let report = normalize_mesh("model.glb", "model.stl", &config)?;
//! println!("scaled by {} (watertight: {})", report.scale_factor, report.is_watertight);
//! # Ok(())
//! # }
//! ```
//!
//! ## Library vs CLI Usage
//!
//! The library never prints and never installs a tracing subscriber; it only
//! emits `tracing` spans and events. The `asset-prep` binary (feature `cli`)
//! wires up logging on stderr and prints one JSON line per invocation.
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP input and output
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! asset-prep = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod mesh;
pub mod normalizer;
pub mod processor;
pub mod segmentation;
pub mod services;
pub mod tracing_config;
pub mod types;

use std::path::Path;

// Public API exports
pub use config::{
    HsvRange, NormalizationConfig, OutputFormat, SegmentationConfig, SegmentationPolicy, StlFormat,
};
pub use error::{PrepError, Result};
pub use mesh::{LoadedAsset, MeshGeometry, NamedGeometry};
pub use normalizer::MeshNormalizer;
pub use processor::BackgroundRemovalProcessor;
pub use segmentation::{
    MaskEstimator, MethodFailure, SegmentationEngine, SegmentationMethod, SegmentedImage,
};
pub use services::{
    ImageIOService, NoOpProgressReporter, OutputFormatHandler, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate, TracingProgressReporter,
};
pub use types::{
    Mask, MaskStatistics, NormalizationReport, NormalizationResult, ProcessingTimings,
    SegmentationReport,
};

pub use tracing_config::{events, spans};
#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background of an image file and write an RGBA result
///
/// The output format follows `config.output_format`, or the extension of
/// `output_path` when unset. Formats without an alpha channel are rejected
/// before the input is read.
///
/// # Arguments
/// * `input_path` - Photo to segment (PNG, JPEG, TIFF, WebP)
/// * `output_path` - Destination for the RGBA image
/// * `config` - Segmentation settings
///
/// # Errors
/// - `InvalidConfig` or `UnsupportedFormat` before any work starts
/// - `InputLoad` when the input is missing or cannot be decoded
/// - `Export` when the result cannot be written
pub fn remove_background<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    config: &SegmentationConfig,
) -> Result<SegmentationReport> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_file(input_path, output_path)
}

/// Normalize a mesh file for printing and export STL
///
/// # Errors
/// - `InputLoad` for unreadable files or files without usable geometry
/// - `DegenerateGeometry` when the mesh has no measurable size
/// - `Export` when the STL cannot be written
pub fn normalize_mesh<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    config: &NormalizationConfig,
) -> NormalizationResult {
    MeshNormalizer::new(config.clone())?.normalize(input_path, output_path)
}
