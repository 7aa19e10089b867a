//! Configuration types for background removal and mesh normalization

use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the segmentation engine combines its mask estimators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationPolicy {
    /// Try region growing, then contour thresholding, then the circular fallback
    #[default]
    Cascade,
    /// Run region growing, edges and colour thresholding, OR the masks, then smooth
    Composite,
}

impl std::fmt::Display for SegmentationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cascade => write!(f, "cascade"),
            Self::Composite => write!(f, "composite"),
        }
    }
}

/// Output image format options (all carry an alpha channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// TIFF with alpha channel transparency and lossless compression
    Tiff,
    /// WebP with alpha channel transparency
    WebP,
}

/// Inclusive HSV range in the 8-bit convention (H 0-180, S and V 0-255)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    /// Near-white studio backdrops
    pub const WHITE: Self = Self {
        lower: [0, 0, 200],
        upper: [180, 30, 255],
    };

    /// Light gray backdrops
    pub const LIGHT_GRAY: Self = Self {
        lower: [0, 0, 180],
        upper: [180, 50, 220],
    };

    #[must_use]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        hsv.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }
}

/// Configuration for the segmentation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Mask combination policy
    pub policy: SegmentationPolicy,

    /// Fraction of width/height left outside the initial foreground rectangle on each side
    pub rect_margin: f64,

    /// Refinement iterations of the region-growing estimator
    pub iterations: usize,

    /// Gaussian components per colour model
    pub gmm_components: usize,

    /// Weight of the neighbour smoothness term
    pub smoothness: f64,

    /// Lower hysteresis threshold of the edge detector
    pub canny_low: f32,

    /// Upper hysteresis threshold of the edge detector
    pub canny_high: f32,

    /// Colour ranges treated as uniform background
    pub background_ranges: Vec<HsvRange>,

    /// Median filter kernel applied to the composite mask
    pub median_kernel: usize,

    /// Fallback disc radius is `min(width, height) / fallback_radius_divisor`
    pub fallback_radius_divisor: u32,

    /// Explicit output format (inferred from the output extension when `None`)
    pub output_format: Option<OutputFormat>,
}

impl SegmentationConfig {
    /// Margin used by the cascade implementation this engine grew out of
    pub const ALTERNATE_RECT_MARGIN: f64 = 0.125;

    #[must_use]
    pub fn builder() -> SegmentationConfigBuilder {
        SegmentationConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PrepError::input_load_error("configuration", path, &e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PrepError::invalid_config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Margin outside `[0, 0.5)`
    /// - Zero iterations or an out-of-range component count
    /// - Inverted edge thresholds
    /// - Even or too small median kernel
    pub fn validate(&self) -> Result<()> {
        if !(0.0..0.5).contains(&self.rect_margin) {
            return Err(PrepError::config_value_error(
                "rectangle margin",
                self.rect_margin,
                "0.0-0.5 (exclusive)",
                Some(0.1),
            ));
        }
        if self.iterations == 0 {
            return Err(PrepError::config_value_error(
                "iterations",
                self.iterations,
                ">= 1",
                Some(5),
            ));
        }
        if !(1..=10).contains(&self.gmm_components) {
            return Err(PrepError::config_value_error(
                "GMM components",
                self.gmm_components,
                "1-10",
                Some(5),
            ));
        }
        if !self.smoothness.is_finite() || self.smoothness < 0.0 {
            return Err(PrepError::config_value_error(
                "smoothness",
                self.smoothness,
                "finite, >= 0",
                Some(50.0),
            ));
        }
        let thresholds_ordered = self.canny_low.is_finite()
            && self.canny_high.is_finite()
            && (0.0..=self.canny_high).contains(&self.canny_low);
        if !thresholds_ordered {
            return Err(PrepError::invalid_config(format!(
                "Edge thresholds must be finite and satisfy 0 <= low <= high (got {} / {})",
                self.canny_low, self.canny_high
            )));
        }
        if self.median_kernel < 3 || self.median_kernel % 2 == 0 {
            return Err(PrepError::config_value_error(
                "median kernel",
                self.median_kernel,
                "odd values >= 3",
                Some(5),
            ));
        }
        if self.fallback_radius_divisor == 0 {
            return Err(PrepError::config_value_error(
                "fallback radius divisor",
                self.fallback_radius_divisor,
                ">= 1",
                Some(3),
            ));
        }
        for range in &self.background_ranges {
            if range.lower.iter().zip(&range.upper).any(|(lo, hi)| lo > hi) {
                return Err(PrepError::invalid_config(format!(
                    "HSV range lower bound {:?} exceeds upper bound {:?}",
                    range.lower, range.upper
                )));
            }
        }
        Ok(())
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            policy: SegmentationPolicy::default(),
            rect_margin: 0.1,
            iterations: 5,
            gmm_components: 5,
            smoothness: 50.0,
            canny_low: 50.0,
            canny_high: 150.0,
            background_ranges: vec![HsvRange::WHITE, HsvRange::LIGHT_GRAY],
            median_kernel: 5,
            fallback_radius_divisor: 3,
            output_format: None,
        }
    }
}

/// Builder for [`SegmentationConfig`]
#[derive(Debug, Default)]
pub struct SegmentationConfigBuilder {
    config: SegmentationConfig,
}

impl SegmentationConfigBuilder {
    #[must_use]
    pub fn policy(mut self, policy: SegmentationPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    #[must_use]
    pub fn rect_margin(mut self, margin: f64) -> Self {
        self.config.rect_margin = margin;
        self
    }

    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    #[must_use]
    pub fn gmm_components(mut self, components: usize) -> Self {
        self.config.gmm_components = components;
        self
    }

    #[must_use]
    pub fn smoothness(mut self, smoothness: f64) -> Self {
        self.config.smoothness = smoothness;
        self
    }

    #[must_use]
    pub fn edge_thresholds(mut self, low: f32, high: f32) -> Self {
        self.config.canny_low = low;
        self.config.canny_high = high;
        self
    }

    #[must_use]
    pub fn background_ranges(mut self, ranges: Vec<HsvRange>) -> Self {
        self.config.background_ranges = ranges;
        self
    }

    #[must_use]
    pub fn median_kernel(mut self, kernel: usize) -> Self {
        self.config.median_kernel = kernel;
        self
    }

    #[must_use]
    pub fn fallback_radius_divisor(mut self, divisor: u32) -> Self {
        self.config.fallback_radius_divisor = divisor;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = Some(format);
        self
    }

    /// Build the configuration, validating every parameter
    pub fn build(self) -> Result<SegmentationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// STL encoding variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StlFormat {
    #[default]
    Binary,
    Ascii,
}

/// Configuration for the mesh normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Size of the largest bounding-box dimension after scaling, in millimetres
    pub target_size_mm: f64,

    /// Attempt hole filling when the mesh is not watertight
    pub repair: bool,

    /// Largest boundary loop (in edges) the hole filler will close; `None` closes all
    pub max_hole_edges: Option<usize>,

    /// STL encoding
    pub stl_format: StlFormat,

    /// Merge exactly coincident vertices of each geometry on load
    pub weld_vertices: bool,
}

impl NormalizationConfig {
    pub const DEFAULT_TARGET_SIZE_MM: f64 = 100.0;

    #[must_use]
    pub fn builder() -> NormalizationConfigBuilder {
        NormalizationConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PrepError::input_load_error("configuration", path, &e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PrepError::invalid_config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Target size that is not a finite positive number
    /// - Hole edge limit below 3
    pub fn validate(&self) -> Result<()> {
        if !self.target_size_mm.is_finite() || self.target_size_mm <= 0.0 {
            return Err(PrepError::config_value_error(
                "target size (mm)",
                self.target_size_mm,
                "finite, > 0",
                Some(Self::DEFAULT_TARGET_SIZE_MM),
            ));
        }
        if let Some(max_edges) = self.max_hole_edges {
            if max_edges < 3 {
                return Err(PrepError::config_value_error(
                    "max hole edges",
                    max_edges,
                    ">= 3",
                    None,
                ));
            }
        }
        Ok(())
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            target_size_mm: Self::DEFAULT_TARGET_SIZE_MM,
            repair: true,
            max_hole_edges: None,
            stl_format: StlFormat::default(),
            weld_vertices: true,
        }
    }
}

/// Builder for [`NormalizationConfig`]
#[derive(Debug, Default)]
pub struct NormalizationConfigBuilder {
    config: NormalizationConfig,
}

impl NormalizationConfigBuilder {
    #[must_use]
    pub fn target_size_mm(mut self, target: f64) -> Self {
        self.config.target_size_mm = target;
        self
    }

    #[must_use]
    pub fn repair(mut self, repair: bool) -> Self {
        self.config.repair = repair;
        self
    }

    #[must_use]
    pub fn max_hole_edges(mut self, max_edges: usize) -> Self {
        self.config.max_hole_edges = Some(max_edges);
        self
    }

    #[must_use]
    pub fn stl_format(mut self, format: StlFormat) -> Self {
        self.config.stl_format = format;
        self
    }

    #[must_use]
    pub fn weld_vertices(mut self, weld: bool) -> Self {
        self.config.weld_vertices = weld;
        self
    }

    /// Build the configuration, validating every parameter
    pub fn build(self) -> Result<NormalizationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
