//! Foreground segmentation for product photos
//!
//! Five mask estimators share the [`MaskEstimator`] contract. The
//! [`SegmentationEngine`] combines them according to a [`SegmentationPolicy`]:
//!
//! - `Cascade` tries region growing, then contour thresholding, then the
//!   circular fallback, and keeps the first mask that succeeds.
//! - `Composite` runs region growing, edge morphology and colour thresholding,
//!   ORs their masks and smooths the union with a median filter.

pub mod color;
pub mod contour;
pub mod edges;
pub mod fallback;
pub mod filters;
pub mod morphology;
pub mod region_growing;

pub use color::ColorThresholdEstimator;
pub use contour::ContourEstimator;
pub use edges::EdgeMorphologyEstimator;
pub use fallback::CircularFallback;
pub use region_growing::{PixelLabel, RegionGrowingEstimator, SeedRect};

use crate::{
    config::{SegmentationConfig, SegmentationPolicy},
    error::Result,
    tracing_config::spans,
    types::Mask,
};
use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The individual mask estimators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMethod {
    RegionGrowing,
    EdgeMorphology,
    ColorThreshold,
    Contour,
    CircularFallback,
}

impl fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RegionGrowing => "region_growing",
            Self::EdgeMorphology => "edge_morphology",
            Self::ColorThreshold => "color_threshold",
            Self::Contour => "contour",
            Self::CircularFallback => "circular_fallback",
        };
        f.write_str(name)
    }
}

/// A recoverable failure of a single estimator
///
/// Never leaves the engine: cascade moves on to the next method and composite
/// substitutes an empty mask.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{method} failed: {reason}")]
pub struct MethodFailure {
    pub method: SegmentationMethod,
    pub reason: String,
}

impl MethodFailure {
    pub fn new<S: Into<String>>(method: SegmentationMethod, reason: S) -> Self {
        Self {
            method,
            reason: reason.into(),
        }
    }
}

/// Result of one estimator run
pub type MethodOutcome = std::result::Result<Mask, MethodFailure>;

/// Produces a binary foreground mask for an RGB image
pub trait MaskEstimator: Send + Sync {
    fn method(&self) -> SegmentationMethod;

    /// Estimate the foreground mask; the mask has the image's dimensions
    fn estimate(&self, image: &RgbImage) -> MethodOutcome;
}

/// The set of estimators an engine draws from
///
/// Tests substitute individual estimators to observe orchestration.
pub struct Estimators {
    pub region_growing: Box<dyn MaskEstimator>,
    pub edge_morphology: Box<dyn MaskEstimator>,
    pub color_threshold: Box<dyn MaskEstimator>,
    pub contour: Box<dyn MaskEstimator>,
    pub fallback: CircularFallback,
}

impl Estimators {
    #[must_use]
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            region_growing: Box::new(RegionGrowingEstimator::from_config(config)),
            edge_morphology: Box::new(EdgeMorphologyEstimator::from_config(config)),
            color_threshold: Box::new(ColorThresholdEstimator::from_config(config)),
            contour: Box::new(ContourEstimator::new()),
            fallback: CircularFallback::new(config.fallback_radius_divisor),
        }
    }
}

impl fmt::Debug for Estimators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estimators")
            .field("region_growing", &self.region_growing.method())
            .field("edge_morphology", &self.edge_morphology.method())
            .field("color_threshold", &self.color_threshold.method())
            .field("contour", &self.contour.method())
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Background-removed image together with its mask and provenance
#[derive(Debug, Clone)]
pub struct SegmentedImage {
    /// RGBA output, alpha = mask * 255
    pub image: RgbaImage,
    pub mask: Mask,
    /// Methods whose masks contributed to `mask`
    pub methods: Vec<SegmentationMethod>,
}

/// Combines mask estimators according to a segmentation policy
#[derive(Debug)]
pub struct SegmentationEngine {
    estimators: Estimators,
    median_kernel: usize,
}

impl SegmentationEngine {
    /// Create an engine with the default estimators for `config`
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            estimators: Estimators::from_config(config),
            median_kernel: config.median_kernel,
        })
    }

    /// Create an engine from an explicit estimator set
    #[must_use]
    pub fn with_estimators(estimators: Estimators, median_kernel: usize) -> Self {
        Self {
            estimators,
            median_kernel,
        }
    }

    /// Segment `image` and attach the mask as an alpha channel
    pub fn segment(&self, image: &RgbImage, policy: SegmentationPolicy) -> Result<SegmentedImage> {
        let (width, height) = image.dimensions();
        let _span = spans::segmentation(width, height, policy).entered();

        let (mask, methods) = match policy {
            SegmentationPolicy::Cascade => self.cascade(image),
            SegmentationPolicy::Composite => self.composite(image),
        };

        let output = mask.apply_to(image)?;
        info!(
            policy = %policy,
            methods = ?methods,
            foreground_ratio = mask.statistics().foreground_ratio,
            "Segmentation complete"
        );

        Ok(SegmentedImage {
            image: output,
            mask,
            methods,
        })
    }

    fn attempt(estimator: &dyn MaskEstimator, image: &RgbImage) -> MethodOutcome {
        let method = estimator.method();
        let _span = spans::method_attempt(method).entered();
        let outcome = estimator.estimate(image);
        match &outcome {
            Ok(mask) => debug!(
                method = %method,
                foreground = mask.foreground_count(),
                "Mask estimated"
            ),
            Err(failure) => warn!(method = %method, reason = %failure.reason, "Method failed"),
        }
        outcome
    }

    fn cascade(&self, image: &RgbImage) -> (Mask, Vec<SegmentationMethod>) {
        for estimator in [&self.estimators.region_growing, &self.estimators.contour] {
            if let Ok(mask) = Self::attempt(estimator.as_ref(), image) {
                return (mask, vec![estimator.method()]);
            }
        }

        debug!("Falling back to circular mask");
        (
            self.estimators.fallback.mask(image.width(), image.height()),
            vec![SegmentationMethod::CircularFallback],
        )
    }

    fn composite(&self, image: &RgbImage) -> (Mask, Vec<SegmentationMethod>) {
        let (width, height) = image.dimensions();
        let mut combined = Mask::empty(width, height);
        let mut methods = Vec::with_capacity(3);

        for estimator in [
            &self.estimators.region_growing,
            &self.estimators.edge_morphology,
            &self.estimators.color_threshold,
        ] {
            let Ok(mask) = Self::attempt(estimator.as_ref(), image) else {
                continue;
            };
            match combined.union(&mask) {
                Ok(union) => {
                    combined = union;
                    methods.push(estimator.method());
                },
                Err(e) => warn!(
                    method = %estimator.method(),
                    error = %e,
                    "Discarding mask with mismatched dimensions"
                ),
            }
        }

        (morphology::median_filter(&combined, self.median_kernel), methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Estimator returning a fixed outcome and counting its invocations
    struct Scripted {
        method: SegmentationMethod,
        mask: Option<Mask>,
        calls: Arc<AtomicUsize>,
    }

    impl MaskEstimator for Scripted {
        fn method(&self) -> SegmentationMethod {
            self.method
        }

        fn estimate(&self, _image: &RgbImage) -> MethodOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.mask
                .clone()
                .ok_or_else(|| MethodFailure::new(self.method, "scripted failure"))
        }
    }

    fn scripted(
        method: SegmentationMethod,
        mask: Option<Mask>,
    ) -> (Box<dyn MaskEstimator>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let estimator = Scripted {
            method,
            mask,
            calls: Arc::clone(&calls),
        };
        (Box::new(estimator), calls)
    }

    fn block(width: u32, height: u32, x0: u32, x1: u32) -> Mask {
        Mask::from_fn(width, height, |x, y| x >= x0 && x < x1 && y >= 4 && y < 16)
    }

    #[test]
    fn test_cascade_stops_at_first_success() {
        let (rg, rg_calls) = scripted(SegmentationMethod::RegionGrowing, Some(block(20, 20, 4, 16)));
        let (edges, edge_calls) = scripted(SegmentationMethod::EdgeMorphology, None);
        let (color, color_calls) = scripted(SegmentationMethod::ColorThreshold, None);
        let (contour, contour_calls) = scripted(SegmentationMethod::Contour, Some(Mask::empty(20, 20)));

        let engine = SegmentationEngine::with_estimators(
            Estimators {
                region_growing: rg,
                edge_morphology: edges,
                color_threshold: color,
                contour,
                fallback: CircularFallback::new(3),
            },
            5,
        );
        let result = engine
            .segment(&RgbImage::new(20, 20), SegmentationPolicy::Cascade)
            .unwrap();

        assert_eq!(result.methods, vec![SegmentationMethod::RegionGrowing]);
        assert_eq!(result.mask, block(20, 20, 4, 16));
        assert_eq!(rg_calls.load(Ordering::SeqCst), 1);
        assert_eq!(contour_calls.load(Ordering::SeqCst), 0);
        assert_eq!(edge_calls.load(Ordering::SeqCst), 0);
        assert_eq!(color_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cascade_uses_contour_when_region_growing_fails() {
        let (rg, rg_calls) = scripted(SegmentationMethod::RegionGrowing, None);
        let (edges, edge_calls) = scripted(SegmentationMethod::EdgeMorphology, None);
        let (color, color_calls) = scripted(SegmentationMethod::ColorThreshold, None);
        let (contour, contour_calls) =
            scripted(SegmentationMethod::Contour, Some(block(20, 20, 6, 12)));

        let engine = SegmentationEngine::with_estimators(
            Estimators {
                region_growing: rg,
                edge_morphology: edges,
                color_threshold: color,
                contour,
                fallback: CircularFallback::new(3),
            },
            5,
        );
        let result = engine
            .segment(&RgbImage::new(20, 20), SegmentationPolicy::Cascade)
            .unwrap();

        assert_eq!(result.methods, vec![SegmentationMethod::Contour]);
        assert_eq!(result.mask, block(20, 20, 6, 12));
        assert_ne!(result.mask, CircularFallback::new(3).mask(20, 20));
        assert_eq!(rg_calls.load(Ordering::SeqCst), 1);
        assert_eq!(contour_calls.load(Ordering::SeqCst), 1);
        assert_eq!(edge_calls.load(Ordering::SeqCst), 0);
        assert_eq!(color_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cascade_falls_through_to_circle() {
        let (rg, _) = scripted(SegmentationMethod::RegionGrowing, None);
        let (edges, _) = scripted(SegmentationMethod::EdgeMorphology, None);
        let (color, _) = scripted(SegmentationMethod::ColorThreshold, None);
        let (contour, contour_calls) = scripted(SegmentationMethod::Contour, None);

        let engine = SegmentationEngine::with_estimators(
            Estimators {
                region_growing: rg,
                edge_morphology: edges,
                color_threshold: color,
                contour,
                fallback: CircularFallback::new(3),
            },
            5,
        );
        let result = engine
            .segment(&RgbImage::new(30, 30), SegmentationPolicy::Cascade)
            .unwrap();

        assert_eq!(contour_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.methods, vec![SegmentationMethod::CircularFallback]);
        assert_eq!(result.mask, CircularFallback::new(3).mask(30, 30));
    }

    #[test]
    fn test_composite_unions_and_tolerates_failures() {
        let (rg, _) = scripted(SegmentationMethod::RegionGrowing, Some(block(20, 20, 2, 8)));
        let (edges, _) = scripted(SegmentationMethod::EdgeMorphology, None);
        let (color, _) = scripted(SegmentationMethod::ColorThreshold, Some(block(20, 20, 8, 14)));
        let (contour, contour_calls) = scripted(SegmentationMethod::Contour, None);

        let engine = SegmentationEngine::with_estimators(
            Estimators {
                region_growing: rg,
                edge_morphology: edges,
                color_threshold: color,
                contour,
                fallback: CircularFallback::new(3),
            },
            5,
        );
        let result = engine
            .segment(&RgbImage::new(20, 20), SegmentationPolicy::Composite)
            .unwrap();

        assert_eq!(
            result.methods,
            vec![
                SegmentationMethod::RegionGrowing,
                SegmentationMethod::ColorThreshold
            ]
        );
        assert_eq!(contour_calls.load(Ordering::SeqCst), 0);
        let expected = morphology::median_filter(&block(20, 20, 2, 14), 5);
        assert_eq!(result.mask, expected);
        assert!(result.mask.get(8, 10));
    }

    #[test]
    fn test_output_alpha_matches_mask() {
        let image = RgbImage::from_pixel(12, 10, image::Rgb([200, 10, 10]));
        let engine = SegmentationEngine::new(&SegmentationConfig::default()).unwrap();
        let result = engine.segment(&image, SegmentationPolicy::Cascade).unwrap();

        assert_eq!(result.image.dimensions(), (12, 10));
        for (x, y, pixel) in result.image.enumerate_pixels() {
            let expected = if result.mask.get(x, y) { 255 } else { 0 };
            assert_eq!(pixel[3], expected);
        }
    }

    #[test]
    fn test_method_names() {
        assert_eq!(SegmentationMethod::RegionGrowing.to_string(), "region_growing");
        assert_eq!(
            serde_json::to_string(&SegmentationMethod::CircularFallback).unwrap(),
            "\"circular_fallback\""
        );
    }
}
