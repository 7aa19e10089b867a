//! Core types shared by the segmentation and normalization pipelines

use crate::{
    config::SegmentationPolicy,
    error::{PrepError, Result},
    segmentation::SegmentationMethod,
};
use image::{RgbImage, RgbaImage};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Binary foreground mask, 1 = foreground, 0 = background
///
/// Stored row-major as an `(height, width)` array so it lines up with image rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Array2<u8>,
}

impl Mask {
    /// All-background mask
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            data: Array2::zeros((height as usize, width as usize)),
        }
    }

    /// Build a mask by evaluating `is_foreground(x, y)` for every pixel
    #[must_use]
    pub fn from_fn<F>(width: u32, height: u32, is_foreground: F) -> Self
    where
        F: Fn(u32, u32) -> bool,
    {
        let data = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            u8::from(is_foreground(x as u32, y as u32))
        });
        Self { data }
    }

    /// Wrap an array already known to hold only 0 and 1
    pub(crate) fn from_binary(data: Array2<u8>) -> Self {
        debug_assert!(data.iter().all(|&v| v <= 1));
        Self { data }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    /// Mask dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// # Panics
    /// Panics if `(x, y)` lies outside the mask.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[[y as usize, x as usize]] != 0
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<u8> {
        &self.data
    }

    /// Pixel-wise logical OR
    ///
    /// # Errors
    /// Returns an error if the two masks differ in size.
    pub fn union(&self, other: &Mask) -> Result<Mask> {
        if self.dimensions() != other.dimensions() {
            return Err(PrepError::invalid_config(format!(
                "Cannot combine masks of different sizes: {:?} vs {:?}",
                self.dimensions(),
                other.dimensions()
            )));
        }
        let data = Zip::from(&self.data)
            .and(&other.data)
            .map_collect(|&a, &b| a | b);
        Ok(Self { data })
    }

    /// Swap foreground and background
    #[must_use]
    pub fn inverted(&self) -> Mask {
        Self {
            data: self.data.mapv(|v| 1 - v),
        }
    }

    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foreground_count() == 0
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.foreground_count();
        let ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio: ratio,
        }
    }

    /// Combine a colour image with this mask as its alpha channel
    ///
    /// # Errors
    /// Returns an error if the image and the mask differ in size.
    pub fn apply_to(&self, image: &RgbImage) -> Result<RgbaImage> {
        if image.dimensions() != self.dimensions() {
            return Err(PrepError::invalid_config(format!(
                "Image and mask dimensions do not match: {:?} vs {:?}",
                image.dimensions(),
                self.dimensions()
            )));
        }
        Ok(RgbaImage::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b] = image.get_pixel(x, y).0;
            image::Rgba([r, g, b, u8::from(self.get(x, y)) * 255])
        }))
    }
}

/// Statistics about a mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
}

/// Timing breakdown for one background removal call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image loading and decoding from file
    pub image_decode_ms: u64,

    /// Mask estimation, combination and smoothing
    pub segmentation_ms: u64,

    /// RGBA encoding and file write
    pub image_encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

/// Diagnostic record of a successful background removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationReport {
    pub policy: SegmentationPolicy,

    /// Methods whose masks ended up in the output
    pub methods: Vec<SegmentationMethod>,

    /// Image dimensions (width, height)
    pub dimensions: (u32, u32),

    pub foreground_ratio: f32,

    pub output_file_size: u64,

    pub timings: ProcessingTimings,
}

/// Diagnostic record of a successful mesh normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub original_extents: [f64; 3],
    pub new_extents: [f64; 3],
    pub scale_factor: f64,
    pub target_size_mm: f64,
    pub new_max_extent_mm: f64,
    pub vertex_count: usize,
    pub face_count: usize,
    pub is_watertight: bool,
    pub stl_file_size: u64,
}

/// Outcome of one normalization call
pub type NormalizationResult = Result<NormalizationReport>;
