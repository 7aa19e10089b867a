//! Edge-and-morphology mask
//!
//! Canny edges of the grayscale image, closed and dilated with a 3x3 element.
//! Only meaningful as an extra signal in composite mode: it marks outlines, not
//! filled regions.

// Gradient and strength grids share the image dimensions; neighbours are clamped
#![allow(clippy::indexing_slicing)]

use super::{filters, morphology, MaskEstimator, MethodFailure, SegmentationMethod};
use crate::{config::SegmentationConfig, types::Mask};
use image::{GrayImage, RgbImage};
use ndarray::Array2;

#[derive(Debug, Clone)]
pub struct EdgeMorphologyEstimator {
    low_threshold: f32,
    high_threshold: f32,
}

impl EdgeMorphologyEstimator {
    #[must_use]
    pub fn new(low_threshold: f32, high_threshold: f32) -> Self {
        Self {
            low_threshold,
            high_threshold,
        }
    }

    #[must_use]
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(config.canny_low, config.canny_high)
    }
}

impl MaskEstimator for EdgeMorphologyEstimator {
    fn method(&self) -> SegmentationMethod {
        SegmentationMethod::EdgeMorphology
    }

    fn estimate(&self, image: &RgbImage) -> Result<Mask, MethodFailure> {
        let gray = filters::to_grayscale(image);
        let edges = canny(&gray, self.low_threshold, self.high_threshold);
        let closed = morphology::close(&edges, morphology::KERNEL_3X3);
        Ok(morphology::dilate(&closed, morphology::KERNEL_3X3))
    }
}

/// Quantised gradient direction used by non-maximum suppression
#[derive(Clone, Copy)]
enum Direction {
    Horizontal,
    Vertical,
    Diagonal,
    AntiDiagonal,
}

impl Direction {
    /// Classify the gradient `(gx, gy)` into one of four 45 degree sectors
    fn of(gx: f32, gy: f32) -> Self {
        // tan(22.5) and tan(67.5)
        const TAN_22_5: f32 = 0.414_213_56;
        const TAN_67_5: f32 = 2.414_213_6;
        let (ax, ay) = (gx.abs(), gy.abs());
        if ay <= ax * TAN_22_5 {
            Self::Horizontal
        } else if ay >= ax * TAN_67_5 {
            Self::Vertical
        } else if (gx > 0.0) == (gy > 0.0) {
            Self::Diagonal
        } else {
            Self::AntiDiagonal
        }
    }

    /// Neighbour offsets along the gradient
    fn offsets(self) -> [(i64, i64); 2] {
        match self {
            Self::Horizontal => [(-1, 0), (1, 0)],
            Self::Vertical => [(0, -1), (0, 1)],
            Self::Diagonal => [(-1, -1), (1, 1)],
            Self::AntiDiagonal => [(1, -1), (-1, 1)],
        }
    }
}

/// Canny edge detector: 3x3 Sobel, L1 magnitude, non-maximum suppression and
/// hysteresis thresholding with 8-connectivity
#[must_use]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> Mask {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w < 3 || h < 3 {
        return Mask::empty(width, height);
    }

    let px = |x: usize, y: usize| f32::from(image.get_pixel(x as u32, y as u32)[0]);
    let mut gradients = Array2::<(f32, f32)>::from_elem((h, w), (0.0, 0.0));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            gradients[[y, x]] = (gx, gy);
        }
    }
    let magnitude = gradients.mapv(|(gx, gy)| gx.abs() + gy.abs());

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut strength = Array2::<u8>::zeros((h, w));
    let mut stack = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = magnitude[[y, x]];
            if m <= low {
                continue;
            }
            let (gx, gy) = gradients[[y, x]];
            let [(ax, ay), (bx, by)] = Direction::of(gx, gy).offsets();
            let before = magnitude[[(y as i64 + ay) as usize, (x as i64 + ax) as usize]];
            let after = magnitude[[(y as i64 + by) as usize, (x as i64 + bx) as usize]];
            if m < before || m <= after {
                continue;
            }
            if m > high {
                strength[[y, x]] = 2;
                stack.push((x, y));
            } else {
                strength[[y, x]] = 1;
            }
        }
    }

    // Promote weak pixels connected to strong ones
    while let Some((x, y)) = stack.pop() {
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                if strength[[ny, nx]] == 1 {
                    strength[[ny, nx]] = 2;
                    stack.push((nx, ny));
                }
            }
        }
    }

    Mask::from_binary(strength.mapv(|s| u8::from(s == 2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn step_image() -> GrayImage {
        GrayImage::from_fn(20, 12, |x, _| if x < 10 { Luma([20]) } else { Luma([220]) })
    }

    #[test]
    fn test_canny_finds_vertical_step() {
        let edges = canny(&step_image(), 50.0, 150.0);
        assert!(!edges.is_empty());
        for y in 1..11 {
            let row: Vec<u32> = (0..20).filter(|&x| edges.get(x, y)).collect();
            assert!(!row.is_empty());
            assert!(row.iter().all(|&x| (9..=10).contains(&x)));
        }
    }

    #[test]
    fn test_canny_ignores_flat_image() {
        let flat = GrayImage::from_pixel(16, 16, Luma([128]));
        assert!(canny(&flat, 50.0, 150.0).is_empty());
    }

    #[test]
    fn test_canny_high_threshold_rejects_faint_edges() {
        // Step of 30 gives an L1 magnitude of 120 on the edge
        let faint = GrayImage::from_fn(20, 12, |x, _| if x < 10 { Luma([100]) } else { Luma([130]) });
        assert!(canny(&faint, 50.0, 150.0).is_empty());
        assert!(!canny(&faint, 50.0, 100.0).is_empty());
    }

    #[test]
    fn test_estimate_thickens_edges() {
        let image = RgbImage::from_fn(20, 12, |x, _| {
            if x < 10 {
                image::Rgb([20, 20, 20])
            } else {
                image::Rgb([220, 220, 220])
            }
        });
        let mask = EdgeMorphologyEstimator::new(50.0, 150.0)
            .estimate(&image)
            .unwrap();
        assert!(mask.get(8, 6) || mask.get(11, 6));
        assert!(!mask.get(0, 6));
        assert!(!mask.get(19, 6));
    }

    #[test]
    fn test_tiny_image_has_no_edges() {
        let mask = canny(&GrayImage::new(2, 2), 50.0, 150.0);
        assert_eq!(mask.dimensions(), (2, 2));
        assert!(mask.is_empty());
    }
}
