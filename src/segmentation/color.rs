//! Colour-threshold background detection
//!
//! Pixels whose HSV value lies inside any configured backdrop range are
//! background. The remaining pixels form the foreground, closed with a 3x3
//! element to bridge thin gaps.

use super::{filters, morphology, MaskEstimator, MethodFailure, SegmentationMethod};
use crate::{
    config::{HsvRange, SegmentationConfig},
    types::Mask,
};
use image::RgbImage;

#[derive(Debug, Clone)]
pub struct ColorThresholdEstimator {
    ranges: Vec<HsvRange>,
}

impl ColorThresholdEstimator {
    #[must_use]
    pub fn new(ranges: Vec<HsvRange>) -> Self {
        Self { ranges }
    }

    #[must_use]
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(config.background_ranges.clone())
    }

    /// Mask of pixels matching one of the backdrop ranges
    #[must_use]
    pub fn background_mask(&self, image: &RgbImage) -> Mask {
        Mask::from_fn(image.width(), image.height(), |x, y| {
            let hsv = filters::rgb_to_hsv(image.get_pixel(x, y).0);
            self.ranges.iter().any(|range| range.contains(hsv))
        })
    }
}

impl Default for ColorThresholdEstimator {
    fn default() -> Self {
        Self::new(vec![HsvRange::WHITE, HsvRange::LIGHT_GRAY])
    }
}

impl MaskEstimator for ColorThresholdEstimator {
    fn method(&self) -> SegmentationMethod {
        SegmentationMethod::ColorThreshold
    }

    fn estimate(&self, image: &RgbImage) -> Result<Mask, MethodFailure> {
        let foreground = self.background_mask(image).inverted();
        Ok(morphology::close(&foreground, morphology::KERNEL_3X3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_white_and_light_gray_are_background() {
        let image = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([250, 250, 250]),
            1 => Rgb([200, 200, 205]),
            _ => Rgb([180, 30, 30]),
        });
        let background = ColorThresholdEstimator::default().background_mask(&image);
        assert!(background.get(0, 0));
        assert!(background.get(1, 0));
        assert!(!background.get(2, 0));
    }

    #[test]
    fn test_estimate_marks_colored_subject() {
        let image = RgbImage::from_fn(20, 20, |x, y| {
            if (6..14).contains(&x) && (6..14).contains(&y) {
                Rgb([30, 90, 200])
            } else {
                Rgb([245, 245, 245])
            }
        });
        let mask = ColorThresholdEstimator::default().estimate(&image).unwrap();
        assert!(mask.get(10, 10));
        assert!(mask.get(6, 6));
        assert!(!mask.get(0, 0));
        assert!(!mask.get(19, 3));
        assert_eq!(mask.foreground_count(), 64);
    }

    #[test]
    fn test_no_ranges_means_everything_is_foreground() {
        let image = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));
        let mask = ColorThresholdEstimator::new(Vec::new()).estimate(&image).unwrap();
        assert_eq!(mask.foreground_count(), 25);
    }
}
