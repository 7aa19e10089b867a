//! Binary morphology on masks with square structuring elements
//!
//! Dilation and erosion ignore out-of-image pixels, so borders neither grow nor
//! shrink the mask. The median filter replicates the border instead.

// Window indices are clamped to the mask dimensions
#![allow(clippy::indexing_slicing)]

use crate::types::Mask;
use ndarray::Array2;

/// 3x3 structuring element used throughout the estimators
pub const KERNEL_3X3: usize = 3;

fn window(center: usize, radius: usize, len: usize) -> std::ops::Range<usize> {
    center.saturating_sub(radius)..(center + radius + 1).min(len)
}

/// Separable max (dilate) or min (erode) filter
fn rank_filter(mask: &Mask, kernel: usize, take_max: bool) -> Mask {
    let src = mask.as_array();
    let (rows, cols) = src.dim();
    let radius = kernel / 2;
    let pick = |values: &mut dyn Iterator<Item = u8>| {
        if take_max {
            values.max().unwrap_or(0)
        } else {
            values.min().unwrap_or(0)
        }
    };

    let horizontal = Array2::from_shape_fn((rows, cols), |(y, x)| {
        pick(&mut window(x, radius, cols).map(|sx| src[[y, sx]]))
    });
    let data = Array2::from_shape_fn((rows, cols), |(y, x)| {
        pick(&mut window(y, radius, rows).map(|sy| horizontal[[sy, x]]))
    });

    Mask::from_binary(data)
}

#[must_use]
pub fn dilate(mask: &Mask, kernel: usize) -> Mask {
    rank_filter(mask, kernel, true)
}

#[must_use]
pub fn erode(mask: &Mask, kernel: usize) -> Mask {
    rank_filter(mask, kernel, false)
}

/// Dilate then erode: closes gaps narrower than the kernel
#[must_use]
pub fn close(mask: &Mask, kernel: usize) -> Mask {
    erode(&dilate(mask, kernel), kernel)
}

/// Erode then dilate: removes specks narrower than the kernel
#[must_use]
pub fn open(mask: &Mask, kernel: usize) -> Mask {
    dilate(&erode(mask, kernel), kernel)
}

/// Median filter with a `kernel x kernel` window and replicated border
///
/// On a binary mask the median is the window majority, so a pixel only becomes
/// foreground when more than half of its window already is.
#[must_use]
pub fn median_filter(mask: &Mask, kernel: usize) -> Mask {
    let src = mask.as_array();
    let (rows, cols) = src.dim();
    if rows == 0 || cols == 0 {
        return mask.clone();
    }
    let radius = (kernel / 2) as i64;
    let majority = kernel * kernel / 2;
    let clamp = |v: i64, len: usize| v.clamp(0, len as i64 - 1) as usize;

    // Column sums over the vertical window, then slide horizontally
    let column_sums = Array2::from_shape_fn((rows, cols), |(y, x)| {
        (-radius..=radius)
            .map(|dy| usize::from(src[[clamp(y as i64 + dy, rows), x]]))
            .sum::<usize>()
    });

    let data = Array2::from_shape_fn((rows, cols), |(y, x)| {
        let count: usize = (-radius..=radius)
            .map(|dx| column_sums[[y, clamp(x as i64 + dx, cols)]])
            .sum();
        u8::from(count > majority)
    });

    Mask::from_binary(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel(width: u32, height: u32, px: u32, py: u32) -> Mask {
        Mask::from_fn(width, height, |x, y| x == px && y == py)
    }

    #[test]
    fn test_dilate_grows_by_radius() {
        let dilated = dilate(&single_pixel(5, 5, 2, 2), KERNEL_3X3);
        assert_eq!(dilated.foreground_count(), 9);
        assert!(dilated.get(1, 1) && dilated.get(3, 3));
        assert!(!dilated.get(0, 0));
    }

    #[test]
    fn test_dilate_at_corner_ignores_border() {
        let dilated = dilate(&single_pixel(4, 4, 0, 0), KERNEL_3X3);
        assert_eq!(dilated.foreground_count(), 4);
    }

    #[test]
    fn test_erode_keeps_full_mask_full() {
        let full = Mask::from_fn(4, 3, |_, _| true);
        assert_eq!(erode(&full, KERNEL_3X3), full);
    }

    #[test]
    fn test_close_fills_single_pixel_gap() {
        let mask = Mask::from_fn(7, 3, |x, _| x != 3);
        let closed = close(&mask, KERNEL_3X3);
        assert!(closed.get(3, 1));
    }

    #[test]
    fn test_open_removes_isolated_pixel() {
        let opened = open(&single_pixel(5, 5, 2, 2), KERNEL_3X3);
        assert!(opened.is_empty());
    }

    #[test]
    fn test_median_removes_speckle() {
        let filtered = median_filter(&single_pixel(9, 9, 4, 4), 5);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_median_keeps_solid_regions() {
        let block = Mask::from_fn(12, 12, |x, y| (2..10).contains(&x) && (2..10).contains(&y));
        let filtered = median_filter(&block, 5);
        assert!(filtered.get(5, 5));
        assert!(filtered.get(2, 5));
        assert!(!filtered.get(0, 0));
    }

    #[test]
    fn test_median_never_adds_isolated_foreground() {
        // Every pixel left on must have had input foreground in its window
        let mask = Mask::from_fn(20, 20, |x, y| (x * 7 + y * 3) % 11 == 0);
        let filtered = median_filter(&mask, 5);
        for y in 0..20 {
            for x in 0..20 {
                if filtered.get(x, y) {
                    let support = (x.saturating_sub(2)..(x + 3).min(20))
                        .flat_map(|sx| (y.saturating_sub(2)..(y + 3).min(20)).map(move |sy| (sx, sy)))
                        .any(|(sx, sy)| mask.get(sx, sy));
                    assert!(support);
                }
            }
        }
    }

    #[test]
    fn test_full_mask_survives_median_at_borders() {
        let full = Mask::from_fn(6, 6, |_, _| true);
        assert_eq!(median_filter(&full, 5), full);
    }
}
