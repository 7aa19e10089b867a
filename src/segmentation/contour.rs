//! Contour-based threshold segmentation
//!
//! Blur, binarise with Otsu's threshold, then keep the connected component
//! whose outline encloses the largest area. The kept component is filled,
//! closed and opened.

// Label grids share the mask dimensions; label vectors cover every label
#![allow(clippy::indexing_slicing)]

use super::{filters, morphology, MaskEstimator, MethodFailure, SegmentationMethod};
use crate::types::Mask;
use image::{GrayImage, RgbImage};
use ndarray::Array2;
use std::{cmp::Reverse, collections::VecDeque};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct ContourEstimator;

impl ContourEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MaskEstimator for ContourEstimator {
    fn method(&self) -> SegmentationMethod {
        SegmentationMethod::Contour
    }

    fn estimate(&self, image: &RgbImage) -> Result<Mask, MethodFailure> {
        let blurred = filters::gaussian_blur_5x5(&filters::to_grayscale(image));
        let threshold = filters::otsu_threshold(&blurred);
        let binary = binarize(&blurred, threshold);
        trace!(threshold, foreground = binary.foreground_count(), "Otsu binarisation");

        let largest = largest_filled_component(&binary).ok_or_else(|| {
            MethodFailure::new(SegmentationMethod::Contour, "no contours found")
        })?;

        let closed = morphology::close(&largest, morphology::KERNEL_3X3);
        Ok(morphology::open(&closed, morphology::KERNEL_3X3))
    }
}

/// `value > threshold` becomes foreground
#[must_use]
pub fn binarize(image: &GrayImage, threshold: u8) -> Mask {
    Mask::from_fn(image.width(), image.height(), |x, y| {
        image.get_pixel(x, y)[0] > threshold
    })
}

/// Connected-component labelling of a binary grid
struct Labeling {
    /// Label per pixel, 0 where the pixel belongs to no region
    labels: Array2<u32>,
    /// Pixel count per label; index 0 is unused
    sizes: Vec<usize>,
    /// First pixel of each label in raster order `(row, col)`
    firsts: Vec<(usize, usize)>,
}

impl Labeling {
    fn new(rows: usize, cols: usize, reserved: usize) -> Self {
        Self {
            labels: Array2::zeros((rows, cols)),
            sizes: vec![0; reserved],
            firsts: vec![(0, 0); reserved],
        }
    }

    fn count(&self) -> u32 {
        (self.sizes.len() - 1) as u32
    }

    /// Start a new label at `(y, x)` and grow it with `flood`
    fn grow<F>(&mut self, y: usize, x: usize, queue: &mut VecDeque<(usize, usize)>, flood: F)
    where
        F: FnOnce(&mut Array2<u32>, &mut VecDeque<(usize, usize)>, u32) -> usize,
    {
        let label = self.sizes.len() as u32;
        self.labels[[y, x]] = label;
        queue.push_back((y, x));
        self.firsts.push((y, x));
        let size = flood(&mut self.labels, queue, label);
        self.sizes.push(size);
    }
}

/// Background label shared by every region connected to the image border
const OUTSIDE: u32 = 1;

/// Label 8-connected foreground components in raster order
fn label_components(mask: &Mask) -> Labeling {
    let src = mask.as_array();
    let (rows, cols) = src.dim();
    let mut labeling = Labeling::new(rows, cols, 1);
    let mut queue = VecDeque::new();

    for y in 0..rows {
        for x in 0..cols {
            if src[[y, x]] == 0 || labeling.labels[[y, x]] != 0 {
                continue;
            }
            labeling.grow(y, x, &mut queue, |labels, queue, label| {
                let mut size = 0;
                while let Some((cy, cx)) = queue.pop_front() {
                    size += 1;
                    for ny in cy.saturating_sub(1)..=(cy + 1).min(rows - 1) {
                        for nx in cx.saturating_sub(1)..=(cx + 1).min(cols - 1) {
                            if src[[ny, nx]] != 0 && labels[[ny, nx]] == 0 {
                                labels[[ny, nx]] = label;
                                queue.push_back((ny, nx));
                            }
                        }
                    }
                }
                size
            });
        }
    }

    labeling
}

/// 4-connected flood over unlabelled background pixels; returns the number of
/// pixels taken, including those already queued
fn flood_background(
    components: &Array2<u32>,
    labels: &mut Array2<u32>,
    queue: &mut VecDeque<(usize, usize)>,
    label: u32,
) -> usize {
    let (rows, cols) = components.dim();
    let mut size = 0;
    while let Some((y, x)) = queue.pop_front() {
        size += 1;
        let neighbors = [
            (y.wrapping_sub(1), x),
            (y + 1, x),
            (y, x.wrapping_sub(1)),
            (y, x + 1),
        ];
        for (ny, nx) in neighbors {
            if ny < rows && nx < cols && components[[ny, nx]] == 0 && labels[[ny, nx]] == 0 {
                labels[[ny, nx]] = label;
                queue.push_back((ny, nx));
            }
        }
    }
    size
}

/// Label 4-connected background regions
///
/// Everything reachable from the border is [`OUTSIDE`]; every other label is
/// a hole enclosed by some component.
fn label_background(components: &Array2<u32>) -> Labeling {
    let (rows, cols) = components.dim();
    let mut labeling = Labeling::new(rows, cols, 2);
    let mut queue = VecDeque::new();

    let border = (0..cols)
        .flat_map(|x| [(0, x), (rows - 1, x)])
        .chain((0..rows).flat_map(|y| [(y, 0), (y, cols - 1)]));
    for (y, x) in border {
        if components[[y, x]] == 0 && labeling.labels[[y, x]] == 0 {
            labeling.labels[[y, x]] = OUTSIDE;
            queue.push_back((y, x));
        }
    }
    labeling.sizes[OUTSIDE as usize] =
        flood_background(components, &mut labeling.labels, &mut queue, OUTSIDE);

    for y in 0..rows {
        for x in 0..cols {
            if components[[y, x]] == 0 && labeling.labels[[y, x]] == 0 {
                labeling.grow(y, x, &mut queue, |labels, queue, label| {
                    flood_background(components, labels, queue, label)
                });
            }
        }
    }

    labeling
}

/// Area enclosed by each component's outer boundary, indexed by label
///
/// Components and holes form a containment tree. The pixel directly above
/// the first raster pixel of a component lies in the region surrounding it,
/// and the pixel above the first pixel of a hole lies in the component that
/// encloses it, so parents always start before their children. Summing
/// sizes in reverse raster order of first pixels visits every child before
/// its parent.
fn enclosed_areas(components: &Labeling, background: &Labeling) -> Vec<usize> {
    enum Node {
        Component(u32),
        Hole(u32),
    }

    let mut nodes: Vec<((usize, usize), Node)> = (1..=components.count())
        .map(|label| (components.firsts[label as usize], Node::Component(label)))
        .chain(
            (OUTSIDE + 1..=background.count())
                .map(|label| (background.firsts[label as usize], Node::Hole(label))),
        )
        .collect();
    nodes.sort_unstable_by_key(|&(first, _)| Reverse(first));

    let mut component_area = components.sizes.clone();
    let mut hole_area = background.sizes.clone();
    for ((y, x), node) in nodes {
        let Some(above) = y.checked_sub(1) else {
            continue;
        };
        match node {
            Node::Component(label) => {
                let parent = background.labels[[above, x]] as usize;
                if parent > OUTSIDE as usize {
                    hole_area[parent] += component_area[label as usize];
                }
            },
            Node::Hole(label) => {
                let parent = components.labels[[above, x]] as usize;
                component_area[parent] += hole_area[label as usize];
            },
        }
    }

    component_area
}

/// The region enclosed by a component: the component plus every pixel not
/// 4-reachable from the image border without crossing it
fn fill_enclosed(labels: &Array2<u32>, label: u32) -> Array2<u8> {
    let (rows, cols) = labels.dim();
    let mut outside = Array2::<bool>::from_elem((rows, cols), false);
    let mut queue = VecDeque::new();

    let seed = |y: usize, x: usize, outside: &mut Array2<bool>, queue: &mut VecDeque<_>| {
        if labels[[y, x]] != label && !outside[[y, x]] {
            outside[[y, x]] = true;
            queue.push_back((y, x));
        }
    };
    for x in 0..cols {
        seed(0, x, &mut outside, &mut queue);
        seed(rows - 1, x, &mut outside, &mut queue);
    }
    for y in 0..rows {
        seed(y, 0, &mut outside, &mut queue);
        seed(y, cols - 1, &mut outside, &mut queue);
    }

    while let Some((y, x)) = queue.pop_front() {
        let neighbors = [
            (y.wrapping_sub(1), x),
            (y + 1, x),
            (y, x.wrapping_sub(1)),
            (y, x + 1),
        ];
        for (ny, nx) in neighbors {
            if ny < rows && nx < cols && labels[[ny, nx]] != label && !outside[[ny, nx]] {
                outside[[ny, nx]] = true;
                queue.push_back((ny, nx));
            }
        }
    }

    outside.mapv(|o| u8::from(!o))
}

/// Keep the component whose outline encloses the largest area, filled
///
/// Runs in time linear in the pixel count. Returns `None` when the mask has
/// no foreground.
#[must_use]
pub fn largest_filled_component(mask: &Mask) -> Option<Mask> {
    let components = label_components(mask);
    if components.count() == 0 {
        return None;
    }
    let background = label_background(&components.labels);
    let areas = enclosed_areas(&components, &background);

    // First component wins ties
    let winner = (1..=components.count()).fold(1, |best, label| {
        if areas[label as usize] > areas[best as usize] {
            label
        } else {
            best
        }
    });
    trace!(
        components = components.count(),
        holes = background.count() - OUTSIDE,
        area = areas[winner as usize],
        "Largest enclosed component"
    );

    Some(Mask::from_binary(fill_enclosed(&components.labels, winner)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_ring_is_filled() {
        let ring = Mask::from_fn(11, 11, |x, y| {
            let on_x = x == 2 || x == 8;
            let on_y = y == 2 || y == 8;
            ((2..=8).contains(&x) && on_y) || ((2..=8).contains(&y) && on_x)
        });
        let filled = largest_filled_component(&ring).unwrap();
        assert!(filled.get(5, 5));
        assert_eq!(filled.foreground_count(), 49);
    }

    #[test]
    fn test_largest_area_wins_over_pixel_count() {
        // A thin ring enclosing a large area beats a small solid block
        let mask = Mask::from_fn(30, 30, |x, y| {
            let ring = ((1..=20).contains(&x) && (y == 1 || y == 20))
                || ((1..=20).contains(&y) && (x == 1 || x == 20));
            let block = (23..29).contains(&x) && (23..29).contains(&y);
            ring || block
        });
        let largest = largest_filled_component(&mask).unwrap();
        assert!(largest.get(10, 10));
        assert!(!largest.get(25, 25));
    }

    fn square_ring(x0: u32, y0: u32, size: u32) -> impl Fn(u32, u32) -> bool {
        move |x, y| {
            let (x1, y1) = (x0 + size - 1, y0 + size - 1);
            ((x0..=x1).contains(&x) && (y == y0 || y == y1))
                || ((y0..=y1).contains(&y) && (x == x0 || x == x1))
        }
    }

    #[test]
    fn test_enclosed_areas_match_flood_fill() {
        // Ring inside a ring inside a ring, plus a dot in the middle and one outside
        let outer = square_ring(1, 1, 20);
        let middle = square_ring(4, 4, 14);
        let inner = square_ring(7, 7, 8);
        let mask = Mask::from_fn(26, 24, |x, y| {
            outer(x, y) || middle(x, y) || inner(x, y) || (x, y) == (10, 10) || (x, y) == (24, 22)
        });

        let components = label_components(&mask);
        assert_eq!(components.count(), 5);
        let background = label_background(&components.labels);
        let areas = enclosed_areas(&components, &background);
        for label in 1..=components.count() {
            let flooded = fill_enclosed(&components.labels, label);
            let expected = flooded.iter().filter(|&&v| v != 0).count();
            assert_eq!(areas[label as usize], expected, "component {label}");
        }

        let largest = largest_filled_component(&mask).unwrap();
        assert_eq!(largest.foreground_count(), 400);
        assert!(largest.get(10, 10));
        assert!(!largest.get(24, 22));
    }

    #[test]
    fn test_many_components_stay_linear() {
        // One dot every fourth pixel: 22 500 components
        let dots = Mask::from_fn(600, 600, |x, y| x % 4 == 0 && y % 4 == 0);
        let largest = largest_filled_component(&dots).unwrap();
        assert_eq!(largest.foreground_count(), 1);
        assert!(largest.get(0, 0));

        let dotted = RgbImage::from_fn(800, 600, |x, y| {
            if x % 4 == 0 && y % 4 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([10, 10, 10])
            }
        });
        assert!(ContourEstimator::new().estimate(&dotted).is_ok());
    }

    #[test]
    fn test_empty_mask_has_no_component() {
        assert!(largest_filled_component(&Mask::empty(5, 5)).is_none());
    }

    #[test]
    fn test_estimate_picks_bright_subject() {
        let image = RgbImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (12..28).contains(&y) {
                Rgb([230, 220, 210])
            } else {
                Rgb([20, 25, 30])
            }
        });
        let mask = ContourEstimator::new().estimate(&image).unwrap();
        assert!(mask.get(20, 20));
        assert!(!mask.get(2, 2));
        assert!(!mask.get(37, 37));
    }

    #[test]
    fn test_uniform_black_image_fails() {
        let image = RgbImage::new(16, 16);
        let failure = ContourEstimator::new().estimate(&image).unwrap_err();
        assert_eq!(failure.method, SegmentationMethod::Contour);
        assert!(failure.reason.contains("no contours"));
    }
}
