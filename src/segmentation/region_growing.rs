//! Region-growing foreground/background estimation
//!
//! A GrabCut-style estimator: a central rectangle seeds the labelling, two
//! Gaussian-mixture colour models are fitted to the foreground and background
//! samples, and probable pixels are re-labelled by minimising a data cost
//! (negative log-likelihood) plus a contrast-sensitive smoothness cost over the
//! 8-neighbourhood. Each iteration re-fits the models to the new labelling.
//!
//! The labelling pass is an iterated-conditional-modes sweep rather than an
//! exact min-cut.

// Pixel, component and neighbour indices are bounded by the image grid
#![allow(clippy::indexing_slicing)]

use super::{MaskEstimator, MethodFailure, SegmentationMethod};
use crate::{config::SegmentationConfig, types::Mask};
use glam::{DMat3, DVec3};
use image::RgbImage;
use tracing::{debug, trace};

/// Regularisation added to every covariance diagonal
const VARIANCE_EPSILON: f64 = 0.01;

/// Lloyd iterations used to seed the mixtures
const KMEANS_ITERATIONS: usize = 10;

/// Cost assigned when a colour has zero likelihood under a model
const MAX_DATA_COST: f64 = 700.0;

/// Per-pixel label, numbered like the usual GrabCut mask values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PixelLabel {
    Background = 0,
    Foreground = 1,
    ProbableBackground = 2,
    ProbableForeground = 3,
}

impl PixelLabel {
    #[must_use]
    pub fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground | Self::ProbableForeground)
    }

    #[must_use]
    pub fn is_certain(self) -> bool {
        matches!(self, Self::Foreground | Self::Background)
    }
}

/// Initial foreground rectangle, `[x0, x1) x [y0, y1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl SeedRect {
    /// Rectangle leaving `margin * width` / `margin * height` pixels on each side
    #[must_use]
    pub fn centered(width: u32, height: u32, margin: f64) -> Self {
        let margin_x = (f64::from(width) * margin) as u32;
        let margin_y = (f64::from(height) * margin) as u32;
        Self {
            x0: margin_x,
            y0: margin_y,
            x1: width.saturating_sub(margin_x),
            y1: height.saturating_sub(margin_y),
        }
    }

    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.x1.saturating_sub(self.x0)) * u64::from(self.y1.saturating_sub(self.y0))
    }
}

/// One full-covariance component of a colour mixture
#[derive(Debug, Clone)]
struct Gaussian {
    weight: f64,
    mean: DVec3,
    inverse_covariance: DMat3,
    /// `weight / sqrt(det(covariance))`
    scale: f64,
}

impl Gaussian {
    /// Weighted density, `weight * N(color | mean, covariance)` up to a constant
    fn density(&self, color: DVec3) -> f64 {
        let d = color - self.mean;
        self.scale * (-0.5 * d.dot(self.inverse_covariance * d)).exp()
    }
}

/// Gaussian mixture over RGB colours
#[derive(Debug, Clone)]
struct ColorModel {
    components: Vec<Option<Gaussian>>,
}

fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

impl ColorModel {
    /// Fit one Gaussian per assignment bucket; empty buckets stay vacant
    fn fit(samples: &[DVec3], assignments: &[usize], k: usize) -> Result<Self, String> {
        let mut counts = vec![0usize; k];
        let mut sums = vec![DVec3::ZERO; k];
        let mut products = vec![DMat3::ZERO; k];

        for (&color, &component) in samples.iter().zip(assignments) {
            counts[component] += 1;
            sums[component] += color;
            products[component] += outer(color, color);
        }

        let total = samples.len() as f64;
        let mut components = Vec::with_capacity(k);
        for i in 0..k {
            if counts[i] == 0 {
                components.push(None);
                continue;
            }
            let n = counts[i] as f64;
            let mean = sums[i] / n;
            let covariance =
                products[i] / n - outer(mean, mean) + DMat3::from_diagonal(DVec3::splat(VARIANCE_EPSILON));
            let determinant = covariance.determinant();
            if !determinant.is_finite() || determinant <= f64::EPSILON {
                return Err(format!(
                    "colour model component {} is singular (det = {:e})",
                    i, determinant
                ));
            }
            let weight = n / total;
            components.push(Some(Gaussian {
                weight,
                mean,
                inverse_covariance: covariance.inverse(),
                scale: weight / determinant.sqrt(),
            }));
        }

        if components.iter().all(Option::is_none) {
            return Err("colour model has no samples".to_string());
        }
        Ok(Self { components })
    }

    fn likelihood(&self, color: DVec3) -> f64 {
        self.components
            .iter()
            .flatten()
            .map(|g| g.density(color))
            .sum()
    }

    fn most_likely_component(&self, color: DVec3) -> usize {
        let mut best = 0;
        let mut best_density = f64::NEG_INFINITY;
        for (i, component) in self.components.iter().enumerate() {
            if let Some(g) = component {
                let density = g.density(color) / g.weight;
                if density > best_density {
                    best_density = density;
                    best = i;
                }
            }
        }
        best
    }

    fn data_cost(&self, color: DVec3) -> f64 {
        let likelihood = self.likelihood(color);
        if likelihood > 0.0 {
            (-likelihood.ln()).min(MAX_DATA_COST)
        } else {
            MAX_DATA_COST
        }
    }
}

fn luminance(color: DVec3) -> f64 {
    0.299 * color.x + 0.587 * color.y + 0.114 * color.z
}

/// Deterministic k-means: centres seeded at luminance quantiles
fn kmeans_assignments(samples: &[DVec3], k: usize) -> Vec<usize> {
    let k = k.min(samples.len()).max(1);
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| luminance(samples[a]).total_cmp(&luminance(samples[b])));

    let mut centers: Vec<DVec3> = (0..k)
        .map(|i| samples[order[(2 * i + 1) * samples.len() / (2 * k)]])
        .collect();
    let mut assignments = vec![0usize; samples.len()];

    for _ in 0..KMEANS_ITERATIONS {
        for (assignment, &color) in assignments.iter_mut().zip(samples) {
            *assignment = centers
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.distance_squared(color).total_cmp(&b.distance_squared(color))
                })
                .map_or(0, |(i, _)| i);
        }

        let mut sums = vec![DVec3::ZERO; k];
        let mut counts = vec![0usize; k];
        for (&assignment, &color) in assignments.iter().zip(samples) {
            sums[assignment] += color;
            counts[assignment] += 1;
        }
        for i in 0..k {
            if counts[i] > 0 {
                centers[i] = sums[i] / counts[i] as f64;
            }
        }
    }

    assignments
}

/// Smoothness weights towards the four "forward" neighbours of each pixel:
/// right, down-left, down, down-right
struct NeighborWeights {
    width: usize,
    height: usize,
    forward: Vec<[f64; 4]>,
}

impl NeighborWeights {
    const OFFSETS: [(i64, i64); 4] = [(1, 0), (-1, 1), (0, 1), (1, 1)];

    fn new(colors: &[DVec3], width: usize, height: usize, gamma: f64) -> Self {
        let in_bounds = |x: i64, y: i64| x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height;

        let mut total = 0.0;
        let mut pairs = 0usize;
        for y in 0..height {
            for x in 0..width {
                let here = colors[y * width + x];
                for (dx, dy) in Self::OFFSETS {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if in_bounds(nx, ny) {
                        total += here.distance_squared(colors[ny as usize * width + nx as usize]);
                        pairs += 1;
                    }
                }
            }
        }
        let beta = if pairs == 0 || total <= f64::EPSILON {
            0.0
        } else {
            1.0 / (2.0 * total / pairs as f64)
        };

        let mut forward = vec![[0.0; 4]; width * height];
        for y in 0..height {
            for x in 0..width {
                let here = colors[y * width + x];
                for (slot, (dx, dy)) in Self::OFFSETS.into_iter().enumerate() {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if in_bounds(nx, ny) {
                        let diff = here.distance_squared(colors[ny as usize * width + nx as usize]);
                        let distance = if dx != 0 && dy != 0 {
                            std::f64::consts::SQRT_2
                        } else {
                            1.0
                        };
                        forward[y * width + x][slot] = gamma / distance * (-beta * diff).exp();
                    }
                }
            }
        }

        Self {
            width,
            height,
            forward,
        }
    }

    /// All neighbours of `(x, y)` with the weight of the connecting edge
    fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (w, h) = (self.width as i64, self.height as i64);
        let (xi, yi) = (x as i64, y as i64);
        let index = y * self.width + x;

        let forward = Self::OFFSETS
            .into_iter()
            .enumerate()
            .filter_map(move |(slot, (dx, dy))| {
                let (nx, ny) = (xi + dx, yi + dy);
                (nx >= 0 && nx < w && ny < h)
                    .then(|| (ny as usize * self.width + nx as usize, self.forward[index][slot]))
            });
        let backward = Self::OFFSETS
            .into_iter()
            .enumerate()
            .filter_map(move |(slot, (dx, dy))| {
                let (nx, ny) = (xi - dx, yi - dy);
                (nx >= 0 && nx < w && ny >= 0).then(|| {
                    let neighbor = ny as usize * self.width + nx as usize;
                    (neighbor, self.forward[neighbor][slot])
                })
            });
        forward.chain(backward)
    }
}

/// GrabCut-style estimator seeded with a central rectangle
#[derive(Debug, Clone)]
pub struct RegionGrowingEstimator {
    margin: f64,
    iterations: usize,
    components: usize,
    smoothness: f64,
}

impl RegionGrowingEstimator {
    #[must_use]
    pub fn new(margin: f64, iterations: usize, components: usize, smoothness: f64) -> Self {
        Self {
            margin,
            iterations,
            components,
            smoothness,
        }
    }

    #[must_use]
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(
            config.rect_margin,
            config.iterations,
            config.gmm_components,
            config.smoothness,
        )
    }

    fn failure(reason: impl Into<String>) -> MethodFailure {
        MethodFailure::new(SegmentationMethod::RegionGrowing, reason)
    }

    /// Run the estimator and return the final per-pixel labels
    pub fn label(&self, image: &RgbImage) -> Result<Vec<PixelLabel>, MethodFailure> {
        let (width, height) = image.dimensions();
        let rect = SeedRect::centered(width, height, self.margin);
        let total = u64::from(width) * u64::from(height);

        if rect.area() == 0 {
            return Err(Self::failure(format!(
                "seed rectangle is empty for a {}x{} image",
                width, height
            )));
        }
        if rect.area() == total {
            return Err(Self::failure(format!(
                "seed rectangle leaves no background samples for a {}x{} image",
                width, height
            )));
        }

        let (w, h) = (width as usize, height as usize);
        let colors: Vec<DVec3> = image
            .pixels()
            .map(|p| DVec3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])))
            .collect();
        let mut labels: Vec<PixelLabel> = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .map(|(x, y)| {
                if rect.contains(x as u32, y as u32) {
                    PixelLabel::ProbableForeground
                } else {
                    PixelLabel::Background
                }
            })
            .collect();

        let weights = NeighborWeights::new(&colors, w, h, self.smoothness);
        let mut models: Option<(ColorModel, ColorModel)> = None;

        for iteration in 0..self.iterations {
            let (fg_samples, bg_samples): (Vec<DVec3>, Vec<DVec3>) = {
                let mut fg = Vec::new();
                let mut bg = Vec::new();
                for (color, label) in colors.iter().zip(&labels) {
                    if label.is_foreground() {
                        fg.push(*color);
                    } else {
                        bg.push(*color);
                    }
                }
                (fg, bg)
            };
            if fg_samples.is_empty() {
                return Err(Self::failure(format!(
                    "no foreground samples left after {} iteration(s)",
                    iteration
                )));
            }
            if bg_samples.is_empty() {
                return Err(Self::failure("no background samples"));
            }

            let (fg_assign, bg_assign) = match &models {
                None => (
                    kmeans_assignments(&fg_samples, self.components),
                    kmeans_assignments(&bg_samples, self.components),
                ),
                Some((fg_model, bg_model)) => (
                    fg_samples
                        .iter()
                        .map(|&c| fg_model.most_likely_component(c))
                        .collect(),
                    bg_samples
                        .iter()
                        .map(|&c| bg_model.most_likely_component(c))
                        .collect(),
                ),
            };

            let fg_model = ColorModel::fit(&fg_samples, &fg_assign, self.components)
                .map_err(|e| Self::failure(format!("foreground {}", e)))?;
            let bg_model = ColorModel::fit(&bg_samples, &bg_assign, self.components)
                .map_err(|e| Self::failure(format!("background {}", e)))?;

            let mut changed = 0usize;
            for y in 0..h {
                for x in 0..w {
                    let index = y * w + x;
                    if labels[index].is_certain() {
                        continue;
                    }
                    let color = colors[index];
                    let mut fg_cost = fg_model.data_cost(color);
                    let mut bg_cost = bg_model.data_cost(color);
                    if !fg_cost.is_finite() || !bg_cost.is_finite() {
                        return Err(Self::failure("non-finite data cost"));
                    }
                    for (neighbor, weight) in weights.neighbors(x, y) {
                        if labels[neighbor].is_foreground() {
                            bg_cost += weight;
                        } else {
                            fg_cost += weight;
                        }
                    }
                    let next = if fg_cost <= bg_cost {
                        PixelLabel::ProbableForeground
                    } else {
                        PixelLabel::ProbableBackground
                    };
                    if next != labels[index] {
                        changed += 1;
                        labels[index] = next;
                    }
                }
            }
            trace!(iteration, changed, "Region growing sweep");
            models = Some((fg_model, bg_model));
        }

        Ok(labels)
    }
}

impl MaskEstimator for RegionGrowingEstimator {
    fn method(&self) -> SegmentationMethod {
        SegmentationMethod::RegionGrowing
    }

    fn estimate(&self, image: &RgbImage) -> Result<Mask, MethodFailure> {
        let labels = self.label(image)?;
        let width = image.width() as usize;
        let mask = Mask::from_fn(image.width(), image.height(), |x, y| {
            labels[y as usize * width + x as usize].is_foreground()
        });
        debug!(
            foreground = mask.foreground_count(),
            "Region growing produced mask"
        );
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Light backdrop with a dark centred square
    fn studio_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let inside = x >= width / 3 && x < 2 * width / 3 && y >= height / 3 && y < 2 * height / 3;
            if inside {
                Rgb([40 + (x % 5) as u8, 60, 90 + (y % 3) as u8])
            } else {
                Rgb([236, 236, 238])
            }
        })
    }

    #[test]
    fn test_seed_rect_margins() {
        let rect = SeedRect::centered(800, 600, 0.1);
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (80, 60, 720, 540));

        let rect = SeedRect::centered(800, 600, 0.125);
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (100, 75, 700, 525));
        assert!(rect.contains(100, 75));
        assert!(!rect.contains(700, 300));
    }

    #[test]
    fn test_kmeans_separates_clusters() {
        let mut samples = vec![DVec3::splat(10.0); 20];
        samples.extend(vec![DVec3::splat(240.0); 20]);
        let assignments = kmeans_assignments(&samples, 2);
        assert!(assignments[..20].iter().all(|&a| a == assignments[0]));
        assert!(assignments[20..].iter().all(|&a| a == assignments[20]));
        assert_ne!(assignments[0], assignments[20]);
    }

    #[test]
    fn test_kmeans_with_fewer_samples_than_components() {
        let samples = vec![DVec3::splat(1.0), DVec3::splat(2.0)];
        let assignments = kmeans_assignments(&samples, 5);
        assert!(assignments.iter().all(|&a| a < 2));
    }

    #[test]
    fn test_color_model_prefers_own_colors() {
        let dark = vec![DVec3::new(20.0, 30.0, 40.0); 10];
        let light = vec![DVec3::new(230.0, 230.0, 230.0); 10];
        let dark_model = ColorModel::fit(&dark, &vec![0; 10], 1).unwrap();
        let light_model = ColorModel::fit(&light, &vec![0; 10], 1).unwrap();

        let sample = DVec3::new(22.0, 31.0, 41.0);
        assert!(dark_model.data_cost(sample) < light_model.data_cost(sample));
    }

    #[test]
    fn test_estimate_finds_centered_subject() {
        let image = studio_image(60, 45);
        let mask = RegionGrowingEstimator::new(0.1, 5, 5, 50.0)
            .estimate(&image)
            .unwrap();

        assert_eq!(mask.dimensions(), (60, 45));
        assert!(mask.get(30, 22));
        assert!(!mask.get(0, 0));
        assert!(!mask.get(59, 44));
        // Backdrop inside the seed rectangle is peeled away
        assert!(!mask.get(8, 8));
    }

    #[test]
    fn test_outside_rect_is_always_background() {
        let image = studio_image(40, 40);
        let labels = RegionGrowingEstimator::new(0.125, 3, 3, 50.0)
            .label(&image)
            .unwrap();
        let rect = SeedRect::centered(40, 40, 0.125);
        for y in 0..40u32 {
            for x in 0..40u32 {
                if !rect.contains(x, y) {
                    assert_eq!(labels[(y * 40 + x) as usize], PixelLabel::Background);
                }
            }
        }
    }

    #[test]
    fn test_fails_without_background_samples() {
        let image = studio_image(4, 4);
        let failure = RegionGrowingEstimator::new(0.1, 5, 5, 50.0)
            .estimate(&image)
            .unwrap_err();
        assert_eq!(failure.method, SegmentationMethod::RegionGrowing);
        assert!(failure.reason.contains("no background"));
    }
}
