//! Pixel-level helpers shared by the mask estimators

// Buffers are sized from the image; histogram bins cover every u8
#![allow(clippy::indexing_slicing)]

use image::{GrayImage, Luma, RgbImage};

/// Luma conversion with the ITU-R BT.601 weights (0.299, 0.587, 0.114)
#[must_use]
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114 + 500) / 1000;
        Luma([luma as u8])
    })
}

/// Reflect-101 border mapping (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(index: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    let mut i = index;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * (len - 1) - i;
        }
    }
    i as usize
}

/// 5x5 Gaussian blur with the binomial kernel `[1 4 6 4 1] / 16` in both directions
#[must_use]
pub fn gaussian_blur_5x5(image: &GrayImage) -> GrayImage {
    const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];
    let (width, height) = image.dimensions();
    let (w, h) = (i64::from(width), i64::from(height));

    let mut horizontal = vec![0u32; (width * height) as usize];
    for y in 0..height {
        for x in 0..i64::from(width) {
            let mut acc = 0;
            for (k, weight) in KERNEL.iter().enumerate() {
                let sx = reflect_101(x + k as i64 - 2, w) as u32;
                acc += weight * u32::from(image.get_pixel(sx, y)[0]);
            }
            horizontal[(y * width) as usize + x as usize] = acc;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0;
        for (k, weight) in KERNEL.iter().enumerate() {
            let sy = reflect_101(i64::from(y) + k as i64 - 2, h);
            acc += weight * horizontal[sy * width as usize + x as usize];
        }
        // 256 = 16 * 16, rounded to nearest
        Luma([((acc + 128) / 256) as u8])
    })
}

/// Otsu's threshold: the level maximising between-class variance
#[must_use]
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total = image.pixels().len() as f64;
    if total == 0.0 {
        return 0;
    }
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = 0.0;
    let mut background_weight = 0.0;
    let mut background_sum = 0.0;

    for (level, &count) in histogram.iter().enumerate() {
        background_weight += count as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }
        background_sum += level as f64 * count as f64;

        let background_mean = background_sum / background_weight;
        let foreground_mean = (total_sum - background_sum) / foreground_weight;
        let variance = background_weight
            * foreground_weight
            * (background_mean - foreground_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_threshold = level as u8;
        }
    }

    best_threshold
}

/// RGB to HSV in the 8-bit convention: H in 0-180 (degrees / 2), S and V in 0-255
#[must_use]
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let hue_degrees = if delta == 0.0 {
        0.0
    } else if (max - rf).abs() < f32::EPSILON {
        60.0 * (gf - bf) / delta
    } else if (max - gf).abs() < f32::EPSILON {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let hue_degrees = if hue_degrees < 0.0 {
        hue_degrees + 360.0
    } else {
        hue_degrees
    };

    [
        (hue_degrees / 2.0).round().min(180.0) as u8,
        saturation.round() as u8,
        max as u8,
    ]
}
