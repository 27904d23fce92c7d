//! Optional image cleanup before recognition.
//!
//! Grayscale conversion, a linear contrast stretch and Otsu binarization. The
//! result is returned as RGB so engines keep a single input layout.

use image::{DynamicImage, GrayImage, RgbImage};

/// Grayscale, stretch contrast and binarize.
pub fn preprocess(image: RgbImage) -> RgbImage {
    let mut gray = image::imageops::grayscale(&image);
    stretch_contrast(&mut gray);
    let threshold = otsu_threshold(&gray);
    binarize(&mut gray, threshold);
    DynamicImage::ImageLuma8(gray).into_rgb8()
}

/// Linearly map the darkest pixel to 0 and the brightest to 255.
pub fn stretch_contrast(image: &mut GrayImage) {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));

    if max <= min {
        return;
    }

    let range = (max - min) as u32;
    for pixel in image.pixels_mut() {
        let value = (pixel.0[0] - min) as u32;
        pixel.0[0] = ((value * 255 + range / 2) / range) as u8;
    }
}

/// Threshold maximizing between-class variance of the luminance histogram.
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }

    let weighted_total: f64 = histogram.iter().enumerate().map(|(i, &c)| i as f64 * c as f64).sum();

    let mut background_weight = 0u64;
    let mut background_sum = 0f64;
    let mut best_threshold = 0u8;
    let mut best_variance = -1f64;

    for (level, &count) in histogram.iter().enumerate() {
        background_weight += count;
        if background_weight == 0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0 {
            break;
        }

        background_sum += level as f64 * count as f64;
        let background_mean = background_sum / background_weight as f64;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight as f64;
        let diff = background_mean - foreground_mean;
        let variance = background_weight as f64 * foreground_weight as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = level as u8;
        }
    }

    best_threshold
}

/// Pixels above `threshold` become white, the rest black.
pub fn binarize(image: &mut GrayImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
}
