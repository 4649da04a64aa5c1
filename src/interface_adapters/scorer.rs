// Perceptual distance from a small luminance-and-gradient feature print.

use crate::domain::RasterImage;
use crate::domain::ports::SimilarityScorer;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

const DEFAULT_GRID: u32 = 16;

/// Compares images by the Euclidean distance between unit-length feature prints.
///
/// A print is the image composited on white, reduced to a `grid x grid` luminance
/// map with its mean removed, followed by the horizontal and vertical gradients
/// of that map. Distances fall in `[0, 2]`; identical images score `0`.
#[derive(Debug, Clone)]
pub struct FeaturePrintScorer {
    grid: u32,
}

impl Default for FeaturePrintScorer {
    fn default() -> Self {
        Self { grid: DEFAULT_GRID }
    }
}

impl FeaturePrintScorer {
    pub fn with_grid(grid: u32) -> Self {
        Self { grid: grid.max(2) }
    }

    fn feature_print(&self, image: &RasterImage) -> Option<Vec<f32>> {
        if image.is_empty() {
            return None;
        }

        let rgba = image.pixels();
        let gray = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
            let alpha = f32::from(a) / 255.0;
            // Transparent strokes read as the white page underneath.
            Luma([(luma * alpha + 255.0 * (1.0 - alpha)).round() as u8])
        });
        let small = imageops::resize(&gray, self.grid, self.grid, FilterType::Triangle);

        let grid = self.grid as usize;
        let luminance: Vec<f32> = small.pixels().map(|p| f32::from(p.0[0]) / 255.0).collect();
        let mean = luminance.iter().sum::<f32>() / luminance.len() as f32;

        let mut print = Vec::with_capacity(grid * grid * 3);
        print.extend(luminance.iter().map(|v| v - mean));
        for y in 0..grid {
            for x in 0..grid - 1 {
                print.push(luminance[y * grid + x + 1] - luminance[y * grid + x]);
            }
        }
        for y in 0..grid - 1 {
            for x in 0..grid {
                print.push(luminance[(y + 1) * grid + x] - luminance[y * grid + x]);
            }
        }

        let norm = print.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            print.iter_mut().for_each(|v| *v /= norm);
        }
        Some(print)
    }
}

impl SimilarityScorer for FeaturePrintScorer {
    fn distance(&self, a: &RasterImage, b: &RasterImage) -> Option<f32> {
        let a = self.feature_print(a)?;
        let b = self.feature_print(b)?;
        let distance = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt();
        Some(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn stripe(width: u32, height: u32, vertical: bool) -> RasterImage {
        RasterImage::new(RgbaImage::from_fn(width, height, |x, y| {
            let on = if vertical { x < width / 2 } else { y < height / 2 };
            if on {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }))
    }

    #[test]
    fn when_images_are_identical_then_distance_is_zero() {
        let scorer = FeaturePrintScorer::default();
        let image = stripe(64, 64, true);

        let distance = scorer.distance(&image, &image.clone()).unwrap();

        assert!(distance.abs() < 1e-6);
    }

    #[test]
    fn when_images_differ_then_distance_is_positive_and_symmetric() {
        let scorer = FeaturePrintScorer::default();
        let vertical = stripe(64, 64, true);
        let horizontal = stripe(64, 64, false);

        let forward = scorer.distance(&vertical, &horizontal).unwrap();
        let backward = scorer.distance(&horizontal, &vertical).unwrap();

        assert!(forward > 0.5);
        assert!((forward - backward).abs() < 1e-6);
    }

    #[test]
    fn when_image_is_only_rescaled_then_distance_stays_small() {
        let scorer = FeaturePrintScorer::default();

        let distance = scorer
            .distance(&stripe(64, 64, true), &stripe(256, 256, true))
            .unwrap();

        assert!(distance < 0.1);
    }

    #[test]
    fn when_an_image_has_no_pixels_then_no_distance_is_produced() {
        let scorer = FeaturePrintScorer::default();
        let empty = RasterImage::new(RgbaImage::new(0, 0));

        assert_eq!(scorer.distance(&empty, &stripe(8, 8, true)), None);
    }

    #[test]
    fn when_transparent_then_reads_as_white_page() {
        let scorer = FeaturePrintScorer::default();
        let transparent = RasterImage::new(RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 0])));

        let distance = scorer
            .distance(&transparent, &RasterImage::blank(32, 32))
            .unwrap();

        assert!(distance.abs() < 1e-6);
    }
}
