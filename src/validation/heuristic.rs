//! Color heuristic
//!
//! A classifier-independent check on gross pixel statistics. Leaf photos
//! are mostly green and reasonably lit; a photo of something else usually
//! is not. The score is additive and only ever adds suspicion.

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::inference::preprocess::{decode_bytes, decode_path};

pub const REASON_NOT_GREEN: &str = "dominant color is not green";
pub const REASON_LIGHTING: &str = "lighting not optimal";

/// Thresholds and weights of the color heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicThresholds {
    /// Score added when green does not dominate
    pub not_green_penalty: u32,
    /// Score added when brightness is out of range
    pub lighting_penalty: u32,
    /// Mean brightness below this is too dark (0-255)
    pub min_brightness: f64,
    /// Mean brightness above this is overexposed (0-255)
    pub max_brightness: f64,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self {
            not_green_penalty: 30,
            lighting_penalty: 20,
            min_brightness: 50.0,
            max_brightness: 200.0,
        }
    }
}

/// Result of the color heuristic for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeuristicScore {
    /// Additive suspicion score, higher means less leaf-like
    pub score: u32,
    pub reasons: Vec<String>,
    /// Channel means on a 0-255 scale
    pub mean_rgb: [f64; 3],
    pub brightness: f64,
}

/// Mean R, G, B over every pixel of the image
pub fn mean_rgb(image: &DynamicImage) -> [f64; 3] {
    let rgb = image.to_rgb8();
    let num_pixels = (rgb.width() as u64 * rgb.height() as u64) as f64;
    if num_pixels == 0.0 {
        return [0.0; 3];
    }

    let mut sums = [0u64; 3];
    for pixel in rgb.pixels() {
        for c in 0..3 {
            sums[c] += pixel[c] as u64;
        }
    }

    [
        sums[0] as f64 / num_pixels,
        sums[1] as f64 / num_pixels,
        sums[2] as f64 / num_pixels,
    ]
}

/// Score a decoded image with default thresholds
pub fn analyze(image: &DynamicImage) -> HeuristicScore {
    analyze_with(image, &HeuristicThresholds::default())
}

/// Score a decoded image
pub fn analyze_with(image: &DynamicImage, thresholds: &HeuristicThresholds) -> HeuristicScore {
    let [r, g, b] = mean_rgb(image);
    let brightness = (r + g + b) / 3.0;

    let mut score = 0;
    let mut reasons = Vec::new();

    if !(g > r && g > b) {
        score += thresholds.not_green_penalty;
        reasons.push(REASON_NOT_GREEN.to_string());
    }

    if brightness < thresholds.min_brightness || brightness > thresholds.max_brightness {
        score += thresholds.lighting_penalty;
        reasons.push(REASON_LIGHTING.to_string());
    }

    HeuristicScore {
        score,
        reasons,
        mean_rgb: [r, g, b],
        brightness,
    }
}

/// Decode and score an image file; undecodable input scores zero
pub fn analyze_file(path: &Path, thresholds: &HeuristicThresholds) -> HeuristicScore {
    match decode_path(path) {
        Ok(image) => analyze_with(&image, thresholds),
        Err(e) => {
            warn!("Color heuristic skipped: {}", e);
            HeuristicScore::default()
        }
    }
}

/// Decode and score in-memory image bytes; undecodable input scores zero
pub fn analyze_bytes(bytes: &[u8], thresholds: &HeuristicThresholds) -> HeuristicScore {
    match decode_bytes(bytes, "<bytes>") {
        Ok(image) => analyze_with(&image, thresholds),
        Err(e) => {
            warn!("Color heuristic skipped: {}", e);
            HeuristicScore::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([r, g, b])))
    }

    #[test]
    fn test_green_leaf_scores_zero() {
        let result = analyze(&solid(60, 140, 50));
        assert_eq!(result.score, 0);
        assert!(result.reasons.is_empty());
        assert!((result.brightness - 250.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_red_image_is_not_green() {
        let result = analyze(&solid(255, 0, 0));
        // brightness 85 is inside the lighting window
        assert_eq!(result.score, 30);
        assert_eq!(result.reasons, vec![REASON_NOT_GREEN.to_string()]);
    }

    #[test]
    fn test_dark_gray_image_hits_both_rules() {
        let result = analyze(&solid(10, 10, 10));
        assert_eq!(result.score, 50);
        assert_eq!(
            result.reasons,
            vec![REASON_NOT_GREEN.to_string(), REASON_LIGHTING.to_string()]
        );
    }

    #[test]
    fn test_green_must_strictly_dominate() {
        // Green tied with blue is not dominant
        let result = analyze(&solid(50, 120, 120));
        assert_eq!(result.score, 30);
    }

    #[test]
    fn test_overexposed_green_image() {
        let result = analyze(&solid(220, 250, 210));
        assert_eq!(result.score, 20);
        assert_eq!(result.reasons, vec![REASON_LIGHTING.to_string()]);
    }

    #[test]
    fn test_mean_rgb_over_mixed_pixels() {
        let mut img = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([100, 200, 50]));
        let means = mean_rgb(&DynamicImage::ImageRgb8(img));
        assert_eq!(means, [50.0, 100.0, 25.0]);
    }

    #[test]
    fn test_undecodable_input_degrades_to_zero() {
        let thresholds = HeuristicThresholds::default();
        let result = analyze_bytes(b"garbage", &thresholds);
        assert_eq!(result, HeuristicScore::default());

        let result = analyze_file(Path::new("/nonexistent/leaf.jpg"), &thresholds);
        assert_eq!(result.score, 0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = HeuristicThresholds {
            min_brightness: 100.0,
            ..Default::default()
        };
        let result = analyze_with(&solid(60, 140, 50), &thresholds);
        assert_eq!(result.score, 20);
    }
}
