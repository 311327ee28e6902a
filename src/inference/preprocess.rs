//! Image preprocessing for inference
//!
//! Decodes an input image, converts it to RGB, resizes it to the
//! classifier's square input size and applies ImageNet normalization.
//! The normalization constants are the ones the weights were trained with;
//! they belong to the model, not to the caller.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, TomatoError};

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resampling filter used when resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for image preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Target width and height
    pub image_size: u32,
    /// Per-channel normalization means [R, G, B]
    pub mean: [f32; 3],
    /// Per-channel normalization standard deviations [R, G, B]
    pub std: [f32; 3],
    /// Resampling filter
    pub filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            filter: ResizeFilter::Triangle,
        }
    }
}

/// A normalized image in NCHW layout with a batch dimension of 1
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Vec<f32>,
    shape: [usize; 4],
}

impl ImageTensor {
    /// Wrap a CHW buffer for a square image of `size` pixels
    pub fn from_chw(data: Vec<f32>, size: usize) -> Result<Self> {
        let expected = 3 * size * size;
        if data.len() != expected {
            return Err(TomatoError::InvalidInput(format!(
                "tensor data has {} values, expected {} for a 3x{}x{} image",
                data.len(),
                expected,
                size,
                size
            )));
        }

        Ok(Self {
            data,
            shape: [1, 3, size, size],
        })
    }

    /// Flat values, all R then all G then all B
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// `[batch, channels, height, width]`
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }
}

/// Decode an image file
///
/// Missing, unreadable, and undecodable files all fail with `Decode`.
pub fn decode_path(path: &Path) -> Result<DynamicImage> {
    image::open(path)
        .map_err(|e| TomatoError::Decode(path.display().to_string(), e.to_string()))
}

/// Decode an in-memory image (e.g. an upload body)
pub fn decode_bytes(bytes: &[u8], source_name: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| TomatoError::Decode(source_name.to_string(), e.to_string()))
}

/// Image preprocessor producing classifier input tensors
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Create a preprocessor with the given configuration
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Preprocess an already decoded image
    pub fn preprocess(&self, image: &DynamicImage) -> Result<ImageTensor> {
        let size = self.config.image_size;
        let resized = image.resize_exact(size, size, self.config.filter.into());
        // Grayscale, alpha and 16-bit inputs all collapse to RGB8 here
        let rgb = resized.to_rgb8();

        let num_pixels = (size * size) as usize;
        let mut normalized = vec![0.0f32; 3 * num_pixels];
        let PreprocessConfig { mean, std, .. } = self.config;

        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                normalized[c * num_pixels + i] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
            }
        }

        ImageTensor::from_chw(normalized, size as usize)
    }

    /// Decode and preprocess an image file
    pub fn load_and_preprocess(&self, path: &Path) -> Result<ImageTensor> {
        let image = decode_path(path)?;
        self.preprocess(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};

    #[test]
    fn test_output_shape_and_layout() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 60, Rgb([255, 0, 0])));
        let tensor = ImagePreprocessor::default().preprocess(&img).unwrap();

        assert_eq!(tensor.shape(), [1, 3, 224, 224]);
        assert_eq!(tensor.data().len(), 3 * 224 * 224);

        let plane = 224 * 224;
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((tensor.data()[0] - red).abs() < 1e-4);
        assert!((tensor.data()[plane] - green).abs() < 1e-4);
    }

    #[test]
    fn test_grayscale_and_alpha_are_converted() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([128])));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(32, 32));
        let preprocessor = ImagePreprocessor::default();

        let gray_tensor = preprocessor.preprocess(&gray).unwrap();
        assert_eq!(gray_tensor.shape(), [1, 3, 224, 224]);
        assert!(preprocessor.preprocess(&rgba).is_ok());

        // Equal channels before normalization
        let plane = 224 * 224;
        let r = gray_tensor.data()[0] * IMAGENET_STD[0] + IMAGENET_MEAN[0];
        let b = gray_tensor.data()[2 * plane] * IMAGENET_STD[2] + IMAGENET_MEAN[2];
        assert!((r - b).abs() < 1e-4);
    }

    #[test]
    fn test_decode_bytes_rejects_garbage() {
        let err = decode_bytes(b"definitely not an image", "upload").unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = decode_path(Path::new("/nonexistent/leaf.png")).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_from_chw_checks_length() {
        assert!(ImageTensor::from_chw(vec![0.0; 10], 224).is_err());
        assert!(ImageTensor::from_chw(vec![0.0; 12], 2).is_ok());
    }
}
