//! Model Configuration Module
//!
//! Serializable description of the classifier architecture. The weights
//! artifact only loads into a model built from the same configuration it
//! was trained with; it is persisted as the `model` section of the
//! pipeline configuration.

use serde::{Deserialize, Serialize};

use super::cnn::PlantClassifierConfig;
use crate::classes::NUM_CLASSES;
use crate::utils::error::{Result, TomatoError};

/// Configuration for the CNN model architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of output classes (10 tomato classes)
    pub num_classes: usize,

    /// Input image size (width and height, square)
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    pub input_channels: usize,

    /// Dropout rate of the classifier head
    pub dropout_rate: f64,

    /// Filters in the first conv block; doubled in each following block
    pub base_filters: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_classes: NUM_CLASSES,
            input_size: 224,
            input_channels: 3,
            dropout_rate: 0.3,
            base_filters: 32,
        }
    }
}

impl ModelConfig {
    /// A narrow model with few filters, cheap enough for CPU smoke tests
    pub fn tiny() -> Self {
        Self {
            base_filters: 4,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes != NUM_CLASSES {
            return Err(TomatoError::Config(format!(
                "num_classes must be {} to match the class labels, got {}",
                NUM_CLASSES, self.num_classes
            )));
        }

        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(TomatoError::Config(
                "input_size must be a positive multiple of 32".to_string(),
            ));
        }

        if self.input_channels != 3 {
            return Err(TomatoError::Config(
                "input_channels must be 3 (RGB)".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(TomatoError::Config(
                "dropout_rate must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if self.base_filters == 0 {
            return Err(TomatoError::Config(
                "base_filters must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the Burn module configuration
    pub fn classifier_config(&self) -> PlantClassifierConfig {
        PlantClassifierConfig::new()
            .with_num_classes(self.num_classes)
            .with_input_size(self.input_size)
            .with_dropout_rate(self.dropout_rate)
            .with_in_channels(self.input_channels)
            .with_base_filters(self.base_filters)
    }
}
