//! Pipeline configuration
//!
//! One JSON document groups the model architecture, preprocessing
//! constants and every decision threshold. Missing sections fall back to
//! their defaults, so a partial file only overrides what it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::inference::preprocess::PreprocessConfig;
use crate::model::ModelConfig;
use crate::utils::error::{Result, TomatoError};
use crate::validation::{HeuristicThresholds, ValidationThresholds};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    pub preprocess: PreprocessConfig,
    pub heuristic: HeuristicThresholds,
    pub validation: ValidationThresholds,
}

impl PipelineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.validation.validate()?;

        if self.preprocess.image_size as usize != self.model.input_size {
            return Err(TomatoError::Config(format!(
                "preprocess.image_size ({}) must equal model.input_size ({})",
                self.preprocess.image_size, self.model.input_size
            )));
        }

        if self.preprocess.std.iter().any(|s| *s <= 0.0) {
            return Err(TomatoError::Config(
                "preprocess.std values must be positive".to_string(),
            ));
        }

        if self.heuristic.min_brightness > self.heuristic.max_brightness {
            return Err(TomatoError::Config(
                "heuristic.min_brightness must not exceed max_brightness".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
