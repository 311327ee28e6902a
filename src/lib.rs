//! # Tomato Diagnosis
//!
//! Tomato leaf disease classification with a plausibility gate, built on
//! the Burn framework.
//!
//! An image goes through a fixed preprocessing transform and a CNN that
//! scores ten tomato classes. Independent signals (pixel colors, model
//! confidence, top-3 spread and predictive entropy) then decide whether the
//! image plausibly shows a tomato leaf at all, so that a confident
//! "Late blight" on a photo of a dog is flagged instead of reported.
//!
//! ## Modules
//!
//! - `inference`: preprocessing, the classifier adapter and the predictor
//! - `validation`: the color heuristic and the prediction validator
//! - `knowledge`: disease descriptions and recommended actions
//! - `model`: CNN architecture built with Burn
//! - `config`: JSON pipeline configuration
//! - `utils`: logging and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tomato_diagnosis::{load_classifier, predict};
//!
//! let classifier = load_classifier("output/best_model.mpk")?;
//! let result = predict(Path::new("leaf.jpg"), &classifier)?;
//! if !result.is_valid_subject() {
//!     println!("{}", result.validation.warning_message.unwrap_or_default());
//! }
//! ```

pub mod backend;
pub mod classes;
pub mod config;
pub mod inference;
pub mod knowledge;
pub mod model;
pub mod utils;
pub mod validation;

// Re-export commonly used items for convenience
pub use classes::{class_name, CLASS_NAMES, NUM_CLASSES};
pub use config::PipelineConfig;
pub use inference::{
    load_classifier, load_classifier_with_config, predict, Classifier, ClassifierHandle,
    ModelStatus, PredictionResult, Predictor,
};
pub use knowledge::{DiseaseMetadata, KnowledgeBase};
pub use model::{ModelConfig, PlantClassifier};
pub use utils::error::{Result, TomatoError};
pub use validation::{PredictionValidator, ValidationVerdict};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
