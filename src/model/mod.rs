//! Model module for the CNN classifier built with Burn
//!
//! - `cnn`: the network itself
//! - `config`: serializable architecture configuration
//!
//! Training is out of scope for this crate; weights are produced elsewhere
//! and recorded with Burn's `CompactRecorder`.

pub mod cnn;
pub mod config;

pub use cnn::{PlantClassifier, PlantClassifierConfig};
pub use config::ModelConfig;

/// File name the CLI looks for when no weights path is given
pub const DEFAULT_WEIGHTS_FILE: &str = "best_model.mpk";
