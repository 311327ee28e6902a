//! Inference module
//!
//! - `preprocess`: decoding and tensor preparation
//! - `classifier`: the Burn model adapter and probability helpers
//! - `predictor`: the end-to-end pipeline and its result type

pub mod classifier;
pub mod predictor;
pub mod preprocess;

pub use classifier::{
    load_classifier, load_classifier_with_config, Classifier, ClassifierHandle, ModelStatus,
    ProbabilityVector, TopKEntry,
};
pub use predictor::{
    predict, BatchPredictionStats, PredictionResult, Predictor, SubjectStatus,
    LOW_CONFIDENCE_PERCENT, TOP_K,
};
pub use preprocess::{ImagePreprocessor, ImageTensor, PreprocessConfig};
