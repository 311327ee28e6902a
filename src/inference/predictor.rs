//! Inference Predictor Module
//!
//! Runs one image through the whole pipeline: decode, preprocess, classify,
//! color heuristic, validation and result assembly. The classifier is
//! passed into every call, so one loaded model can serve any number of
//! predictors and tests can substitute a fixed-output classifier.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::classifier::{Classifier, ModelStatus, ProbabilityVector, TopKEntry};
use super::preprocess::{decode_bytes, decode_path, ImagePreprocessor};
use crate::classes::{display_name, is_healthy_class};
use crate::config::PipelineConfig;
use crate::knowledge::{action_plan, ActionPlan, DiseaseMetadata, KnowledgeBase};
use crate::utils::error::Result;
use crate::utils::logging::ProgressLogger;
use crate::validation::{
    heuristic::{self, HeuristicThresholds},
    PredictionValidator, ValidationInput, ValidationVerdict,
};

/// Number of entries in `PredictionResult::top_k`
pub const TOP_K: usize = 3;

/// Valid predictions below this confidence still need a human check
pub const LOW_CONFIDENCE_PERCENT: f32 = 50.0;

/// Overall status shown in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    Valid,
    /// Plausible tomato leaf, but the model is unsure
    LowConfidence,
    Invalid,
}

impl std::fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectStatus::Valid => write!(f, "VALID"),
            SubjectStatus::LowConfidence => write!(
                f,
                "LOW CONFIDENCE (<{:.0}%) - needs verification",
                LOW_CONFIDENCE_PERCENT
            ),
            SubjectStatus::Invalid => write!(f, "INVALID - not a tomato leaf"),
        }
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Path to the input image (if applicable)
    pub image_path: Option<PathBuf>,

    /// Predicted class index
    pub predicted_class: usize,

    /// Predicted class label
    pub class_name: String,

    /// Human-readable class label
    pub display_name: String,

    /// Probability of the predicted class, in percent
    pub confidence_percent: f32,

    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,

    /// The three most likely classes, descending
    pub top_k: Vec<TopKEntry>,

    /// Knowledge base entry for the predicted class (possibly empty)
    pub disease_info: DiseaseMetadata,

    /// Suggested follow-up
    pub action_plan: ActionPlan,

    pub validation: ValidationVerdict,

    pub model_status: ModelStatus,

    /// Preprocessing plus forward pass, in milliseconds
    pub inference_time_ms: f64,

    pub analyzed_at: DateTime<Utc>,
}

impl PredictionResult {
    /// Package classifier output, verdict and metadata into a result
    pub fn assemble(
        probabilities: ProbabilityVector,
        validation: ValidationVerdict,
        knowledge: &KnowledgeBase,
        model_status: ModelStatus,
        inference_time: Duration,
        image_path: Option<PathBuf>,
    ) -> Self {
        let (predicted_class, confidence) = probabilities.argmax();
        let top_k = probabilities.top_k(TOP_K);
        // top_k[0] is the argmax, ties included
        let class_name = top_k
            .first()
            .map(|e| e.class_name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        let disease_info = knowledge.lookup(&class_name);
        let action_plan = action_plan(
            validation.is_likely_valid_subject,
            disease_info.severity_level(),
        );

        Self {
            image_path,
            predicted_class,
            display_name: display_name(predicted_class)
                .unwrap_or("Unknown")
                .to_string(),
            class_name,
            confidence_percent: confidence * 100.0,
            probabilities: probabilities.into_vec(),
            top_k,
            disease_info,
            action_plan,
            validation,
            model_status,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
            analyzed_at: Utc::now(),
        }
    }

    /// Whether the image plausibly shows a tomato leaf
    pub fn is_valid_subject(&self) -> bool {
        self.validation.is_likely_valid_subject
    }

    pub fn subject_status(&self) -> SubjectStatus {
        if !self.is_valid_subject() {
            SubjectStatus::Invalid
        } else if self.confidence_percent < LOW_CONFIDENCE_PERCENT {
            SubjectStatus::LowConfidence
        } else {
            SubjectStatus::Valid
        }
    }

    pub fn is_healthy(&self) -> bool {
        is_healthy_class(self.predicted_class)
    }

    /// Plain-text report of the prediction
    pub fn display(&self) -> String {
        let mut output = String::new();

        if let Some(path) = &self.image_path {
            output.push_str(&format!("Image: {}\n", path.display()));
        }

        output.push_str(&format!(
            "Prediction: {} (class {})\n",
            self.display_name, self.predicted_class
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence_percent));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        if !self.model_status.is_trained() {
            output.push_str(&format!("Model: {}\n", self.model_status));
        }

        output.push_str(&format!("Status: {}\n", self.subject_status()));
        if let Some(warning) = &self.validation.warning_message {
            output.push_str(&format!("{}\n", warning));
        }

        output.push_str(&format!("\nTop-{} predictions:\n", self.top_k.len()));
        for (i, entry) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} (class {}) - {:.2}%\n",
                i + 1,
                entry.class_name,
                entry.class_id,
                entry.percent()
            ));
        }

        let info = &self.disease_info;
        if let Some(description) = &info.description {
            output.push_str(&format!("\nDescription:\n  {}\n", description));
        }

        let sections = [
            ("Symptoms", &info.symptoms),
            ("Causes", &info.causes),
            ("Prevention", &info.prevention),
            ("Treatment", &info.treatment),
            ("Maintenance", &info.maintenance),
            ("Optimal conditions", &info.optimal_conditions),
        ];
        for (title, field) in sections {
            if let Some(field) = field {
                output.push_str(&format!("\n{}:\n", title));
                for item in field.items() {
                    output.push_str(&format!("  - {}\n", item));
                }
            }
        }

        if let Some(impact) = &info.impact {
            output.push_str(&format!("\nImpact: {}\n", impact));
        }
        if let Some(severity) = &info.severity {
            output.push_str(&format!("Severity: {}\n", severity));
        }
        if let Some(schedule) = info.schedule() {
            output.push_str("\nSchedule:\n");
            for (period, activity) in schedule.entries() {
                output.push_str(&format!("  {}: {}\n", period, activity));
            }
        }

        output.push_str(&format!("\n{}\n", self.action_plan.headline));
        for step in &self.action_plan.steps {
            output.push_str(&format!("  - {}\n", step));
        }

        output
    }
}

/// Runs the inference-and-validation pipeline
#[derive(Debug, Clone)]
pub struct Predictor {
    preprocessor: ImagePreprocessor,
    heuristic: HeuristicThresholds,
    validator: PredictionValidator,
    knowledge: KnowledgeBase,
}

impl Predictor {
    /// Build a predictor from configuration and a knowledge base
    pub fn new(config: &PipelineConfig, knowledge: KnowledgeBase) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            preprocessor: ImagePreprocessor::new(config.preprocess.clone()),
            heuristic: config.heuristic.clone(),
            validator: PredictionValidator::new(config.validation.clone()),
            knowledge,
        })
    }

    /// Default configuration with the embedded knowledge base
    pub fn with_defaults() -> Result<Self> {
        Self::new(&PipelineConfig::default(), KnowledgeBase::embedded()?)
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Predict on an image file
    ///
    /// Fails with `Decode` when the file cannot be read or decoded; no
    /// result is produced in that case.
    pub fn predict<C: Classifier + ?Sized>(
        &self,
        path: &Path,
        classifier: &C,
    ) -> Result<PredictionResult> {
        let image = decode_path(path)?;
        self.predict_image(&image, Some(path.to_path_buf()), classifier)
    }

    /// Predict on encoded image bytes, e.g. an upload body
    pub fn predict_bytes<C: Classifier + ?Sized>(
        &self,
        bytes: &[u8],
        source_name: &str,
        classifier: &C,
    ) -> Result<PredictionResult> {
        let image = decode_bytes(bytes, source_name)?;
        self.predict_image(&image, None, classifier)
    }

    /// Predict on an already decoded image
    pub fn predict_image<C: Classifier + ?Sized>(
        &self,
        image: &DynamicImage,
        image_path: Option<PathBuf>,
        classifier: &C,
    ) -> Result<PredictionResult> {
        let start = Instant::now();
        let tensor = self.preprocessor.preprocess(image)?;
        let probabilities = classifier.classify(&tensor)?;
        let inference_time = start.elapsed();

        let color = heuristic::analyze_with(image, &self.heuristic);
        let top_k = probabilities.top_k(TOP_K);
        let verdict = self
            .validator
            .validate(&ValidationInput::new(&probabilities, &top_k, &color));

        let result = PredictionResult::assemble(
            probabilities,
            verdict,
            &self.knowledge,
            classifier.status().clone(),
            inference_time,
            image_path,
        );

        debug!(
            "Predicted {} ({:.2}%) in {:.2} ms, valid subject: {}",
            result.class_name,
            result.confidence_percent,
            result.inference_time_ms,
            result.is_valid_subject()
        );

        Ok(result)
    }

    /// Predict on several files; each entry carries its own outcome
    ///
    /// A file that fails is logged and skipped, the rest of the batch still
    /// runs. Progress is reported through tracing.
    pub fn predict_batch<C: Classifier + ?Sized>(
        &self,
        paths: &[PathBuf],
        classifier: &C,
    ) -> Vec<(PathBuf, Result<PredictionResult>)> {
        let mut progress = ProgressLogger::new("Predicting", paths.len());
        let outcomes: Vec<_> = paths
            .iter()
            .map(|path| {
                let outcome = self.predict(path, classifier);
                if let Err(e) = &outcome {
                    warn!("No prediction for {}: {}", path.display(), e);
                }
                progress.increment();
                (path.clone(), outcome)
            })
            .collect();
        progress.finish();
        outcomes
    }
}

/// Predict on one image file with default settings
///
/// Builds a default [`Predictor`] per call; reuse a `Predictor` when
/// processing many images.
pub fn predict<C: Classifier + ?Sized>(image_path: &Path, classifier: &C) -> Result<PredictionResult> {
    Predictor::with_defaults()?.predict(image_path, classifier)
}

/// Batch prediction statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPredictionStats {
    /// Files attempted
    pub total_images: usize,

    /// Files that produced a prediction
    pub predicted: usize,

    /// Files that could not be decoded or classified
    pub failed: usize,

    /// Predictions judged to be a tomato leaf
    pub valid_subjects: usize,

    /// Valid predictions of the healthy class
    pub healthy: usize,

    /// Average inference time per predicted image
    pub avg_time_per_image_ms: f64,

    pub min_time_ms: f64,

    pub max_time_ms: f64,
}

impl BatchPredictionStats {
    pub fn from_outcomes(outcomes: &[(PathBuf, Result<PredictionResult>)]) -> Self {
        let predictions: Vec<&PredictionResult> =
            outcomes.iter().filter_map(|(_, r)| r.as_ref().ok()).collect();

        let mut stats = Self {
            total_images: outcomes.len(),
            predicted: predictions.len(),
            failed: outcomes.len() - predictions.len(),
            ..Default::default()
        };

        if predictions.is_empty() {
            return stats;
        }

        let times: Vec<f64> = predictions.iter().map(|p| p.inference_time_ms).collect();
        stats.valid_subjects = predictions.iter().filter(|p| p.is_valid_subject()).count();
        stats.healthy = predictions
            .iter()
            .filter(|p| p.is_valid_subject() && p.is_healthy())
            .count();
        stats.avg_time_per_image_ms = times.iter().sum::<f64>() / times.len() as f64;
        stats.min_time_ms = times.iter().cloned().fold(f64::INFINITY, f64::min);
        stats.max_time_ms = times.iter().cloned().fold(0.0, f64::max);
        stats
    }
}

impl std::fmt::Display for BatchPredictionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Batch Prediction Statistics:")?;
        writeln!(f, "  Total images: {}", self.total_images)?;
        writeln!(f, "  Predicted: {}", self.predicted)?;
        writeln!(f, "  No prediction: {}", self.failed)?;
        writeln!(f, "  Valid subjects: {}", self.valid_subjects)?;
        writeln!(f, "  Healthy: {}", self.healthy)?;
        if self.predicted > 0 {
            writeln!(f, "  Average time/image: {:.2} ms", self.avg_time_per_image_ms)?;
            writeln!(f, "  Min time: {:.2} ms", self.min_time_ms)?;
            writeln!(f, "  Max time: {:.2} ms", self.max_time_ms)?;
        }
        Ok(())
    }
}
