//! Classifier adapter
//!
//! Owns the loaded model and turns an [`ImageTensor`] into a probability
//! distribution over the tomato classes. A missing or incompatible weights
//! artifact does not stop startup: the adapter falls back to a randomly
//! initialized network and reports that through [`ModelStatus`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use burn::{
    module::Module,
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor, TensorData},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::preprocess::ImageTensor;
use crate::backend::{default_device, DefaultBackend};
use crate::classes::{class_name, NUM_CLASSES};
use crate::model::{ModelConfig, PlantClassifier};
use crate::utils::error::{Result, TomatoError};

/// Small constant keeping `ln` finite for zero probabilities
pub const ENTROPY_EPSILON: f64 = 1e-10;

/// Tolerance when checking that probabilities sum to one
const SUM_TOLERANCE: f32 = 1e-3;

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// One of the highest-probability classes of a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKEntry {
    pub class_id: usize,
    pub class_name: String,
    /// Probability in [0, 1]
    pub probability: f32,
}

impl TopKEntry {
    pub fn percent(&self) -> f32 {
        self.probability * 100.0
    }
}

/// Post-softmax class probabilities, aligned with `CLASS_NAMES`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbabilityVector(Vec<f32>);

impl ProbabilityVector {
    /// Wrap probabilities, checking length, range and normalization
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != NUM_CLASSES {
            return Err(TomatoError::Inference(format!(
                "expected {} class probabilities, got {}",
                NUM_CLASSES,
                values.len()
            )));
        }

        if let Some(bad) = values
            .iter()
            .find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0)
        {
            return Err(TomatoError::Inference(format!(
                "probability out of range: {}",
                bad
            )));
        }

        let sum: f32 = values.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(TomatoError::Inference(format!(
                "probabilities sum to {}, expected 1.0",
                sum
            )));
        }

        Ok(Self(values))
    }

    /// Apply softmax to raw model outputs
    pub fn from_logits(logits: &[f32]) -> Result<Self> {
        if logits.iter().any(|x| !x.is_finite()) {
            return Err(TomatoError::Inference(
                "model produced non-finite logits".to_string(),
            ));
        }
        Self::new(softmax(logits))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    /// Index and probability of the most likely class (lowest index on ties)
    pub fn argmax(&self) -> (usize, f32) {
        let mut best = (0, self.0[0]);
        for (idx, &p) in self.0.iter().enumerate().skip(1) {
            if p > best.1 {
                best = (idx, p);
            }
        }
        best
    }

    /// The `k` most likely classes, descending, ties in class order
    pub fn top_k(&self, k: usize) -> Vec<TopKEntry> {
        let mut indexed: Vec<(usize, f32)> = self.0.iter().copied().enumerate().collect();
        // Stable sort keeps lower class indices first among equal probabilities
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

        indexed
            .into_iter()
            .take(k)
            .map(|(idx, probability)| TopKEntry {
                class_id: idx,
                class_name: class_name(idx).unwrap_or("Unknown").to_string(),
                probability,
            })
            .collect()
    }

    /// Shannon entropy in nats, `-sum(p * ln(p + eps))`
    pub fn entropy(&self) -> f64 {
        self.0
            .iter()
            .map(|&p| {
                let p = p as f64;
                -p * (p + ENTROPY_EPSILON).ln()
            })
            .sum()
    }
}

/// Whether the classifier runs with trained weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelStatus {
    /// Weights were loaded from the artifact
    Trained { weights_path: PathBuf },
    /// No usable artifact; random weights, predictions are not meaningful
    FallbackUntrained { reason: String },
}

impl ModelStatus {
    pub fn is_trained(&self) -> bool {
        matches!(self, ModelStatus::Trained { .. })
    }
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Trained { weights_path } => {
                write!(f, "trained ({})", weights_path.display())
            }
            ModelStatus::FallbackUntrained { reason } => {
                write!(f, "fallback, untrained weights ({})", reason)
            }
        }
    }
}

/// Anything that maps a preprocessed image to class logits
///
/// `ClassifierHandle` is the production implementation; tests supply
/// fixed-logit classifiers.
pub trait Classifier {
    /// Raw, unnormalized model outputs, one per class
    fn logits(&self, input: &ImageTensor) -> Result<Vec<f32>>;

    fn status(&self) -> &ModelStatus;

    /// Class probabilities for one image
    fn classify(&self, input: &ImageTensor) -> Result<ProbabilityVector> {
        let logits = self.logits(input)?;
        ProbabilityVector::from_logits(&logits)
    }
}

/// A loaded Burn classifier, read-only after construction
#[derive(Debug)]
pub struct ClassifierHandle<B: Backend = DefaultBackend> {
    model: Mutex<PlantClassifier<B>>,
    device: B::Device,
    config: ModelConfig,
    status: ModelStatus,
}

impl<B: Backend> ClassifierHandle<B> {
    /// Wrap an already constructed model
    pub fn from_model(
        model: PlantClassifier<B>,
        config: ModelConfig,
        device: B::Device,
        status: ModelStatus,
    ) -> Self {
        Self {
            model: Mutex::new(model),
            device,
            config,
            status,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.status.is_trained()
    }

    /// Forward pass for a batch of one
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        let [_, channels, height, width] = input.shape();
        let size = self.config.input_size;
        if channels != self.config.input_channels || height != size || width != size {
            return Err(TomatoError::InvalidInput(format!(
                "model expects [1, {}, {}, {}] input, got {:?}",
                self.config.input_channels,
                size,
                size,
                input.shape()
            )));
        }

        // Module clones share parameter storage, so the lock is only held
        // for the clone and forward passes can run concurrently.
        let model = self
            .model
            .lock()
            .map_err(|_| TomatoError::Inference("classifier lock poisoned".to_string()))?
            .clone();

        let data = TensorData::new(input.data().to_vec(), input.shape());
        let tensor = Tensor::<B, 4>::from_data(data, &self.device);

        let logits = model
            .forward(tensor)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| TomatoError::Inference(format!("Failed to extract logits: {:?}", e)))?;

        if logits.len() != self.config.num_classes {
            return Err(TomatoError::Model(format!(
                "model produced {} outputs for {} classes",
                logits.len(),
                self.config.num_classes
            )));
        }

        Ok(logits)
    }
}

impl<B: Backend> Classifier for ClassifierHandle<B> {
    fn logits(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        self.forward(input)
    }

    fn status(&self) -> &ModelStatus {
        &self.status
    }
}

/// Load the classifier on the default backend with the default architecture
pub fn load_classifier(weights_path: impl AsRef<Path>) -> Result<ClassifierHandle> {
    load_classifier_with_config::<DefaultBackend>(
        weights_path,
        &ModelConfig::default(),
        &default_device(),
    )
}

/// Load classifier weights recorded with `CompactRecorder`
///
/// The recorder always reads `<path>.mpk`, so any other extension on
/// `weights_path` is replaced. A missing or incompatible artifact yields a
/// handle in [`ModelStatus::FallbackUntrained`]; any other I/O failure while
/// opening the artifact is returned as an error.
pub fn load_classifier_with_config<B: Backend>(
    weights_path: impl AsRef<Path>,
    config: &ModelConfig,
    device: &B::Device,
) -> Result<ClassifierHandle<B>> {
    config.validate()?;

    let record_path = weights_path.as_ref().with_extension("mpk");
    let model = PlantClassifier::<B>::new(&config.classifier_config(), device);

    let fallback = |model: PlantClassifier<B>, reason: String| {
        warn!("{}", reason);
        warn!("Using randomly initialized weights. Predictions will be random until a trained model is provided.");
        ClassifierHandle::from_model(
            model,
            config.clone(),
            device.clone(),
            ModelStatus::FallbackUntrained { reason },
        )
    };

    match std::fs::File::open(&record_path) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let reason = format!("Model file {} not found", record_path.display());
            return Ok(fallback(model, reason));
        }
        Err(e) => return Err(TomatoError::Io(e)),
    }

    let recorder = CompactRecorder::new();
    match model.clone().load_file(record_path.clone(), &recorder, device) {
        Ok(loaded) => {
            info!("Loaded model from {}", record_path.display());
            Ok(ClassifierHandle::from_model(
                loaded,
                config.clone(),
                device.clone(),
                ModelStatus::Trained {
                    weights_path: record_path,
                },
            ))
        }
        Err(e) => {
            let err = TomatoError::WeightsLoad(record_path, format!("{:?}", e));
            Ok(fallback(model, err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs(values: &[f32]) -> ProbabilityVector {
        ProbabilityVector::new(values.to_vec()).unwrap()
    }

    fn zero_tensor() -> ImageTensor {
        ImageTensor::from_chw(vec![0.0; 3 * 224 * 224], 224).unwrap()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0, -4.0, 0.0, 0.5, 10.0, -1.0, 2.5, 3.5]);
        let sum: f32 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(p.iter().all(|&x| (0.0..=1.0).contains(&x)));

        // Large logits must not overflow
        let p = softmax(&[1000.0, 999.0]);
        assert!(p.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_probability_vector_rejects_bad_input() {
        assert!(ProbabilityVector::new(vec![0.5, 0.5]).is_err());
        assert!(ProbabilityVector::new(vec![0.2; 10]).is_err());
        assert!(ProbabilityVector::from_logits(&[f32::NAN; 10]).is_err());
        assert!(ProbabilityVector::new(vec![0.1; 10]).is_ok());
    }

    #[test]
    fn test_argmax_matches_confidence() {
        let p = probs(&[0.05, 0.05, 0.6, 0.1, 0.05, 0.05, 0.025, 0.025, 0.025, 0.025]);
        assert_eq!(p.argmax(), (2, 0.6));
    }

    #[test]
    fn test_argmax_prefers_lowest_index_on_ties() {
        assert_eq!(probs(&[0.1; 10]).argmax().0, 0);
    }

    #[test]
    fn test_top_k_descending_with_class_order_ties() {
        let p = probs(&[0.1, 0.3, 0.05, 0.3, 0.05, 0.05, 0.05, 0.05, 0.0, 0.05]);
        let top = p.top_k(3);

        assert_eq!(top.len(), 3);
        assert_eq!(top[0].class_id, 1);
        assert_eq!(top[1].class_id, 3);
        assert_eq!(top[2].class_id, 0);
        assert_eq!(top[0].class_name, "Tomato___Early_blight");
        assert!((top[2].percent() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_entropy_of_uniform_is_ln_10() {
        let entropy = probs(&[0.1; 10]).entropy();
        assert!((entropy - 10f64.ln()).abs() < 1e-4);
    }

    #[test]
    fn test_entropy_of_peaked_distribution_is_small() {
        let mut values = vec![0.01 / 9.0; 10];
        values[4] = 0.99;
        let entropy = probs(&values).entropy();
        assert!(entropy < 0.1);
    }

    #[test]
    fn test_missing_weights_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let handle = load_classifier_with_config::<DefaultBackend>(
            dir.path().join("best_model.mpk"),
            &ModelConfig::tiny(),
            &default_device(),
        )
        .unwrap();

        assert!(!handle.is_trained());
        assert!(matches!(
            handle.status(),
            ModelStatus::FallbackUntrained { .. }
        ));

        let p = handle.classify(&zero_tensor()).unwrap();
        assert_eq!(p.as_slice().len(), NUM_CLASSES);
        let sum: f32 = p.as_slice().iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_corrupt_weights_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mpk");
        std::fs::write(&path, b"not a burn record").unwrap();

        let handle = load_classifier_with_config::<DefaultBackend>(
            &path,
            &ModelConfig::tiny(),
            &default_device(),
        )
        .unwrap();

        match handle.status() {
            ModelStatus::FallbackUntrained { reason } => assert!(reason.contains("broken.mpk")),
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_recorded_weights_load_as_trained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.mpk");
        let config = ModelConfig::tiny();
        let device = default_device();

        PlantClassifier::<DefaultBackend>::new(&config.classifier_config(), &device)
            .save_file(path.clone(), &CompactRecorder::new())
            .unwrap();

        let handle =
            load_classifier_with_config::<DefaultBackend>(&path, &config, &device).unwrap();
        assert!(handle.is_trained());
        assert_eq!(
            handle.status(),
            &ModelStatus::Trained { weights_path: path }
        );
    }

    #[test]
    fn test_rejects_mismatched_input_shape() {
        let handle = ClassifierHandle::<DefaultBackend>::from_model(
            PlantClassifier::new(&ModelConfig::tiny().classifier_config(), &default_device()),
            ModelConfig::tiny(),
            default_device(),
            ModelStatus::FallbackUntrained {
                reason: "test".to_string(),
            },
        );
        let small = ImageTensor::from_chw(vec![0.0; 3 * 32 * 32], 32).unwrap();
        assert!(matches!(
            handle.logits(&small),
            Err(TomatoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_handle_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClassifierHandle<DefaultBackend>>();
    }

    #[test]
    fn test_concurrent_classify_matches() {
        let dir = tempfile::tempdir().unwrap();
        let handle = load_classifier_with_config::<DefaultBackend>(
            dir.path().join("missing.mpk"),
            &ModelConfig::tiny(),
            &default_device(),
        )
        .unwrap();
        let input = zero_tensor();
        let (handle, input) = (&handle, &input);

        let results: Vec<ProbabilityVector> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..4)
                .map(|_| s.spawn(move || handle.classify(input).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_slice().len(), NUM_CLASSES);
        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
    }
}
