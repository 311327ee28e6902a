//! Prediction validator
//!
//! Decides whether a prediction plausibly concerns a tomato leaf at all.
//! A fixed, ordered list of rules is evaluated over the classifier output
//! and the color heuristic. Each rule can only add findings; an `Invalid`
//! finding marks the subject as implausible, an `Advisory` finding only
//! adds a note. Every rule runs on every call so the debug metrics are
//! always complete.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::heuristic::HeuristicScore;
use crate::inference::classifier::{ProbabilityVector, TopKEntry};
use crate::utils::error::{Result, TomatoError};

pub const REASON_CONFIDENCE_VERY_LOW: &str = "confidence very low";
pub const REASON_CONFIDENCE_SUBOPTIMAL: &str = "confidence suboptimal";
pub const REASON_ALL_LOW: &str = "all predictions low probability";
pub const REASON_INDISTINCT: &str = "model cannot distinguish classes clearly";
pub const REASON_EXTREME_UNCERTAINTY: &str = "extremely high uncertainty";
pub const REASON_UNCERTAIN: &str = "model uncertain";

pub const INVALID_PREFIX: &str = "Warning: image is likely not the expected subject. ";
pub const ADVISORY_PREFIX: &str = "Note: ";

/// Reasons shown in an invalid verdict's warning
const MAX_INVALID_REASONS_SHOWN: usize = 3;
/// Reasons shown in an advisory note
const MAX_ADVISORY_REASONS_SHOWN: usize = 2;

/// Decision thresholds; percentages are on a 0-100 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationThresholds {
    /// Heuristic score at or above which the subject is invalid
    pub heuristic_invalid: u32,
    /// Heuristic score at or above which a note is added
    pub heuristic_advisory: u32,
    /// Heuristic reasons carried into an invalid verdict
    pub heuristic_invalid_reasons: usize,
    /// Heuristic reasons carried into an advisory note
    pub heuristic_advisory_reasons: usize,
    /// Confidence below this is invalid
    pub confidence_invalid: f64,
    /// Confidence below this is advisory
    pub confidence_advisory: f64,
    /// Top-3 maximum below this is invalid
    pub top3_min_max: f64,
    /// Top-3 range below this is invalid
    pub top3_min_spread: f64,
    /// Entropy (nats) above this is invalid
    pub entropy_invalid: f64,
    /// Entropy (nats) above this is advisory
    pub entropy_advisory: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            heuristic_invalid: 40,
            heuristic_advisory: 25,
            heuristic_invalid_reasons: 2,
            heuristic_advisory_reasons: 1,
            confidence_invalid: 20.0,
            confidence_advisory: 40.0,
            top3_min_max: 30.0,
            top3_min_spread: 10.0,
            entropy_invalid: 2.2,
            entropy_advisory: 1.9,
        }
    }
}

impl ValidationThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.heuristic_advisory > self.heuristic_invalid {
            return Err(TomatoError::Config(
                "heuristic_advisory must not exceed heuristic_invalid".to_string(),
            ));
        }
        if self.confidence_invalid > self.confidence_advisory {
            return Err(TomatoError::Config(
                "confidence_invalid must not exceed confidence_advisory".to_string(),
            ));
        }
        if self.entropy_advisory > self.entropy_invalid {
            return Err(TomatoError::Config(
                "entropy_advisory must not exceed entropy_invalid".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The subject is likely not a tomato leaf
    Invalid,
    /// The prediction stands but deserves a note
    Advisory,
}

/// The rules, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    HeuristicScore,
    Confidence,
    Top3Spread,
    Entropy,
}

impl Rule {
    pub const ORDER: [Rule; 4] = [
        Rule::HeuristicScore,
        Rule::Confidence,
        Rule::Top3Spread,
        Rule::Entropy,
    ];

    fn evaluate(
        self,
        input: &ValidationInput<'_>,
        metrics: &Metrics,
        t: &ValidationThresholds,
    ) -> Vec<Finding> {
        let finding = |severity: Severity, reason: &str| Finding {
            rule: self,
            severity,
            reason: reason.to_string(),
        };

        match self {
            Rule::HeuristicScore => {
                let heuristic = input.heuristic;
                let (severity, take) = if heuristic.score >= t.heuristic_invalid {
                    (Severity::Invalid, t.heuristic_invalid_reasons)
                } else if heuristic.score >= t.heuristic_advisory {
                    (Severity::Advisory, t.heuristic_advisory_reasons)
                } else {
                    return Vec::new();
                };
                heuristic
                    .reasons
                    .iter()
                    .take(take)
                    .map(|reason| finding(severity, reason.as_str()))
                    .collect()
            }
            Rule::Confidence => {
                let confidence = input.confidence_percent as f64;
                if confidence < t.confidence_invalid {
                    vec![finding(Severity::Invalid, REASON_CONFIDENCE_VERY_LOW)]
                } else if confidence < t.confidence_advisory {
                    vec![finding(Severity::Advisory, REASON_CONFIDENCE_SUBOPTIMAL)]
                } else {
                    Vec::new()
                }
            }
            Rule::Top3Spread => {
                // Max check takes precedence; the spread check only runs
                // when the top prediction clears the floor.
                if metrics.top3_max < t.top3_min_max {
                    vec![finding(Severity::Invalid, REASON_ALL_LOW)]
                } else if metrics.top3_spread < t.top3_min_spread {
                    vec![finding(Severity::Invalid, REASON_INDISTINCT)]
                } else {
                    Vec::new()
                }
            }
            Rule::Entropy => {
                if metrics.entropy > t.entropy_invalid {
                    vec![finding(Severity::Invalid, REASON_EXTREME_UNCERTAINTY)]
                } else if metrics.entropy > t.entropy_advisory {
                    vec![finding(Severity::Advisory, REASON_UNCERTAIN)]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// A single reason produced by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: Rule,
    pub severity: Severity,
    pub reason: String,
}

/// Everything the validator looks at for one prediction
#[derive(Debug, Clone)]
pub struct ValidationInput<'a> {
    pub probabilities: &'a ProbabilityVector,
    pub predicted_class: usize,
    pub confidence_percent: f32,
    pub top_k: &'a [TopKEntry],
    pub heuristic: &'a HeuristicScore,
}

impl<'a> ValidationInput<'a> {
    pub fn new(
        probabilities: &'a ProbabilityVector,
        top_k: &'a [TopKEntry],
        heuristic: &'a HeuristicScore,
    ) -> Self {
        let (predicted_class, confidence) = probabilities.argmax();
        Self {
            probabilities,
            predicted_class,
            confidence_percent: confidence * 100.0,
            top_k,
            heuristic,
        }
    }
}

/// Derived numbers, computed once and shared by rules and debug output
#[derive(Debug, Clone, Copy)]
struct Metrics {
    entropy: f64,
    top3_max: f64,
    top3_spread: f64,
}

impl Metrics {
    fn compute(input: &ValidationInput<'_>) -> Self {
        let percents = input.top_k.iter().map(|e| e.percent() as f64);
        let top3_max = percents.clone().fold(f64::NEG_INFINITY, f64::max);
        let top3_min = percents.fold(f64::INFINITY, f64::min);
        let (top3_max, top3_spread) = if input.top_k.is_empty() {
            (0.0, 0.0)
        } else {
            (top3_max, top3_max - top3_min)
        };

        Self {
            entropy: input.probabilities.entropy(),
            top3_max,
            top3_spread,
        }
    }
}

/// Intermediate values kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDebug {
    pub heuristic_score: u32,
    pub heuristic_reasons: Vec<String>,
    pub confidence_percent: f32,
    pub entropy: f64,
    /// Range of the top-3 probabilities in percent
    pub top3_spread: f64,
}

/// Outcome of validating one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_likely_valid_subject: bool,
    pub warning_message: Option<String>,
    /// Every reason, in rule order
    pub reasons: Vec<String>,
    pub findings: Vec<Finding>,
    pub debug: ValidationDebug,
}

impl ValidationVerdict {
    pub fn has_invalid_findings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Invalid)
    }
}

fn warning_message(is_valid: bool, reasons: &[String]) -> Option<String> {
    if !is_valid {
        let shown: Vec<&str> = reasons
            .iter()
            .take(MAX_INVALID_REASONS_SHOWN)
            .map(String::as_str)
            .collect();
        Some(format!("{}{}", INVALID_PREFIX, shown.join("; ")))
    } else if !reasons.is_empty() {
        let shown: Vec<&str> = reasons
            .iter()
            .take(MAX_ADVISORY_REASONS_SHOWN)
            .map(String::as_str)
            .collect();
        Some(format!("{}{}", ADVISORY_PREFIX, shown.join("; ")))
    } else {
        None
    }
}

/// Runs the validation rules
#[derive(Debug, Clone, Default)]
pub struct PredictionValidator {
    thresholds: ValidationThresholds,
}

impl PredictionValidator {
    pub fn new(thresholds: ValidationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ValidationThresholds {
        &self.thresholds
    }

    pub fn validate(&self, input: &ValidationInput<'_>) -> ValidationVerdict {
        let metrics = Metrics::compute(input);

        let findings: Vec<Finding> = Rule::ORDER
            .iter()
            .flat_map(|rule| rule.evaluate(input, &metrics, &self.thresholds))
            .collect();

        let is_valid = !findings.iter().any(|f| f.severity == Severity::Invalid);
        let reasons: Vec<String> = findings.iter().map(|f| f.reason.clone()).collect();

        debug!(
            "Validation: valid={}, heuristic={}, confidence={:.2}%, entropy={:.3}, spread={:.2}",
            is_valid,
            input.heuristic.score,
            input.confidence_percent,
            metrics.entropy,
            metrics.top3_spread
        );

        ValidationVerdict {
            is_likely_valid_subject: is_valid,
            warning_message: warning_message(is_valid, &reasons),
            reasons,
            findings,
            debug: ValidationDebug {
                heuristic_score: input.heuristic.score,
                heuristic_reasons: input.heuristic.reasons.clone(),
                confidence_percent: input.confidence_percent,
                entropy: metrics.entropy,
                top3_spread: metrics.top3_spread,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::heuristic::{REASON_LIGHTING, REASON_NOT_GREEN};

    fn probs(values: &[f32]) -> ProbabilityVector {
        ProbabilityVector::new(values.to_vec()).unwrap()
    }

    fn peaked() -> ProbabilityVector {
        let mut values = vec![0.01; 10];
        values[3] = 0.91;
        probs(&values)
    }

    fn heuristic(score: u32, reasons: &[&str]) -> HeuristicScore {
        HeuristicScore {
            score,
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    fn run(p: &ProbabilityVector, h: &HeuristicScore) -> ValidationVerdict {
        let top = p.top_k(3);
        PredictionValidator::default().validate(&ValidationInput::new(p, &top, h))
    }

    #[test]
    fn test_confident_green_prediction_is_valid() {
        let verdict = run(&peaked(), &HeuristicScore::default());

        assert!(verdict.is_likely_valid_subject);
        assert!(verdict.reasons.is_empty());
        assert_eq!(verdict.warning_message, None);
        assert!((verdict.debug.top3_spread - 90.0).abs() < 1e-3);
        assert!(verdict.debug.entropy < 0.6);
    }

    #[test]
    fn test_uniform_distribution_is_invalid() {
        let verdict = run(&probs(&[0.1; 10]), &HeuristicScore::default());

        assert!(!verdict.is_likely_valid_subject);
        assert_eq!(
            verdict.reasons,
            vec![
                REASON_CONFIDENCE_VERY_LOW,
                REASON_ALL_LOW,
                REASON_EXTREME_UNCERTAINTY
            ]
        );
        // Max check fired, so the spread check must not
        assert!(!verdict.reasons.iter().any(|r| r == REASON_INDISTINCT));
        assert!((verdict.debug.entropy - 10f64.ln()).abs() < 1e-4);
    }

    #[test]
    fn test_all_rules_run_and_warning_shows_first_three() {
        let h = heuristic(50, &[REASON_NOT_GREEN, REASON_LIGHTING]);
        let verdict = run(&probs(&[0.1; 10]), &h);

        assert_eq!(verdict.reasons.len(), 5);
        assert_eq!(verdict.findings.len(), 5);
        assert_eq!(verdict.findings[0].rule, Rule::HeuristicScore);
        assert_eq!(verdict.findings[4].rule, Rule::Entropy);
        assert_eq!(
            verdict.warning_message.as_deref(),
            Some(
                "Warning: image is likely not the expected subject. \
                 dominant color is not green; lighting not optimal; confidence very low"
            )
        );
        assert_eq!(verdict.debug.heuristic_score, 50);
        assert_eq!(verdict.debug.heuristic_reasons.len(), 2);
    }

    #[test]
    fn test_close_top_three_cannot_distinguish() {
        let mut values = vec![0.02 / 7.0; 10];
        values[0] = 0.35;
        values[1] = 0.33;
        values[2] = 0.30;
        let verdict = run(&probs(&values), &HeuristicScore::default());

        assert!(!verdict.is_likely_valid_subject);
        assert_eq!(
            verdict.reasons,
            vec![REASON_CONFIDENCE_SUBOPTIMAL, REASON_INDISTINCT]
        );
        assert!((verdict.debug.top3_spread - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_heuristic_advisory_keeps_verdict_valid() {
        let verdict = run(&peaked(), &heuristic(30, &[REASON_NOT_GREEN]));

        assert!(verdict.is_likely_valid_subject);
        assert_eq!(verdict.findings[0].severity, Severity::Advisory);
        assert_eq!(
            verdict.warning_message.as_deref(),
            Some("Note: dominant color is not green")
        );
    }

    #[test]
    fn test_heuristic_boundaries() {
        let reasons = [REASON_NOT_GREEN, REASON_LIGHTING, "third"];

        let verdict = run(&peaked(), &heuristic(24, &reasons));
        assert!(verdict.reasons.is_empty());

        let verdict = run(&peaked(), &heuristic(25, &reasons));
        assert!(verdict.is_likely_valid_subject);
        assert_eq!(verdict.reasons, vec![REASON_NOT_GREEN]);

        let verdict = run(&peaked(), &heuristic(40, &reasons));
        assert!(!verdict.is_likely_valid_subject);
        assert_eq!(verdict.reasons, vec![REASON_NOT_GREEN, REASON_LIGHTING]);
    }

    #[test]
    fn test_confidence_boundaries() {
        let p = peaked();
        let top = p.top_k(3);
        let h = HeuristicScore::default();
        let validator = PredictionValidator::default();

        let mut input = ValidationInput::new(&p, &top, &h);
        input.confidence_percent = 19.9;
        let verdict = validator.validate(&input);
        assert!(!verdict.is_likely_valid_subject);
        assert_eq!(verdict.reasons, vec![REASON_CONFIDENCE_VERY_LOW]);

        input.confidence_percent = 20.0;
        let verdict = validator.validate(&input);
        assert!(verdict.is_likely_valid_subject);
        assert_eq!(verdict.reasons, vec![REASON_CONFIDENCE_SUBOPTIMAL]);

        input.confidence_percent = 40.0;
        assert!(validator.validate(&input).reasons.is_empty());
    }

    #[test]
    fn test_moderate_entropy_is_advisory() {
        let mut values = vec![0.58 / 9.0; 10];
        values[6] = 0.42;
        let verdict = run(&probs(&values), &HeuristicScore::default());

        assert!(verdict.is_likely_valid_subject);
        assert!(verdict.debug.entropy > 1.9 && verdict.debug.entropy <= 2.2);
        assert_eq!(verdict.warning_message.as_deref(), Some("Note: model uncertain"));
    }

    #[test]
    fn test_advisory_note_shows_first_two() {
        let mut values = vec![0.58 / 9.0; 10];
        values[6] = 0.42;
        let p = probs(&values);
        let top = p.top_k(3);
        let h = heuristic(30, &[REASON_NOT_GREEN]);
        let mut input = ValidationInput::new(&p, &top, &h);
        input.confidence_percent = 35.0;

        let verdict = PredictionValidator::default().validate(&input);
        assert!(verdict.is_likely_valid_subject);
        assert_eq!(verdict.reasons.len(), 3);
        assert_eq!(
            verdict.warning_message.as_deref(),
            Some("Note: dominant color is not green; confidence suboptimal")
        );
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ValidationThresholds::default().validate().is_ok());
        let bad = ValidationThresholds {
            entropy_advisory: 3.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
