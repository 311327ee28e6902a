//! Plausibility checks on predictions
//!
//! `heuristic` scores raw pixel statistics; `validator` combines that score
//! with the classifier's output into a verdict.

pub mod heuristic;
pub mod validator;

pub use heuristic::{HeuristicScore, HeuristicThresholds};
pub use validator::{
    Finding, PredictionValidator, Rule, Severity, ValidationInput, ValidationThresholds,
    ValidationVerdict,
};
