//! Disease knowledge base
//!
//! Static, read-only descriptions of each tomato class: symptoms, causes,
//! prevention, treatment and a care schedule. The table ships embedded in
//! the binary and can be replaced by a JSON file with the same layout.
//! Every field is optional; consumers must render whatever is present.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::utils::error::{Result, TomatoError};

const EMBEDDED_DISEASE_INFO: &str = include_str!("../../data/disease_info.json");

/// A field that may be written as a single sentence or a list of items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    /// The field as a list of items
    pub fn items(&self) -> Vec<&str> {
        match self {
            TextOrList::Text(text) => vec![text.as_str()],
            TextOrList::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// Care schedule: period to activity, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule(Vec<(String, String)>);

impl Schedule {
    pub fn entries(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (period, activity) in &self.0 {
            map.serialize_entry(period, activity)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ScheduleVisitor;

        impl<'de> Visitor<'de> for ScheduleVisitor {
            type Value = Schedule;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of period to activity")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((period, activity)) = access.next_entry::<String, String>()? {
                    entries.push((period, activity));
                }
                Ok(Schedule(entries))
            }
        }

        deserializer.deserialize_map(ScheduleVisitor)
    }
}

/// Descriptive record for one class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiseaseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causes: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<TextOrList>,
    /// Care routine, used for the healthy class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_conditions: Option<TextOrList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention_schedule: Option<Schedule>,
    /// Schedule for the healthy class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_schedule: Option<Schedule>,
}

impl DiseaseMetadata {
    pub fn is_empty(&self) -> bool {
        *self == DiseaseMetadata::default()
    }

    /// The care schedule to show, preferring the prevention schedule
    pub fn schedule(&self) -> Option<&Schedule> {
        [&self.prevention_schedule, &self.maintenance_schedule]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }

    pub fn severity_level(&self) -> SeverityLevel {
        self.severity
            .as_deref()
            .map(SeverityLevel::parse)
            .unwrap_or(SeverityLevel::Unknown)
    }
}

/// Severity grading used to choose follow-up actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    VeryHigh,
    High,
    Medium,
    None,
    Unknown,
}

impl SeverityLevel {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "very high" | "very_high" | "critical" => SeverityLevel::VeryHigh,
            "high" => SeverityLevel::High,
            "medium" | "moderate" => SeverityLevel::Medium,
            "none" | "low" => SeverityLevel::None,
            _ => SeverityLevel::Unknown,
        }
    }
}

/// Recommended follow-up for a diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub headline: String,
    pub steps: Vec<String>,
}

impl ActionPlan {
    fn new(headline: &str, steps: &[&str]) -> Self {
        Self {
            headline: headline.to_string(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Pick follow-up actions from the verdict and the disease severity
pub fn action_plan(is_valid_subject: bool, severity: SeverityLevel) -> ActionPlan {
    if !is_valid_subject {
        return ActionPlan::new(
            "INVALID IMAGE - NOT A TOMATO LEAF",
            &[
                "Upload a clear photo of a tomato leaf",
                "Make sure the leaf is well lit",
                "Focus the camera on a single leaf",
                "Avoid busy backgrounds",
                "Use a reasonably high resolution image",
            ],
        );
    }

    match severity {
        SeverityLevel::VeryHigh => ActionPlan::new(
            "EMERGENCY ACTION REQUIRED",
            &[
                "Isolate infected plants immediately",
                "Start intensive treatment within 24 hours",
                "Check neighboring plants for spread every day",
                "Consult an agronomist as soon as possible",
            ],
        ),
        SeverityLevel::High => ActionPlan::new(
            "PROMPT ACTION NEEDED",
            &[
                "Treat as recommended within 2-3 days",
                "Increase monitoring",
                "Isolate affected plants to limit spread",
                "Document how the disease develops",
            ],
        ),
        SeverityLevel::Medium => ActionPlan::new(
            "MONITOR AND TREAT",
            &[
                "Apply preventive treatment",
                "Step up routine care",
                "Monitor every 3-5 days",
                "Focus on prevention",
            ],
        ),
        SeverityLevel::None | SeverityLevel::Unknown => ActionPlan::new(
            "MAINTAIN OPTIMAL CONDITIONS",
            &[
                "Continue routine care",
                "Weekly monitoring is sufficient",
                "Optimize plant growth",
                "Keep environmental conditions optimal",
            ],
        ),
    }
}

/// Class label to metadata lookup table
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: HashMap<String, DiseaseMetadata>,
}

impl KnowledgeBase {
    /// The table compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_DISEASE_INFO)
    }

    /// Load a table from a JSON file keyed by class label
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let kb = Self::from_json(&json)
            .map_err(|e| TomatoError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded {} disease entries from {}", kb.len(), path.display());
        Ok(kb)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: HashMap<String, DiseaseMetadata> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    pub fn get(&self, class_name: &str) -> Option<&DiseaseMetadata> {
        self.entries.get(class_name)
    }

    /// Metadata for a class, empty when the class has no entry
    pub fn lookup(&self, class_name: &str) -> DiseaseMetadata {
        self.get(class_name).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::CLASS_NAMES;

    #[test]
    fn test_embedded_covers_every_class() {
        let kb = KnowledgeBase::embedded().unwrap();
        for name in CLASS_NAMES {
            let info = kb.get(name).unwrap();
            assert!(info.description.is_some(), "{} has no description", name);
            assert!(info.schedule().is_some(), "{} has no schedule", name);
        }
    }

    #[test]
    fn test_missing_entry_is_empty() {
        let kb = KnowledgeBase::default();
        assert!(kb.lookup("Tomato___healthy").is_empty());
    }

    #[test]
    fn test_partial_record_and_text_or_list() {
        let kb = KnowledgeBase::from_json(
            r#"{"X": {"symptoms": "one sentence", "causes": ["a", "b"]}}"#,
        )
        .unwrap();
        let info = kb.lookup("X");

        assert_eq!(info.symptoms.as_ref().unwrap().items(), vec!["one sentence"]);
        assert_eq!(info.causes.as_ref().unwrap().items(), vec!["a", "b"]);
        assert!(info.treatment.is_none());
        assert!(info.schedule().is_none());
    }

    #[test]
    fn test_schedule_keeps_document_order() {
        let kb = KnowledgeBase::from_json(
            r#"{
                "A": {"prevention_schedule": {"Weekly": "w", "Bi-weekly": "b", "Monthly": "m"}},
                "B": {"maintenance_schedule": {"Daily": "d"}}
            }"#,
        )
        .unwrap();

        let a = kb.lookup("A");
        let periods: Vec<&str> = a
            .schedule()
            .unwrap()
            .entries()
            .iter()
            .map(|(p, _)| p.as_str())
            .collect();
        assert_eq!(periods, vec!["Weekly", "Bi-weekly", "Monthly"]);

        let b = kb.lookup("B");
        assert_eq!(b.schedule().unwrap().entries().len(), 1);
    }

    #[test]
    fn test_entry_with_both_schedules_prefers_prevention() {
        let kb = KnowledgeBase::from_json(
            r#"{"Tomato___healthy": {"prevention_schedule": {"a": "b"}, "maintenance_schedule": {"c": "d"}}}"#,
        )
        .unwrap();
        let info = kb.lookup("Tomato___healthy");

        assert_eq!(
            info.schedule().unwrap().entries(),
            &[("a".to_string(), "b".to_string())]
        );
        assert!(info.maintenance_schedule.is_some());

        // An empty prevention schedule does not hide the maintenance one
        let kb = KnowledgeBase::from_json(
            r#"{"X": {"prevention_schedule": {}, "maintenance_schedule": {"c": "d"}}}"#,
        )
        .unwrap();
        let info = kb.lookup("X");
        assert_eq!(info.schedule().unwrap().entries()[0].0, "c");
    }

    #[test]
    fn test_severity_levels_and_action_plans() {
        let kb = KnowledgeBase::embedded().unwrap();
        assert_eq!(
            kb.lookup("Tomato___Late_blight").severity_level(),
            SeverityLevel::VeryHigh
        );
        assert_eq!(
            kb.lookup("Tomato___healthy").severity_level(),
            SeverityLevel::None
        );
        assert_eq!(SeverityLevel::parse("whatever"), SeverityLevel::Unknown);

        let plan = action_plan(false, SeverityLevel::VeryHigh);
        assert!(plan.headline.starts_with("INVALID IMAGE"));
        let plan = action_plan(true, SeverityLevel::Medium);
        assert_eq!(plan.headline, "MONITOR AND TREAT");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, r#"{"Tomato___healthy": {"severity": "None"}}"#).unwrap();

        let kb = KnowledgeBase::load(&path).unwrap();
        assert_eq!(kb.len(), 1);

        std::fs::write(&path, "not json").unwrap();
        assert!(KnowledgeBase::load(&path).is_err());
    }
}
