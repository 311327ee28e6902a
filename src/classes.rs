//! Tomato disease class labels
//!
//! The position of each label is the classifier's output index, so this
//! order must match the order used when the weights were trained
//! (alphabetical folder order of the PlantVillage tomato subset).

/// Number of classes the classifier predicts
pub const NUM_CLASSES: usize = 10;

/// Class names in classifier output order.
/// Format: "Tomato___Disease" or "Tomato___healthy"
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Tomato___Bacterial_spot",
    "Tomato___Early_blight",
    "Tomato___Late_blight",
    "Tomato___Leaf_Mold",
    "Tomato___Septoria_leaf_spot",
    "Tomato___Spider_mites Two-spotted_spider_mite",
    "Tomato___Target_Spot",
    "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato___Tomato_mosaic_virus",
    "Tomato___healthy",
];

/// Get the class name for a given label index
pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Get the label index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

/// Check if a class represents a healthy plant (not diseased)
pub fn is_healthy_class(label: usize) -> bool {
    CLASS_NAMES
        .get(label)
        .map(|name| name.ends_with("healthy"))
        .unwrap_or(false)
}

/// Human-readable label, e.g. "Spider mites (two-spotted spider mite)"
pub fn display_name(label: usize) -> Option<&'static str> {
    const DISPLAY: [&str; NUM_CLASSES] = [
        "Bacterial spot",
        "Early blight",
        "Late blight",
        "Leaf mold",
        "Septoria leaf spot",
        "Spider mites (two-spotted spider mite)",
        "Target spot",
        "Tomato yellow leaf curl virus",
        "Tomato mosaic virus",
        "Healthy",
    ];
    DISPLAY.get(label).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name() {
        assert_eq!(class_name(0), Some("Tomato___Bacterial_spot"));
        assert_eq!(class_name(9), Some("Tomato___healthy"));
        assert_eq!(class_name(10), None);
    }

    #[test]
    fn test_class_index() {
        assert_eq!(class_index("Tomato___Late_blight"), Some(2));
        assert_eq!(
            class_index("Tomato___Spider_mites Two-spotted_spider_mite"),
            Some(5)
        );
        assert_eq!(class_index("Apple___Apple_scab"), None);
    }

    #[test]
    fn test_is_healthy_class() {
        assert!(!is_healthy_class(0));
        assert!(is_healthy_class(9));
        assert!(!is_healthy_class(42));
    }

    #[test]
    fn test_display_names_cover_all_classes() {
        for label in 0..NUM_CLASSES {
            assert!(display_name(label).is_some());
        }
        assert_eq!(display_name(3), Some("Leaf mold"));
    }
}
