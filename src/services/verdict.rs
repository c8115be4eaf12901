use crate::models::job::Detection;

/// Decides whether a set of detections counts as the target class.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictPolicy {
    pub target_label: String,
    pub confidence_threshold: f64,
}

impl VerdictPolicy {
    pub fn new(target_label: impl Into<String>, confidence_threshold: f64) -> Self {
        Self {
            target_label: target_label.into(),
            confidence_threshold,
        }
    }
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self::new("Hot dog", 0.6)
    }
}

/// True iff some detection carries exactly the target label with a confidence
/// strictly above the threshold. An empty list is a negative result.
pub fn derive_verdict(detections: &[Detection], policy: &VerdictPolicy) -> bool {
    detections.iter().any(|d| {
        d.label == policy.target_label && d.confidence > policy.confidence_threshold
    })
}
