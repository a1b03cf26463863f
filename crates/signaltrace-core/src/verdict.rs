//! Classification verdicts.

use serde::{Deserialize, Serialize};

/// Confidence above this value marks an entry as an anomaly.
///
/// This is the sole threshold separating "anomaly" from "clear"; no other
/// verdict field carries that signal.
pub const ANOMALY_THRESHOLD: u8 = 50;

/// Classification outcome for exactly one [`LogEntry`](crate::LogEntry) identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    /// Identity of the classified entry
    pub id: String,

    /// Anomaly confidence, 0-100
    pub confidence: u8,

    /// Human-readable reasoning
    pub reason: String,

    /// Suggested remediation, attached by a later step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Verdict {
    /// Build a verdict with no remediation attached
    pub fn new(id: impl Into<String>, confidence: u8, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            confidence,
            reason: reason.into(),
            remediation: None,
        }
    }

    /// Whether this verdict flags an anomaly
    pub fn is_anomaly(&self) -> bool {
        self.confidence > ANOMALY_THRESHOLD
    }

    /// Attach remediation text without touching confidence or reason
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}
