use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The authenticated entity an analysis record belongs to. The session
/// layer that establishes identity is out of scope; everything here only
/// needs an opaque owner value to scope reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Principal(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an analysis. `Success` and `Failed` are terminal;
/// a record never transitions again once it reaches either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Success,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Success => "success",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisStatus::Pending)
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "success" => Ok(AnalysisStatus::Success),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(format!("unknown analysis status: {other}")),
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome returned by the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub predicted_label: String,
    pub confidence_score: f64,
}

/// Denormalized completion blob kept alongside the flat columns.
/// Derived from `confidence_score` and the completion time; never read
/// as the authoritative value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedResult {
    pub probability: f64,
    pub timestamp: String,
}

/// One persisted analysis: the pending or terminal outcome of a single
/// submitted image. Owned by the record store; presentation code only
/// ever borrows these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub image_path: String,
    pub status: AnalysisStatus,
    pub predicted_label: Option<String>,
    pub confidence_score: Option<f64>,
    pub failure_reason: Option<String>,
    pub result: Option<DerivedResult>,
}

impl AnalysisRecord {
    /// Label and score are set together on success and never otherwise.
    pub fn has_consistent_outcome(&self) -> bool {
        match self.status {
            AnalysisStatus::Success => {
                matches!(
                    (&self.predicted_label, self.confidence_score),
                    (Some(label), Some(score)) if !label.is_empty() && (0.0..=1.0).contains(&score)
                )
            }
            _ => self.predicted_label.is_none() && self.confidence_score.is_none(),
        }
    }
}
