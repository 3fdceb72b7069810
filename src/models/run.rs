//! Run status vocabulary and result reporting types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Destination;

/// Lifecycle state of a processing run.
///
/// `Completed` and `Failed` are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Pending,
    Extracting,
    AwaitingReview,
    Reviewing,
    Finalizing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::AwaitingReview => "awaiting-review",
            Self::Reviewing => "reviewing",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One output document written by the splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitFile {
    pub path: PathBuf,
    /// Pages written; authoritative count for reporting.
    pub pages: u32,
}

/// Wall-clock timings for the blocking pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingMetrics {
    pub extraction_secs: f64,
    pub finalize_secs: f64,
}

/// Review outcome counts for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub questions_total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// SHA-256 of the source document, when recorded at upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_sha256: Option<String>,
    pub statement_count: usize,
    /// Records routed to each bucket.
    pub destination_breakdown: BTreeMap<Destination, usize>,
    /// Pages written per bucket, as counted by the splitter.
    pub page_counts: BTreeMap<Destination, u32>,
    pub review: ReviewStats,
    pub timing: TimingMetrics,
}

/// SHA-256 content hash, hex-encoded. Recorded per uploaded file for
/// integrity reporting.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
