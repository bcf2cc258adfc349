//! Job domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Job status enum.
///
/// Transitions are monotonic forward (pending -> processing -> completed/error)
/// except that a rerun re-enters `processing` from a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job created, records not yet parsed.
    Pending,
    /// Analysis pipeline in progress.
    Processing,
    /// Analysis complete, results available.
    Completed,
    /// Job failed.
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether a caller querying this job should receive results.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One analysis job: identity plus lifecycle state.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_reviews: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job with a fresh id.
    pub fn new(filename: Option<String>) -> Self {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            total_reviews: 0,
            filename,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Response returned by the analyze and rerun endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// "Accepted, not ready" body returned while a job is pending/processing.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobProgressResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}
