//! Normalized review records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One normalized review parsed from an uploaded CSV.
///
/// Immutable once created; a job owns many of these for its lifetime so a
/// rerun never requires re-upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewRecord {
    /// External review id from the source file, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_content: Option<String>,
    /// Integer rating clamped to [1,5]; 3 when unparseable.
    pub rating: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}
