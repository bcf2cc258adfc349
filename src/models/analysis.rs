//! Analysis domain models: theme mentions, summaries, statistics, results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Binary sentiment tag on a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Positive aspect reviewers praise.
    Love,
    /// Complaint or improvement request.
    Improve,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Love => "love",
            Self::Improve => "improve",
        }
    }

    /// Parse a model-supplied polarity tag; unrecognized values fall back
    /// to `Love`.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "improve" => Self::Improve,
            _ => Self::Love,
        }
    }
}

/// One (theme, review) association produced by extraction.
///
/// Transient: consumed immediately by aggregation, never persisted.
#[derive(Debug, Clone)]
pub struct ThemeMention {
    /// Raw label as returned by the model; normalized during aggregation.
    pub theme_label: String,
    pub polarity: Polarity,
    /// Display-only id echoed from the model output.
    pub review_id: Option<String>,
    pub review_title: Option<String>,
    /// Short quoted snippet from the review body (<= 200 chars).
    pub review_snippet: Option<String>,
}

/// Representative quote attached to a theme summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub title: String,
    pub snippet: String,
}

/// One ranked theme after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThemeSummary {
    /// Normalized theme label.
    pub theme_label: String,
    /// Number of mentions contributing to this label+polarity.
    pub count: usize,
    pub polarity: Polarity,
    /// Up to 2 quotes, deduplicated by review title.
    pub quotes: Vec<Quote>,
}

/// Rating distribution counts. Fields always sum to the total review count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RatingDistribution {
    pub rating_1: u64,
    pub rating_2: u64,
    pub rating_3: u64,
    pub rating_4: u64,
    pub rating_5: u64,
}

impl RatingDistribution {
    pub fn total(&self) -> u64 {
        self.rating_1 + self.rating_2 + self.rating_3 + self.rating_4 + self.rating_5
    }
}

/// Overall sentiment classification derived from positive percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Trailing-window restatement of totals for trend comparison.
///
/// `themes_improve` carries the full-set improvement themes for display; it
/// is not re-filtered to the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrendWindow {
    pub window_days: i64,
    pub total_reviews: u64,
    pub positive_count: u64,
    pub negative_count: u64,
    pub neutral_count: u64,
    #[serde(default)]
    pub themes_improve: Vec<ThemeSummary>,
}

/// Complete analysis results for one job.
///
/// Immutable after persistence; superseded wholesale on rerun.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResults {
    pub job_id: Uuid,
    pub total_reviews: u64,
    pub rating_distribution: RatingDistribution,
    pub sentiment_summary: Sentiment,
    pub positive_sentiment_pct: f64,
    pub top_loved_themes: Vec<ThemeSummary>,
    pub top_improvement_themes: Vec<ThemeSummary>,
    pub trends: TrendWindow,
    pub executive_brief: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_parse_defaults_to_love() {
        assert_eq!(Polarity::parse_or_default("love"), Polarity::Love);
        assert_eq!(Polarity::parse_or_default("IMPROVE"), Polarity::Improve);
        assert_eq!(Polarity::parse_or_default("meh"), Polarity::Love);
        assert_eq!(Polarity::parse_or_default(""), Polarity::Love);
    }

    #[test]
    fn test_distribution_total() {
        let dist = RatingDistribution {
            rating_1: 1,
            rating_2: 2,
            rating_3: 3,
            rating_4: 4,
            rating_5: 5,
        };
        assert_eq!(dist.total(), 15);
    }
}
