//! Rating and sentiment statistics.
//!
//! Pure functions of the review sequence; no storage or model access.

use chrono::{Duration, NaiveDate};

use crate::models::{RatingDistribution, ReviewRecord, Sentiment, ThemeSummary, TrendWindow};

/// Count reviews at each integer rating 1-5.
///
/// Ratings are already clamped by the normalizer, so the counters always sum
/// to the total review count.
pub fn rating_distribution(reviews: &[ReviewRecord]) -> RatingDistribution {
    let mut dist = RatingDistribution::default();
    for review in reviews {
        match review.rating {
            1 => dist.rating_1 += 1,
            2 => dist.rating_2 += 1,
            3 => dist.rating_3 += 1,
            4 => dist.rating_4 += 1,
            5 => dist.rating_5 += 1,
            _ => {}
        }
    }
    dist
}

/// Percentage of reviews rated 4 or 5, in [0,100]. Zero for an empty set.
pub fn positive_percentage(dist: &RatingDistribution) -> f64 {
    let total = dist.total();
    if total == 0 {
        return 0.0;
    }
    let positive = dist.rating_4 + dist.rating_5;
    positive as f64 / total as f64 * 100.0
}

/// Classify overall sentiment from the positive percentage.
pub fn classify_sentiment(positive_pct: f64) -> Sentiment {
    if positive_pct >= 60.0 {
        Sentiment::Positive
    } else if positive_pct >= 40.0 {
        Sentiment::Neutral
    } else {
        Sentiment::Negative
    }
}

/// Restate sentiment counts over a trailing window ending at `today`.
///
/// Only reviews with a parsed date inside the window participate; undated
/// reviews are excluded entirely rather than counted as neutral. The
/// improvement themes are attached afterwards by the pipeline (full-set, for
/// display).
pub fn trend_window(
    reviews: &[ReviewRecord],
    window_days: i64,
    today: NaiveDate,
    themes_improve: Vec<ThemeSummary>,
) -> TrendWindow {
    let cutoff = today - Duration::days(window_days);

    let recent: Vec<&ReviewRecord> = reviews
        .iter()
        .filter(|r| r.review_date.is_some_and(|d| d >= cutoff))
        .collect();

    let positive_count = recent.iter().filter(|r| r.rating >= 4).count() as u64;
    let negative_count = recent.iter().filter(|r| r.rating <= 2).count() as u64;
    let total_reviews = recent.len() as u64;

    TrendWindow {
        window_days,
        total_reviews,
        positive_count,
        negative_count,
        neutral_count: total_reviews - positive_count - negative_count,
        themes_improve,
    }
}
