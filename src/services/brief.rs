//! Executive brief synthesis.
//!
//! Composes the aggregate statistics into one narrative prompt. A model
//! failure here must never fail the job: a deterministic templated brief is
//! produced from the same statistics instead.

use serde_json::json;
use tracing::warn;

use crate::models::{RatingDistribution, Sentiment, ThemeSummary, TrendWindow};
use crate::services::llm::CompletionClient;

/// Max tokens for the brief response.
const BRIEF_MAX_TOKENS: u32 = 2000;

const BRIEF_SYSTEM_PROMPT: &str =
    "You are a business analyst writing executive summaries based on product review data.";

/// Inputs for brief generation, borrowed from the pipeline's working state.
pub struct BriefInputs<'a> {
    pub total_reviews: u64,
    pub rating_distribution: &'a RatingDistribution,
    pub sentiment: Sentiment,
    pub top_loved_themes: &'a [ThemeSummary],
    pub top_improvement_themes: &'a [ThemeSummary],
    pub trends: &'a TrendWindow,
}

/// Generate the executive brief, falling back to a deterministic template on
/// any model failure. Always returns non-empty text.
pub async fn generate_brief(client: &dyn CompletionClient, inputs: &BriefInputs<'_>) -> String {
    let prompt = build_brief_prompt(inputs);

    match client
        .complete(BRIEF_SYSTEM_PROMPT, &prompt, BRIEF_MAX_TOKENS, 0.5)
        .await
    {
        Ok(brief) => {
            let brief = brief.trim().to_string();
            if brief.is_empty() {
                warn!("Model returned an empty brief, using fallback");
                fallback_brief(inputs)
            } else {
                brief
            }
        }
        Err(e) => {
            warn!("Brief generation failed, using fallback: {}", e);
            fallback_brief(inputs)
        }
    }
}

fn theme_labels_with_counts(themes: &[ThemeSummary]) -> Vec<serde_json::Value> {
    themes
        .iter()
        .map(|t| json!({"theme": t.theme_label, "count": t.count}))
        .collect()
}

fn build_brief_prompt(inputs: &BriefInputs<'_>) -> String {
    let stats_summary = json!({
        "total_reviews": inputs.total_reviews,
        "rating_distribution": inputs.rating_distribution,
        "sentiment": inputs.sentiment.as_str(),
        "top_loved_themes": theme_labels_with_counts(inputs.top_loved_themes),
        "top_improvement_themes": theme_labels_with_counts(inputs.top_improvement_themes),
        "recent_trends": {
            "window_days": inputs.trends.window_days,
            "recent_reviews": inputs.trends.total_reviews,
            "recent_positive": inputs.trends.positive_count,
            "recent_negative": inputs.trends.negative_count,
        },
    });

    format!(
        "Based on the following product review analysis, write a concise executive brief \
         (3-4 paragraphs) that includes:\n\n\
         1. Overall sentiment summary\n\
         2. Top 3 most loved aspects (with context)\n\
         3. Top 3 areas needing improvement (with context)\n\
         4. Recent trends (comparison of last {} days vs overall)\n\
         5. Actionable recommendations for:\n\
            - Product improvements\n\
            - Content/marketing ideas\n\n\
         Analysis Data:\n{}\n\n\
         Write in a professional, actionable tone. Be specific and data-driven.\n\
         Keep in mind that this will be directly input into a webpage, so ensure regular \
         text formatting and avoid markdown.",
        inputs.trends.window_days, stats_summary
    )
}

/// Deterministic templated brief used when the model is unavailable.
fn fallback_brief(inputs: &BriefInputs<'_>) -> String {
    let join_labels = |themes: &[ThemeSummary]| -> String {
        themes
            .iter()
            .take(3)
            .map(|t| t.theme_label.clone())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let loved = if inputs.top_loved_themes.is_empty() {
        "quality".to_string()
    } else {
        join_labels(inputs.top_loved_themes)
    };

    let (top_loved_label, top_loved_count) = inputs
        .top_loved_themes
        .first()
        .map(|t| (t.theme_label.clone(), t.count))
        .unwrap_or_else(|| ("quality".to_string(), 0));

    let improvements = if inputs.top_improvement_themes.is_empty() {
        "general feedback".to_string()
    } else {
        join_labels(inputs.top_improvement_themes)
    };

    let trend_direction = if inputs.trends.positive_count > inputs.trends.negative_count {
        "improving"
    } else {
        "declining"
    };

    format!(
        "Executive Summary:\n\n\
         Overall sentiment is {}. Based on {} reviews, the product shows strong performance \
         in {}.\n\n\
         Key strengths include {} mentioned in {} reviews.\n\n\
         Areas for improvement include {}.\n\n\
         Recent trends indicate {} sentiment in the last {} days.",
        inputs.sentiment.as_str(),
        inputs.total_reviews,
        loved,
        top_loved_label,
        top_loved_count,
        improvements,
        trend_direction,
        inputs.trends.window_days,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Polarity;
    use crate::services::llm::test_support::ScriptedClient;

    fn theme(label: &str, count: usize, polarity: Polarity) -> ThemeSummary {
        ThemeSummary {
            theme_label: label.to_string(),
            count,
            polarity,
            quotes: vec![],
        }
    }

    fn inputs<'a>(
        dist: &'a RatingDistribution,
        loved: &'a [ThemeSummary],
        improve: &'a [ThemeSummary],
        trends: &'a TrendWindow,
    ) -> BriefInputs<'a> {
        BriefInputs {
            total_reviews: dist.total(),
            rating_distribution: dist,
            sentiment: Sentiment::Positive,
            top_loved_themes: loved,
            top_improvement_themes: improve,
            trends,
        }
    }

    fn trends() -> TrendWindow {
        TrendWindow {
            window_days: 60,
            total_reviews: 10,
            positive_count: 7,
            negative_count: 2,
            neutral_count: 1,
            themes_improve: vec![],
        }
    }

    #[actix_rt::test]
    async fn test_model_brief_used_when_available() {
        let dist = RatingDistribution {
            rating_5: 10,
            ..Default::default()
        };
        let loved = [theme("comfort", 5, Polarity::Love)];
        let trends = trends();
        let inputs = inputs(&dist, &loved, &[], &trends);

        let client = ScriptedClient::new(vec![Ok("A thoughtful brief.".to_string())]);
        let brief = generate_brief(&client, &inputs).await;
        assert_eq!(brief, "A thoughtful brief.");
    }

    #[actix_rt::test]
    async fn test_fallback_brief_on_model_failure() {
        let dist = RatingDistribution {
            rating_5: 8,
            rating_1: 2,
            ..Default::default()
        };
        let loved = [theme("comfort", 5, Polarity::Love)];
        let improve = [theme("zipper", 3, Polarity::Improve)];
        let trends = trends();
        let inputs = inputs(&dist, &loved, &improve, &trends);

        let client = ScriptedClient::failing();
        let brief = generate_brief(&client, &inputs).await;
        assert!(!brief.is_empty());
        assert!(brief.contains("comfort"));
        assert!(brief.contains("zipper"));
        assert!(brief.contains("improving"));
    }

    #[actix_rt::test]
    async fn test_fallback_brief_with_no_themes() {
        let dist = RatingDistribution::default();
        let trends = trends();
        let inputs = inputs(&dist, &[], &[], &trends);

        let client = ScriptedClient::failing();
        let brief = generate_brief(&client, &inputs).await;
        assert!(!brief.is_empty());
        assert!(brief.contains("general feedback"));
    }
}
