//! Theme aggregation: normalize, group, rank.
//!
//! Consumes the transient mention collection and produces the bounded top-N
//! summaries per polarity. The whole step is commutative over chunk
//! boundaries; nothing here re-associates mentions to chunks.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::{Polarity, Quote, ThemeMention, ThemeSummary};

/// Representative quotes kept per theme.
const MAX_QUOTES: usize = 2;

fn punctuation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid punctuation regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Normalize a theme label for grouping: lowercase, strip punctuation,
/// collapse whitespace runs.
pub fn normalize_theme_label(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let stripped = punctuation_regex().replace_all(&lowered, "");
    whitespace_regex()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Top-N theme summaries for each polarity.
#[derive(Debug, Default)]
pub struct AggregatedThemes {
    pub love: Vec<ThemeSummary>,
    pub improve: Vec<ThemeSummary>,
}

/// Aggregate mentions by (normalized label, polarity) and rank by count.
///
/// Groups keep the order they were first seen in; the final descending sort
/// is stable, so ties retain that scan order. Mentions whose normalized
/// label is empty are discarded.
pub fn aggregate_themes(mentions: &[ThemeMention], top_n: usize) -> AggregatedThemes {
    struct Group {
        label: String,
        polarity: Polarity,
        count: usize,
        quotes: Vec<Quote>,
        seen_titles: Vec<String>,
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<(String, Polarity), usize> = HashMap::new();

    for mention in mentions {
        let label = normalize_theme_label(&mention.theme_label);
        if label.is_empty() {
            continue;
        }

        let key = (label.clone(), mention.polarity);
        let group_idx = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                label,
                polarity: mention.polarity,
                count: 0,
                quotes: Vec::new(),
                seen_titles: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[group_idx];
        group.count += 1;

        // First mention per distinct review title, up to MAX_QUOTES
        if group.quotes.len() < MAX_QUOTES {
            if let Some(title) = mention.review_title.as_deref().filter(|t| !t.is_empty()) {
                if !group.seen_titles.iter().any(|t| t == title) {
                    group.seen_titles.push(title.to_string());
                    group.quotes.push(Quote {
                        title: title.to_string(),
                        snippet: mention.review_snippet.clone().unwrap_or_default(),
                    });
                }
            }
        }
    }

    let mut result = AggregatedThemes::default();
    for group in groups {
        let summary = ThemeSummary {
            theme_label: group.label,
            count: group.count,
            polarity: group.polarity,
            quotes: group.quotes,
        };
        match group.polarity {
            Polarity::Love => result.love.push(summary),
            Polarity::Improve => result.improve.push(summary),
        }
    }

    result.love.sort_by(|a, b| b.count.cmp(&a.count));
    result.improve.sort_by(|a, b| b.count.cmp(&a.count));
    result.love.truncate(top_n);
    result.improve.truncate(top_n);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(label: &str, polarity: Polarity, title: &str) -> ThemeMention {
        ThemeMention {
            theme_label: label.to_string(),
            polarity,
            review_id: None,
            review_title: if title.is_empty() {
                None
            } else {
                Some(title.to_string())
            },
            review_snippet: Some(format!("snippet about {}", label)),
        }
    }

    #[test]
    fn test_normalize_theme_label() {
        assert_eq!(normalize_theme_label("Ice   Retention!"), "ice retention");
        assert_eq!(normalize_theme_label("  Build-Quality  "), "buildquality");
        assert_eq!(normalize_theme_label("!!!"), "");
    }

    #[test]
    fn test_grouping_merges_label_variants() {
        let mentions = vec![
            mention("Ice Retention", Polarity::Love, "A"),
            mention("ice retention!", Polarity::Love, "B"),
            mention("ICE  RETENTION", Polarity::Love, "C"),
        ];
        let themes = aggregate_themes(&mentions, 3);
        assert_eq!(themes.love.len(), 1);
        assert_eq!(themes.love[0].theme_label, "ice retention");
        assert_eq!(themes.love[0].count, 3);
    }

    #[test]
    fn test_same_label_splits_by_polarity() {
        let mentions = vec![
            mention("zipper", Polarity::Love, "A"),
            mention("zipper", Polarity::Improve, "B"),
        ];
        let themes = aggregate_themes(&mentions, 3);
        assert_eq!(themes.love.len(), 1);
        assert_eq!(themes.improve.len(), 1);
    }

    #[test]
    fn test_quotes_deduplicate_by_title_and_cap_at_two() {
        let mentions = vec![
            mention("comfort", Polarity::Love, "Same title"),
            mention("comfort", Polarity::Love, "Same title"),
            mention("comfort", Polarity::Love, "Other title"),
            mention("comfort", Polarity::Love, "Third title"),
            mention("comfort", Polarity::Love, ""),
        ];
        let themes = aggregate_themes(&mentions, 3);
        let summary = &themes.love[0];
        assert_eq!(summary.count, 5);
        assert_eq!(summary.quotes.len(), 2);
        assert_eq!(summary.quotes[0].title, "Same title");
        assert_eq!(summary.quotes[1].title, "Other title");
    }

    #[test]
    fn test_empty_labels_discarded() {
        let mentions = vec![
            mention("...", Polarity::Love, "A"),
            mention("", Polarity::Improve, "B"),
        ];
        let themes = aggregate_themes(&mentions, 3);
        assert!(themes.love.is_empty());
        assert!(themes.improve.is_empty());
    }

    #[test]
    fn test_ranking_descending_and_truncated() {
        let mut mentions = Vec::new();
        for _ in 0..5 {
            mentions.push(mention("battery", Polarity::Improve, "A"));
        }
        for _ in 0..3 {
            mentions.push(mention("strap", Polarity::Improve, "B"));
        }
        for _ in 0..2 {
            mentions.push(mention("zipper", Polarity::Improve, "C"));
        }
        mentions.push(mention("color", Polarity::Improve, "D"));

        let themes = aggregate_themes(&mentions, 3);
        let labels: Vec<&str> = themes
            .improve
            .iter()
            .map(|t| t.theme_label.as_str())
            .collect();
        assert_eq!(labels, vec!["battery", "strap", "zipper"]);
        assert_eq!(themes.improve[0].count, 5);
    }

    #[test]
    fn test_aggregation_order_independent() {
        let mut mentions = Vec::new();
        for _ in 0..4 {
            mentions.push(mention("battery", Polarity::Love, "A"));
        }
        for _ in 0..2 {
            mentions.push(mention("strap", Polarity::Love, "B"));
        }
        mentions.push(mention("zipper", Polarity::Love, "C"));

        let forward = aggregate_themes(&mentions, 3);

        let mut reversed = mentions.clone();
        reversed.reverse();
        let backward = aggregate_themes(&reversed, 3);

        let forward_counts: Vec<(&str, usize)> = forward
            .love
            .iter()
            .map(|t| (t.theme_label.as_str(), t.count))
            .collect();
        let backward_counts: Vec<(&str, usize)> = backward
            .love
            .iter()
            .map(|t| (t.theme_label.as_str(), t.count))
            .collect();
        assert_eq!(forward_counts, backward_counts);
    }
}
