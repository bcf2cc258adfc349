//! Theme extraction from review chunks via the model collaborator.
//!
//! Reviews are split into fixed-size contiguous chunks; each chunk becomes
//! one completion call whose JSON output is parsed defensively. A failed
//! chunk contributes zero mentions and never aborts the job.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::{Polarity, ReviewRecord, ThemeMention};
use crate::services::llm::CompletionClient;

/// Reviews with a cleaned body shorter than this contribute no mentions and
/// are filtered out before prompting.
const MIN_MEANINGFUL_LEN: usize = 20;

/// Review body chars sent to the model per review.
const PROMPT_CONTENT_LEN: usize = 800;

/// Review title chars sent to the model per review.
const PROMPT_TITLE_LEN: usize = 100;

/// Target snippet window length, in chars.
const SNIPPET_LEN: usize = 200;

/// Max tokens for a chunk extraction response.
const EXTRACTION_MAX_TOKENS: u32 = 6000;

const EXTRACTION_SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts themes from \
    product reviews. Only return valid JSON with no placeholder text.";

/// Compact per-review encoding embedded in the extraction prompt.
#[derive(Serialize)]
struct PromptReview {
    id: String,
    title: String,
    content: String,
    rating: i64,
}

/// One item of the expected model response.
#[derive(Deserialize)]
struct ChunkResponseItem {
    #[serde(default)]
    review_id: Option<String>,
    #[serde(default)]
    themes: Vec<ThemeResponseItem>,
}

#[derive(Deserialize)]
struct ThemeResponseItem {
    #[serde(default)]
    theme_label: String,
    #[serde(default)]
    polarity: String,
    #[serde(default)]
    snippet: String,
}

fn truncate_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

/// Extract themes for the full review sequence, one chunk at a time.
///
/// Chunk calls are issued sequentially in chunk order, but the output is an
/// unordered mention collection; aggregation is commutative, so the order
/// between chunks does not matter.
pub async fn extract_all_themes(
    client: &dyn CompletionClient,
    reviews: &[ReviewRecord],
    chunk_size: usize,
) -> Vec<ThemeMention> {
    let mut mentions = Vec::new();

    for (chunk_id, chunk) in reviews.chunks(chunk_size.max(1)).enumerate() {
        match extract_from_chunk(client, chunk, chunk_id).await {
            Ok(chunk_mentions) => mentions.extend(chunk_mentions),
            Err(e) => {
                // Contained per chunk: this chunk yields nothing
                warn!("Theme extraction failed for chunk {}: {}", chunk_id, e);
            }
        }
    }

    mentions
}

/// Extract themes from one chunk of reviews.
async fn extract_from_chunk(
    client: &dyn CompletionClient,
    chunk: &[ReviewRecord],
    chunk_id: usize,
) -> AppResult<Vec<ThemeMention>> {
    let filtered = filter_meaningful(chunk);
    if filtered.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = build_extraction_prompt(&filtered, chunk_id)?;

    let content = client
        .complete(EXTRACTION_SYSTEM_PROMPT, &prompt, EXTRACTION_MAX_TOKENS, 0.1)
        .await?;

    parse_chunk_response(&content, &filtered)
}

/// Keep reviews whose cleaned body is long enough to carry a theme,
/// preserving original order.
fn filter_meaningful<'a>(chunk: &'a [ReviewRecord]) -> Vec<&'a ReviewRecord> {
    chunk
        .iter()
        .filter(|r| {
            r.review_content
                .as_deref()
                .map(|c| c.trim().chars().count() >= MIN_MEANINGFUL_LEN)
                .unwrap_or(false)
        })
        .collect()
}

/// Build the per-chunk instruction embedding a compact JSON encoding of the
/// filtered reviews.
fn build_extraction_prompt(filtered: &[&ReviewRecord], chunk_id: usize) -> AppResult<String> {
    let entries: Vec<PromptReview> = filtered
        .iter()
        .enumerate()
        .map(|(idx, review)| PromptReview {
            id: review
                .review_id
                .clone()
                .unwrap_or_else(|| format!("review_{}_{}", chunk_id, idx)),
            title: truncate_chars(review.review_title.as_deref().unwrap_or(""), PROMPT_TITLE_LEN),
            content: truncate_chars(
                review.review_content.as_deref().unwrap_or(""),
                PROMPT_CONTENT_LEN,
            ),
            rating: review.rating,
        })
        .collect();

    // Compact JSON keeps the token footprint down
    let reviews_json = serde_json::to_string(&entries)
        .map_err(|e| AppError::ModelCall(format!("Failed to encode reviews: {}", e)))?;

    Ok(format!(
        "Analyze these product reviews and extract themes from each.\n\n\
         For each review, identify up to 3 themes. For each theme provide:\n\
         - Label (1-4 words, e.g., \"ice retention\", \"durability\")\n\
         - Polarity: \"love\" (positive) or \"improve\" (negative/complaints)\n\
         - Snippet: exact quote where theme is mentioned (50-150 chars)\n\n\
         Reviews:\n{reviews_json}\n\n\
         Return a JSON array with this structure:\n\
         [\n\
           {{\n\
             \"review_id\": \"string\",\n\
             \"themes\": [\n\
               {{\n\
                 \"theme_label\": \"string\",\n\
                 \"polarity\": \"love\" or \"improve\",\n\
                 \"snippet\": \"exact quote from review mentioning this theme\"\n\
               }}\n\
             ]\n\
           }}\n\
         ]\n\n\
         IMPORTANT: Return ONLY valid JSON. No markdown, no explanations."
    ))
}

/// Strip surrounding markdown code-fence markup from a model response.
pub fn strip_code_fences(content: &str) -> &str {
    let mut content = content.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

/// Parse a chunk response into mentions.
///
/// Mentions are joined to the filtered input by positional order: the nth
/// response item maps to the nth filtered review. The model-declared
/// review_id is carried only as a display label — a model that omits or
/// reorders items will silently mismatch, which is a known limitation of
/// the response contract rather than something to patch up here.
fn parse_chunk_response(
    content: &str,
    filtered: &[&ReviewRecord],
) -> AppResult<Vec<ThemeMention>> {
    let stripped = strip_code_fences(content);

    let items: Vec<ChunkResponseItem> = serde_json::from_str(stripped).map_err(|e| {
        AppError::ModelOutput(format!(
            "Expected a JSON array of review themes: {} (response starts: {})",
            e,
            truncate_chars(stripped, 120)
        ))
    })?;

    let mut mentions = Vec::new();

    for (idx, item) in items.into_iter().enumerate() {
        let Some(review) = filtered.get(idx) else {
            // More response items than inputs; drop the excess
            break;
        };

        let body = review.review_content.as_deref().unwrap_or("");

        for theme in item.themes {
            let theme_label = theme.theme_label.trim().to_lowercase();
            let snippet = if theme.snippet.is_empty() {
                snippet_for_theme(body, &theme_label)
            } else {
                truncate_chars(&theme.snippet, SNIPPET_LEN)
            };

            mentions.push(ThemeMention {
                theme_label,
                polarity: Polarity::parse_or_default(&theme.polarity),
                review_id: item.review_id.clone(),
                review_title: review.review_title.clone(),
                review_snippet: Some(snippet),
            });
        }
    }

    Ok(mentions)
}

/// Derive a snippet for a theme the model gave no quote for.
///
/// Centers a window on the first occurrence of any label keyword, moving the
/// window start back to the nearest preceding period when that boundary is
/// within 100 chars. Falls back to the first 200 chars of the body.
pub fn snippet_for_theme(content: &str, theme_label: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() || theme_label.trim().is_empty() {
        return chars.iter().take(SNIPPET_LEN).collect();
    }

    let lower_chars: Vec<char> = content.to_lowercase().chars().collect();

    let mut best_pos = chars.len();
    for keyword in theme_label.to_lowercase().split_whitespace() {
        let keyword_chars: Vec<char> = keyword.chars().collect();
        if let Some(pos) = find_subsequence(&lower_chars, &keyword_chars) {
            if pos < best_pos {
                best_pos = pos;
            }
        }
    }

    if best_pos >= chars.len() {
        // No keyword found
        return chars.iter().take(SNIPPET_LEN).collect();
    }

    let start = best_pos.saturating_sub(SNIPPET_LEN / 2);
    let end = (best_pos + SNIPPET_LEN / 2).min(chars.len());
    let mut snippet: String = chars[start..end].iter().collect();

    if start > 0 {
        if let Some(last_period) = chars[..start].iter().rposition(|&c| c == '.') {
            if last_period + 100 > start {
                snippet = chars[last_period + 1..end]
                    .iter()
                    .collect::<String>()
                    .trim()
                    .to_string();
            }
        }
    }

    if snippet.chars().count() < 50 && chars.len() > SNIPPET_LEN {
        return chars[..SNIPPET_LEN].iter().collect();
    }

    truncate_chars(&snippet, SNIPPET_LEN)
}

/// First index of `needle` within `haystack`, by chars.
fn find_subsequence(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::test_support::ScriptedClient;

    fn review(id: &str, title: &str, content: &str, rating: i64) -> ReviewRecord {
        ReviewRecord {
            review_id: Some(id.to_string()),
            reviewer_name: None,
            review_title: Some(title.to_string()),
            review_content: Some(content.to_string()),
            rating,
            review_date: None,
            review_badge: None,
            product_url: None,
        }
    }

    fn chunk_response(review_id: &str, label: &str, polarity: &str, snippet: &str) -> String {
        serde_json::json!([{
            "review_id": review_id,
            "themes": [{
                "theme_label": label,
                "polarity": polarity,
                "snippet": snippet,
            }]
        }])
        .to_string()
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
    }

    #[test]
    fn test_parse_chunk_response_positional_join() {
        let first = review("a", "First", "The ice retention is absolutely incredible here", 5);
        let second = review("b", "Second", "Hinges broke after two weeks of light use", 2);
        let filtered = vec![&first, &second];

        // Model echoes a wrong id for the second item; position wins
        let response = serde_json::json!([
            {"review_id": "a", "themes": [{"theme_label": "Ice Retention", "polarity": "love", "snippet": "ice retention is absolutely incredible"}]},
            {"review_id": "zzz", "themes": [{"theme_label": "hinge durability", "polarity": "improve", "snippet": "Hinges broke after two weeks"}]},
        ])
        .to_string();

        let mentions = parse_chunk_response(&response, &filtered).unwrap();
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].theme_label, "ice retention");
        assert_eq!(mentions[0].polarity, Polarity::Love);
        assert_eq!(mentions[1].review_title.as_deref(), Some("Second"));
        // Declared id carried as display label only
        assert_eq!(mentions[1].review_id.as_deref(), Some("zzz"));
    }

    #[test]
    fn test_parse_chunk_response_malformed_json() {
        let first = review("a", "T", "Long enough content for extraction", 4);
        let filtered = vec![&first];
        let err = parse_chunk_response("not json at all", &filtered).unwrap_err();
        assert!(matches!(err, AppError::ModelOutput(_)));
    }

    #[test]
    fn test_parse_chunk_response_excess_items_dropped() {
        let first = review("a", "T", "Long enough content for extraction", 4);
        let filtered = vec![&first];
        let response = serde_json::json!([
            {"review_id": "a", "themes": [{"theme_label": "x", "polarity": "love", "snippet": "s"}]},
            {"review_id": "ghost", "themes": [{"theme_label": "y", "polarity": "love", "snippet": "s"}]},
        ])
        .to_string();

        let mentions = parse_chunk_response(&response, &filtered).unwrap();
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn test_snippet_falls_back_to_derived_window() {
        let body = "Filler sentence to start. The zipper keeps jamming whenever the bag is \
                    full and it drives me up the wall every single morning commute.";
        let first = review("a", "T", body, 2);
        let filtered = vec![&first];
        let response = chunk_response("a", "zipper", "improve", "");

        let mentions = parse_chunk_response(&response, &filtered).unwrap();
        let snippet = mentions[0].review_snippet.as_deref().unwrap();
        assert!(snippet.contains("zipper"));
        // Window starts at the sentence boundary before the keyword
        assert!(snippet.starts_with("The zipper"));
    }

    #[test]
    fn test_snippet_no_keyword_uses_body_start() {
        let body = "a".repeat(300);
        let snippet = snippet_for_theme(&body, "missing keyword");
        assert_eq!(snippet.chars().count(), 200);
    }

    #[actix_rt::test]
    async fn test_failed_chunk_does_not_abort_later_chunks() {
        let reviews: Vec<ReviewRecord> = (0..4)
            .map(|i| {
                review(
                    &format!("r{}", i),
                    "Title",
                    "This review body is clearly long enough to analyze",
                    5,
                )
            })
            .collect();

        // Chunk 0 returns garbage; chunk 1 returns one valid theme
        let client = ScriptedClient::new(vec![
            Ok("total garbage".to_string()),
            Ok(chunk_response("r2", "build quality", "love", "long enough snippet here")),
        ]);

        let mentions = extract_all_themes(&client, &reviews, 2).await;
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].theme_label, "build quality");
    }

    #[actix_rt::test]
    async fn test_short_reviews_skip_model_entirely() {
        let reviews = vec![review("a", "T", "too short", 5)];
        // Scripted client would error if called
        let client = ScriptedClient::failing();
        let mentions = extract_all_themes(&client, &reviews, 35).await;
        assert!(mentions.is_empty());
    }
}
