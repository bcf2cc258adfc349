//! CSV parsing and review normalization.
//!
//! Turns raw uploaded bytes into an ordered sequence of [`ReviewRecord`],
//! tolerating column-naming variation and non-UTF-8 encodings.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use encoding_rs::{Encoding, WINDOWS_1252};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};
use crate::models::ReviewRecord;

/// Maximum review body length before truncation.
const MAX_CONTENT_LEN: usize = 5000;

/// Maximum review title length before truncation.
const MAX_TITLE_LEN: usize = 500;

/// Marker appended when text is cut at the length cap.
const TRUNCATION_MARKER: &str = "...";

fn rating_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").expect("valid rating regex"))
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Date phrase following the literal word "on": "Month Day, Year"
    RE.get_or_init(|| Regex::new(r"on\s+([A-Za-z]+\s+\d+,\s+\d+)").expect("valid date regex"))
}

/// Decode uploaded bytes, attempting UTF-8 first and then a fixed list of
/// legacy encodings. latin-1/iso-8859-1/cp1252 all resolve to windows-1252
/// under WHATWG encoding rules.
fn decode_bytes(bytes: &[u8]) -> AppResult<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    const FALLBACK_ENCODINGS: &[&Encoding] = &[WINDOWS_1252];

    for encoding in FALLBACK_ENCODINGS {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Ok(decoded.into_owned());
        }
    }

    Err(AppError::Decode(
        "Could not decode CSV file. Please ensure it's UTF-8 encoded.".to_string(),
    ))
}

/// Normalize a header name for flexible column matching.
///
/// Known variants map through the synonym table; anything else is lowercased
/// with spaces replaced by underscores and apostrophes stripped.
fn normalize_column_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    match lowered.as_str() {
        "review title" => "review_title".to_string(),
        "review content" => "review_content".to_string(),
        "review rating" => "review_rating".to_string(),
        "review date" => "review_date".to_string(),
        "review badge" => "review_badge".to_string(),
        "reviewer's name" | "reviewer name" => "reviewer_name".to_string(),
        "product url" => "product_url".to_string(),
        "review id" => "review_id".to_string(),
        _ => lowered.replace(' ', "_").replace('\'', ""),
    }
}

/// Parse a raw rating string to an integer in [1,5].
///
/// Extracts the first integer token ("4.0 out of 5 stars" -> 4); absent or
/// unparseable input defaults to 3.
pub fn parse_rating(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 3;
    };

    match rating_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
    {
        Some(rating) => rating.clamp(1, 5),
        None => 3,
    }
}

/// Parse a raw date string to a calendar date.
///
/// Extracts the "Month Day, Year" phrase following the word "on"
/// ("Reviewed in the United States on January 12, 2026" -> 2026-01-12).
/// Anything else yields None; there is no partial-date fallback.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?;
    let phrase = date_regex().captures(raw)?.get(1)?.as_str();

    NaiveDate::parse_from_str(phrase, "%B %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(phrase, "%b %d, %Y"))
        .ok()
}

/// Trim and truncate review text, appending a marker when cut.
fn clean_text(raw: Option<&str>, max_len: usize) -> Option<String> {
    let text = raw?.trim();
    if text.is_empty() {
        return None;
    }

    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len).collect();
        Some(truncated + TRUNCATION_MARKER)
    } else {
        Some(text.to_string())
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    let text = raw?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Parse CSV bytes into review records.
///
/// Fails with `LimitExceeded` once more than `max_rows` rows have been read,
/// and `EmptyInput` when no valid rows result.
pub fn parse_reviews(bytes: &[u8], max_rows: usize) -> AppResult<Vec<ReviewRecord>> {
    let text = decode_bytes(bytes)?;

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::MalformedInput(format!("Unreadable CSV header: {}", e)))?
        .clone();

    // Map normalized column name -> index; later duplicates win.
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        columns.insert(normalize_column_name(header), idx);
    }

    let field = |record: &csv::StringRecord, name: &str| -> Option<String> {
        columns
            .get(name)
            .and_then(|&idx| record.get(idx))
            .map(|s| s.to_string())
    };

    let mut reviews = Vec::new();

    for record in reader.records() {
        if reviews.len() >= max_rows {
            return Err(AppError::LimitExceeded(format!(
                "CSV exceeds maximum row limit of {}",
                max_rows
            )));
        }

        let record =
            record.map_err(|e| AppError::MalformedInput(format!("Unreadable CSV row: {}", e)))?;

        let rating_str = field(&record, "review_rating").or_else(|| field(&record, "rating"));
        let date_str = field(&record, "review_date").or_else(|| field(&record, "date"));
        let content = field(&record, "review_content").or_else(|| field(&record, "content"));
        let title = field(&record, "review_title").or_else(|| field(&record, "title"));
        let reviewer = field(&record, "reviewer_name").or_else(|| field(&record, "reviewer"));

        reviews.push(ReviewRecord {
            review_id: non_empty(field(&record, "review_id").as_deref()),
            reviewer_name: non_empty(reviewer.as_deref()),
            review_title: clean_text(title.as_deref(), MAX_TITLE_LEN),
            review_content: clean_text(content.as_deref(), MAX_CONTENT_LEN),
            rating: parse_rating(rating_str.as_deref()),
            review_date: parse_date(date_str.as_deref()),
            review_badge: non_empty(field(&record, "review_badge").as_deref()),
            product_url: non_empty(field(&record, "product_url").as_deref()),
        });
    }

    if reviews.is_empty() {
        return Err(AppError::EmptyInput(
            "CSV file appears to be empty or contains no valid reviews".to_string(),
        ));
    }

    Ok(reviews)
}
