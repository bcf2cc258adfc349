//! Database query functions for jobs, reviews, and results.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AnalysisResults, Job, JobStatus, ReviewRecord};

// ============================================================================
// Job Queries
// ============================================================================

/// Insert a new job.
pub fn insert_job(conn: &Connection, job: &Job) -> AppResult<()> {
    conn.execute(
        "INSERT INTO jobs (id, created_at, updated_at, status, total_reviews, filename)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            job.id.to_string(),
            job.created_at.to_rfc3339(),
            job.updated_at.to_rfc3339(),
            job.status.as_str(),
            job.total_reviews,
            job.filename.as_deref(),
        ],
    )
    .map_err(|e| AppError::Database(format!("Failed to insert job: {}", e)))?;

    Ok(())
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: Uuid) -> AppResult<Option<Job>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, created_at, updated_at, status, total_reviews, filename
             FROM jobs WHERE id = ?1",
        )
        .map_err(|e| AppError::Database(e.to_string()))?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(JobRow {
            id: row.get(0)?,
            created_at: row.get(1)?,
            updated_at: row.get(2)?,
            status: row.get(3)?,
            total_reviews: row.get(4)?,
            filename: row.get(5)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(row_to_job(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}

/// Update job status, refreshing updated_at.
pub fn update_job_status(conn: &Connection, id: Uuid, status: JobStatus) -> AppResult<()> {
    conn.execute(
        "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), Utc::now().to_rfc3339(), id.to_string()],
    )
    .map_err(|e| AppError::Database(format!("Failed to update job status: {}", e)))?;

    Ok(())
}

/// Mark a job processing with its parsed review count.
pub fn mark_job_processing(conn: &Connection, id: Uuid, total_reviews: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE jobs SET status = ?1, total_reviews = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            JobStatus::Processing.as_str(),
            total_reviews,
            Utc::now().to_rfc3339(),
            id.to_string(),
        ],
    )
    .map_err(|e| AppError::Database(format!("Failed to mark job processing: {}", e)))?;

    Ok(())
}

// ============================================================================
// Review Queries
// ============================================================================

/// Insert all review records for a job in one transaction.
pub fn insert_reviews(conn: &Connection, job_id: Uuid, reviews: &[ReviewRecord]) -> AppResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| AppError::Database(e.to_string()))?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO reviews
                 (job_id, review_id, reviewer_name, review_title, review_content,
                  rating, review_date, review_badge, product_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(|e| AppError::Database(e.to_string()))?;

        for review in reviews {
            stmt.execute(params![
                job_id.to_string(),
                review.review_id.as_deref(),
                review.reviewer_name.as_deref(),
                review.review_title.as_deref(),
                review.review_content.as_deref(),
                review.rating,
                review.review_date.map(|d| d.to_string()),
                review.review_badge.as_deref(),
                review.product_url.as_deref(),
            ])
            .map_err(|e| AppError::Database(format!("Failed to insert review: {}", e)))?;
        }
    }

    tx.commit()
        .map_err(|e| AppError::Database(format!("Failed to commit reviews: {}", e)))?;

    Ok(())
}

/// Get all stored review records for a job, in insertion order.
pub fn get_reviews(conn: &Connection, job_id: Uuid) -> AppResult<Vec<ReviewRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT review_id, reviewer_name, review_title, review_content,
                    rating, review_date, review_badge, product_url
             FROM reviews WHERE job_id = ?1 ORDER BY id",
        )
        .map_err(|e| AppError::Database(e.to_string()))?;

    let rows = stmt
        .query_map(params![job_id.to_string()], |row| {
            Ok(ReviewRow {
                review_id: row.get(0)?,
                reviewer_name: row.get(1)?,
                review_title: row.get(2)?,
                review_content: row.get(3)?,
                rating: row.get(4)?,
                review_date: row.get(5)?,
                review_badge: row.get(6)?,
                product_url: row.get(7)?,
            })
        })
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    rows.into_iter().map(row_to_review).collect()
}

// ============================================================================
// Result Queries
// ============================================================================

/// Persist results and mark the job completed in a single transaction.
///
/// Status update and result upsert are atomic relative to readers: a caller
/// never observes `completed` with a half-written result row.
pub fn finish_job(conn: &Connection, job_id: Uuid, results: &AnalysisResults) -> AppResult<()> {
    let results_json = serde_json::to_string(results)
        .map_err(|e| AppError::Database(format!("Failed to serialize results: {}", e)))?;
    let now = Utc::now().to_rfc3339();

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| AppError::Database(e.to_string()))?;

    tx.execute(
        "INSERT INTO job_results (job_id, results_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(job_id) DO UPDATE SET results_json = ?2, updated_at = ?3",
        params![job_id.to_string(), results_json, now],
    )
    .map_err(|e| AppError::Database(format!("Failed to upsert results: {}", e)))?;

    tx.execute(
        "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![JobStatus::Completed.as_str(), now, job_id.to_string()],
    )
    .map_err(|e| AppError::Database(format!("Failed to complete job: {}", e)))?;

    tx.commit()
        .map_err(|e| AppError::Database(format!("Failed to commit results: {}", e)))?;

    Ok(())
}

/// Get stored analysis results for a job.
pub fn get_results(conn: &Connection, job_id: Uuid) -> AppResult<Option<AnalysisResults>> {
    let result = conn.query_row(
        "SELECT results_json FROM job_results WHERE job_id = ?1",
        params![job_id.to_string()],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(json) => {
            let results = serde_json::from_str(&json)
                .map_err(|e| AppError::Database(format!("Corrupt results row: {}", e)))?;
            Ok(Some(results))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}

// ============================================================================
// Row conversion helpers
// ============================================================================

struct JobRow {
    id: String,
    created_at: String,
    updated_at: String,
    status: String,
    total_reviews: i64,
    filename: Option<String>,
}

fn row_to_job(row: JobRow) -> AppResult<Job> {
    Ok(Job {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| AppError::Database(format!("Invalid job id: {}", e)))?,
        status: JobStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid job status: {}", row.status)))?,
        total_reviews: row.total_reviews,
        filename: row.filename,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

struct ReviewRow {
    review_id: Option<String>,
    reviewer_name: Option<String>,
    review_title: Option<String>,
    review_content: Option<String>,
    rating: i64,
    review_date: Option<String>,
    review_badge: Option<String>,
    product_url: Option<String>,
}

fn row_to_review(row: ReviewRow) -> AppResult<ReviewRecord> {
    let review_date = match row.review_date {
        Some(s) => Some(
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| AppError::Database(format!("Invalid review date '{}': {}", s, e)))?,
        ),
        None => None,
    };

    Ok(ReviewRecord {
        review_id: row.review_id,
        reviewer_name: row.reviewer_name,
        review_title: row.review_title,
        review_content: row.review_content,
        rating: row.rating,
        review_date,
        review_badge: row.review_badge,
        product_url: row.product_url,
    })
}

fn parse_timestamp(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid timestamp '{}': {}", s, e)))
}
