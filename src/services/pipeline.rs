//! Analysis pipeline and job lifecycle.
//!
//! Owns the job state machine: pending -> processing -> completed/error,
//! with rerun re-entering processing from a terminal state using the job's
//! stored records. One call runs the whole pipeline to completion before
//! returning; chunk-level model calls are issued sequentially.

use chrono::Utc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::db::{queries, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{AnalysisResults, JobStatus, ReviewRecord};
use crate::services::brief::{self, BriefInputs};
use crate::services::llm::CompletionClient;
use crate::services::{aggregate, stats, themes};

/// Run the full analysis for a job and persist the outcome.
///
/// Any failure marks the job `error` before propagating; the caller must
/// explicitly request a rerun, nothing retries automatically.
pub async fn process_job(
    pool: &DbPool,
    client: &dyn CompletionClient,
    config: &AnalysisConfig,
    job_id: Uuid,
    reviews: &[ReviewRecord],
    filename: Option<String>,
) -> AppResult<()> {
    match run_pipeline(pool, client, config, job_id, reviews, filename).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Job {} failed: {}", job_id, e);
            let conn = pool.connection();
            if let Err(update_err) = queries::update_job_status(&conn, job_id, JobStatus::Error) {
                error!("Failed to mark job {} as error: {}", job_id, update_err);
            }
            Err(e)
        }
    }
}

/// Re-run analysis for an existing job from its stored review records.
pub async fn rerun_job(
    pool: &DbPool,
    client: &dyn CompletionClient,
    config: &AnalysisConfig,
    job_id: Uuid,
) -> AppResult<()> {
    let (reviews, filename) = {
        let conn = pool.connection();

        let job = queries::get_job(&conn, job_id)?
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;

        let reviews = queries::get_reviews(&conn, job_id)?;
        if reviews.is_empty() {
            return Err(AppError::NotFound(format!("Reviews for job {}", job_id)));
        }

        queries::update_job_status(&conn, job_id, JobStatus::Processing)?;
        (reviews, job.filename)
    };

    info!("Rerunning analysis for job {} ({} reviews)", job_id, reviews.len());
    process_job(pool, client, config, job_id, &reviews, filename).await
}

async fn run_pipeline(
    pool: &DbPool,
    client: &dyn CompletionClient,
    config: &AnalysisConfig,
    job_id: Uuid,
    reviews: &[ReviewRecord],
    filename: Option<String>,
) -> AppResult<()> {
    let started = Instant::now();
    let total = reviews.len() as u64;

    // Statistics are pure and cheap; compute them before any model call
    let rating_distribution = stats::rating_distribution(reviews);
    let positive_pct = stats::positive_percentage(&rating_distribution);
    let sentiment = stats::classify_sentiment(positive_pct);

    // Theme extraction: chunked, sequential, per-chunk failures contained
    let mentions = themes::extract_all_themes(client, reviews, config.chunk_size).await;
    info!("Job {}: {} theme mentions extracted", job_id, mentions.len());

    let themes = aggregate::aggregate_themes(&mentions, config.top_themes);

    let trends = stats::trend_window(
        reviews,
        config.trend_window_days,
        Utc::now().date_naive(),
        themes.improve.clone(),
    );

    let executive_brief = brief::generate_brief(
        client,
        &BriefInputs {
            total_reviews: total,
            rating_distribution: &rating_distribution,
            sentiment,
            top_loved_themes: &themes.love,
            top_improvement_themes: &themes.improve,
            trends: &trends,
        },
    )
    .await;

    let now = Utc::now();
    let results = AnalysisResults {
        job_id,
        total_reviews: total,
        rating_distribution,
        sentiment_summary: sentiment,
        positive_sentiment_pct: positive_pct,
        top_loved_themes: themes.love,
        top_improvement_themes: themes.improve,
        trends,
        executive_brief,
        analysis_time_seconds: Some((started.elapsed().as_secs_f64() * 100.0).round() / 100.0),
        filename,
        created_at: now,
        updated_at: now,
    };

    let conn = pool.connection();
    queries::finish_job(&conn, job_id, &results)?;
    info!(
        "Job {} completed in {:.2}s",
        job_id,
        started.elapsed().as_secs_f64()
    );

    Ok(())
}
