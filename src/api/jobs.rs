//! Analysis job endpoints: upload, status/results, rerun.

use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse};
use futures_util::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{queries, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::{AnalyzeResponse, Job, JobProgressResponse, JobStatus};
use crate::services::llm::CompletionClient;
use crate::services::{parsing, pipeline};

/// Upload a CSV of product reviews and run the analysis.
///
/// The upload size cap is enforced while streaming, before any job row
/// exists. Structural parse failures create the job and mark it `error`
/// with no review rows persisted. The pipeline runs to completion inside
/// the request; the response carries the job's final status.
#[utoipa::path(
    post,
    path = "/api/analyze",
    tag = "Jobs",
    request_body(content_type = "multipart/form-data", description = "CSV file field"),
    responses(
        (status = 201, description = "Job created and analyzed", body = AnalyzeResponse),
        (status = 400, description = "Undecodable, malformed, empty, or oversized upload", body = crate::error::ErrorResponse)
    )
)]
#[post("/analyze")]
pub async fn analyze(
    mut payload: Multipart,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    client: web::Data<dyn CompletionClient>,
) -> AppResult<HttpResponse> {
    let (bytes, filename) = read_csv_field(&mut payload, config.max_upload_size).await?;

    let job = Job::new(filename.clone());
    {
        let conn = pool.connection();
        queries::insert_job(&conn, &job)?;
    }

    let reviews = match parsing::parse_reviews(&bytes, config.max_rows) {
        Ok(reviews) => reviews,
        Err(e) => {
            warn!("Job {} rejected at parse: {}", job.id, e);
            let conn = pool.connection();
            if let Err(update_err) = queries::update_job_status(&conn, job.id, JobStatus::Error) {
                warn!("Failed to mark job {} as error: {}", job.id, update_err);
            }
            return Err(e);
        }
    };

    {
        let conn = pool.connection();
        queries::insert_reviews(&conn, job.id, &reviews)?;
        queries::mark_job_processing(&conn, job.id, reviews.len() as i64)?;
    }

    info!(
        "Job {} created from {:?}: {} reviews",
        job.id,
        filename.as_deref().unwrap_or("upload"),
        reviews.len()
    );

    if let Err(e) = pipeline::process_job(
        &pool,
        client.get_ref(),
        &config.analysis,
        job.id,
        &reviews,
        filename,
    )
    .await
    {
        warn!("Analysis for job {} failed: {}", job.id, e);
    }

    let status = current_status(&pool, job.id)?;
    Ok(HttpResponse::Created().json(AnalyzeResponse {
        job_id: job.id,
        status,
    }))
}

/// Query a job's status, returning results once completed.
#[utoipa::path(
    get,
    path = "/api/jobs/{job_id}",
    tag = "Jobs",
    params(("job_id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Analysis results", body = crate::models::AnalysisResults),
        (status = 202, description = "Job still pending or processing", body = JobProgressResponse),
        (status = 404, description = "Unknown job", body = crate::error::ErrorResponse),
        (status = 500, description = "Job ended in error")
    )
)]
#[get("/jobs/{job_id}")]
pub async fn get_job_status(
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let conn = pool.connection();

    let job = queries::get_job(&conn, job_id)?
        .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;

    match job.status {
        JobStatus::Pending | JobStatus::Processing => {
            Ok(HttpResponse::Accepted().json(JobProgressResponse {
                job_id,
                status: job.status,
            }))
        }
        JobStatus::Error => Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "job_id": job_id,
            "status": "error",
            "message": "Analysis failed. Rerun the job or upload the file again."
        }))),
        JobStatus::Completed => {
            let results = queries::get_results(&conn, job_id)?.ok_or_else(|| {
                AppError::Database(format!("Results missing for completed job {}", job_id))
            })?;
            Ok(HttpResponse::Ok().json(results))
        }
    }
}

/// Re-run analysis for a job from its stored review records.
#[utoipa::path(
    post,
    path = "/api/jobs/{job_id}/rerun",
    tag = "Jobs",
    params(("job_id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Rerun finished", body = AnalyzeResponse),
        (status = 404, description = "Unknown job or no stored records", body = crate::error::ErrorResponse)
    )
)]
#[post("/jobs/{job_id}/rerun")]
pub async fn rerun_job(
    path: web::Path<Uuid>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    client: web::Data<dyn CompletionClient>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();

    match pipeline::rerun_job(&pool, client.get_ref(), &config.analysis, job_id).await {
        Ok(()) => {}
        Err(e @ AppError::NotFound(_)) => return Err(e),
        // Job is already marked error; report the status instead of failing
        Err(e) => warn!("Rerun for job {} failed: {}", job_id, e),
    }

    let status = current_status(&pool, job_id)?;
    Ok(HttpResponse::Ok().json(AnalyzeResponse { job_id, status }))
}

/// Configure job routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze).service(get_job_status).service(rerun_job);
}

/// Pull the CSV field out of the multipart payload, enforcing the size cap
/// while streaming so oversized uploads never buffer fully.
async fn read_csv_field(
    payload: &mut Multipart,
    max_upload_size: usize,
) -> AppResult<(Vec<u8>, Option<String>)> {
    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::MalformedInput(format!("Multipart error: {}", e)))?;

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(|name| name.to_string());

        // Only file fields carry the CSV; skip bare form values
        if filename.is_none() {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::MalformedInput(format!("Read error: {}", e)))?;
            if bytes.len() + chunk.len() > max_upload_size {
                return Err(AppError::LimitExceeded(format!(
                    "Upload exceeds the {} byte limit",
                    max_upload_size
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok((bytes, filename));
    }

    Err(AppError::InvalidInput(
        "No file field in multipart upload".to_string(),
    ))
}

fn current_status(pool: &DbPool, job_id: Uuid) -> AppResult<JobStatus> {
    let conn = pool.connection();
    let job = queries::get_job(&conn, job_id)?
        .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;
    Ok(job.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{defaults, AnalysisConfig, Environment, ModelConfig};
    use crate::db::test_pool;
    use crate::services::llm::test_support::ScriptedClient;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn test_config() -> Config {
        Config {
            environment: Environment::Development,
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "file::memory:".to_string(),
            max_upload_size: defaults::DEV_MAX_UPLOAD_SIZE,
            max_rows: defaults::DEV_MAX_ROWS,
            samples_dir: None,
            model: ModelConfig {
                base_url: defaults::DEV_MODEL_BASE_URL.to_string(),
                model: defaults::DEV_MODEL_NAME.to_string(),
                api_key: None,
            },
            analysis: AnalysisConfig {
                chunk_size: 35,
                top_themes: 3,
                trend_window_days: 60,
            },
        }
    }

    fn multipart_payload(filename: &str, content: &str) -> (&'static str, Vec<u8>) {
        let boundary = "------------------------abcdef0123456789";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        );
        (
            "multipart/form-data; boundary=------------------------abcdef0123456789",
            body.into_bytes(),
        )
    }

    macro_rules! init_app {
        ($pool:expr, $config:expr) => {{
            let client: Arc<dyn CompletionClient> = Arc::new(ScriptedClient::failing());
            test::init_service(
                App::new()
                    .app_data(web::Data::new($pool))
                    .app_data(web::Data::new($config))
                    .app_data(web::Data::from(client))
                    .configure(configure_routes),
            )
            .await
        }};
    }

    const CSV: &str = "\
Review Rating,Review Title,Review Content,Review Date,Reviewer's Name
5.0 out of 5 stars,Great cooler,Keeps everything cold for a full weekend trip,\"Reviewed in the United States on July 4, 2025\",Alice
1.0 out of 5 stars,Broken latch,The latch snapped off during the very first outing,\"Reviewed in the United States on July 10, 2025\",Bob";

    #[actix_rt::test]
    async fn test_analyze_then_query_results() {
        let pool = test_pool();
        let app = init_app!(pool, test_config());

        let (content_type, body) = multipart_payload("reviews.csv", CSV);
        let req = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        let created: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(created["status"], "completed");
        let job_id = created["job_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/jobs/{}", job_id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let results: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(results["total_reviews"], 2);
        assert_eq!(results["rating_distribution"]["rating_5"], 1);
        assert_eq!(results["rating_distribution"]["rating_1"], 1);
        assert!(!results["executive_brief"].as_str().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_oversized_upload_rejected_without_job() {
        let pool = test_pool();
        let mut config = test_config();
        config.max_upload_size = 16;
        let app = init_app!(pool.clone(), config);

        let (content_type, body) = multipart_payload("reviews.csv", CSV);
        let req = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "LIMIT_EXCEEDED");

        // No job row was created for the rejected upload
        let conn = pool.connection();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[actix_rt::test]
    async fn test_headers_only_upload_marks_job_error() {
        let pool = test_pool();
        let app = init_app!(pool.clone(), test_config());

        let (content_type, body) =
            multipart_payload("empty.csv", "Review Rating,Review Title,Review Content");
        let req = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "EMPTY_INPUT");

        // The job exists, marked error, with no review rows
        let conn = pool.connection();
        let status: String = conn
            .query_row("SELECT status FROM jobs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "error");
        let reviews: i64 = conn
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))
            .unwrap();
        assert_eq!(reviews, 0);
    }

    #[actix_rt::test]
    async fn test_query_unknown_job() {
        let pool = test_pool();
        let app = init_app!(pool, test_config());

        let req = test::TestRequest::get()
            .uri(&format!("/jobs/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_rt::test]
    async fn test_query_in_progress_job() {
        let pool = test_pool();

        let job_id = {
            let conn = pool.connection();
            let job = Job::new(None);
            queries::insert_job(&conn, &job).unwrap();
            queries::mark_job_processing(&conn, job.id, 10).unwrap();
            job.id
        };

        let app = init_app!(pool, test_config());
        let req = test::TestRequest::get()
            .uri(&format!("/jobs/{}", job_id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 202);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "processing");
        assert_eq!(body["job_id"], job_id.to_string());
    }

    #[actix_rt::test]
    async fn test_rerun_round_trip() {
        let pool = test_pool();
        let app = init_app!(pool, test_config());

        let (content_type, body) = multipart_payload("reviews.csv", CSV);
        let req = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let created: serde_json::Value =
            test::call_and_read_body_json(&app, req).await;
        let job_id = created["job_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/jobs/{}/rerun", job_id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "completed");
    }

    #[actix_rt::test]
    async fn test_rerun_unknown_job() {
        let pool = test_pool();
        let app = init_app!(pool, test_config());

        let req = test::TestRequest::post()
            .uri(&format!("/jobs/{}/rerun", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
