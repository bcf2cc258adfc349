//! OpenAPI documentation configuration.

use actix_web::{get, web, HttpResponse};
use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Review Insights Server",
        version = "0.1.0",
        description = "API server for mining product review CSVs: rating statistics, LLM theme extraction, and executive briefs keyed by analysis job"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Job endpoints
        api::jobs::analyze,
        api::jobs::get_job_status,
        api::jobs::rerun_job,
        // Sample endpoints
        api::samples::list_samples,
        api::samples::get_sample,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Jobs
            models::JobStatus,
            models::Job,
            models::AnalyzeResponse,
            models::JobProgressResponse,
            // Results
            models::AnalysisResults,
            models::RatingDistribution,
            models::Sentiment,
            models::Polarity,
            models::ThemeSummary,
            models::Quote,
            models::TrendWindow,
            // Samples
            api::samples::SampleFile,
            api::samples::SamplesResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Jobs", description = "Review analysis jobs and results"),
        (name = "Samples", description = "Demo CSV files")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document as JSON.
#[get("/openapi.json")]
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Configure documentation routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(openapi_json);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_includes_all_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/ready",
            "/api/analyze",
            "/api/jobs/{job_id}",
            "/api/jobs/{job_id}/rerun",
            "/api/samples",
            "/api/samples/{filename}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
