//! Sample CSV endpoints.
//!
//! Serves the demo review files from the configured samples directory so a
//! fresh install can be exercised without real data.

use actix_files::NamedFile;
use actix_web::{get, web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// One downloadable sample file.
#[derive(Serialize, ToSchema)]
pub struct SampleFile {
    pub filename: String,
    pub size_bytes: u64,
}

/// Response for the sample listing.
#[derive(Serialize, ToSchema)]
pub struct SamplesResponse {
    pub samples: Vec<SampleFile>,
}

/// List available sample CSV files.
#[utoipa::path(
    get,
    path = "/api/samples",
    tag = "Samples",
    responses(
        (status = 200, description = "Available sample files", body = SamplesResponse)
    )
)]
#[get("/samples")]
pub async fn list_samples(config: web::Data<Config>) -> AppResult<HttpResponse> {
    let mut samples = Vec::new();

    if let Some(dir) = config.samples_dir.as_ref() {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                    continue;
                }
                let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
                samples.push(SampleFile {
                    filename: filename.to_string(),
                    size_bytes,
                });
            }
        }
    }

    samples.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(HttpResponse::Ok().json(SamplesResponse { samples }))
}

/// Download one sample CSV file.
#[utoipa::path(
    get,
    path = "/api/samples/{filename}",
    tag = "Samples",
    params(("filename" = String, Path, description = "Sample file name")),
    responses(
        (status = 200, description = "Sample file contents"),
        (status = 400, description = "Invalid filename", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown sample", body = crate::error::ErrorResponse)
    )
)]
#[get("/samples/{filename}")]
pub async fn get_sample(
    path: web::Path<String>,
    config: web::Data<Config>,
) -> AppResult<NamedFile> {
    let filename = path.into_inner();
    if !valid_sample_name(&filename) {
        return Err(AppError::InvalidInput("Invalid sample filename".to_string()));
    }

    let dir = config
        .samples_dir
        .as_ref()
        .ok_or_else(|| AppError::NotFound(format!("Sample {}", filename)))?;

    NamedFile::open(dir.join(&filename))
        .map_err(|_| AppError::NotFound(format!("Sample {}", filename)))
}

/// Reject path traversal and nested paths; samples are flat files.
fn valid_sample_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

/// Configure sample routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_samples).service(get_sample);
}
