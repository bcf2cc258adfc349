//! API endpoint modules.

pub mod health;
pub mod jobs;
pub mod openapi;
pub mod samples;

pub use health::configure_health_routes;
pub use jobs::configure_routes as configure_job_routes;
pub use openapi::{configure_routes as configure_openapi_routes, ApiDoc};
pub use samples::configure_routes as configure_sample_routes;
