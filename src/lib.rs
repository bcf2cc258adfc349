//! Review Insights server library.
//!
//! Core functionality for the review analysis server: CSV normalization,
//! statistics, LLM theme extraction and aggregation, executive briefs, and
//! the job-keyed persistence layer behind the HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
