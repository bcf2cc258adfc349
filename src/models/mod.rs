//! Domain models for the Review Insights server.

pub mod analysis;
pub mod job;
pub mod review;

// Re-export commonly used types
pub use analysis::{
    AnalysisResults, Polarity, Quote, RatingDistribution, Sentiment, ThemeMention, ThemeSummary,
    TrendWindow,
};
pub use job::{AnalyzeResponse, Job, JobProgressResponse, JobStatus};
pub use review::ReviewRecord;
