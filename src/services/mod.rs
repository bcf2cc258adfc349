//! Analysis services.

pub mod aggregate;
pub mod brief;
pub mod llm;
pub mod parsing;
pub mod pipeline;
pub mod stats;
pub mod themes;
