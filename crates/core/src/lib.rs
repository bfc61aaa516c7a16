//! Shared domain types, error taxonomy, and configuration for the Social
//! Remix creative generation pipeline.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult};
