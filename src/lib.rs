pub mod api;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod llm;
pub mod pipeline;
pub mod providers;

// Re-export commonly used items
pub use config::RagConfig;
pub use pipeline::{PipelineError, PipelineStage, RagSession};
pub use providers::Backends;
