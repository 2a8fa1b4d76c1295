//! Shipcheck core - workspace verification pipeline.
//!
//! Provides the pipeline orchestrator that:
//! - Declares quality gates as ordered stage configuration (check, fmt,
//!   clippy, test, web build)
//! - Executes each stage's external command sequentially, fail-fast
//! - Records exit status and timing for every attempted stage

pub mod error;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod stage;

// Re-export key types
pub use error::StageError;
pub use pipeline::{Pipeline, PipelineResult, PipelineStatus};
pub use report::{PipelineReport, StageEntry};
pub use runner::{StageReport, StageRunner, StageStatus};
pub use stage::{default_pipeline, BuiltinStage, Stage};
