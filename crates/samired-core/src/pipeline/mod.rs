//! Classification and scheduling of a night's raw frames.

pub mod config;
mod orchestrator;
pub mod report;
pub mod scheduler;
pub mod table;
mod types;

pub use config::{ReductionConfig, StageConfig};
pub use orchestrator::{create_reduced_dir, run_reduction, run_reduction_reported, run_reduction_with};
pub use scheduler::Scheduler;
pub use table::{FrameRow, FrameTable};
pub use types::{ProgressReporter, ReductionStage, RunSummary};
