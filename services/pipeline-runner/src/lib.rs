//! The document classification pipeline: chunk aggregation, the per-document
//! run state machine and start-up recovery.

pub mod aggregator;
pub mod error;
pub mod orchestrator;
pub mod recovery;

pub use aggregator::aggregate;
pub use error::{FailureCategory, PipelineError};
pub use orchestrator::Orchestrator;
pub use recovery::recover_stale;
