//! Batch processing: job registry, bounded work queue and worker pool

mod job_registry;
mod scheduler;
mod worker;

pub use job_registry::{
    BatchJob, Dispatch, JobId, JobRegistry, JobSnapshot, JobStatus, StatusCounts,
};
pub use scheduler::{BatchScheduler, QueueStats};
