//! In-memory job registry with per-job locking
//!
//! The registry owns every job record for the lifetime of the scheduler that
//! created it. Nothing is evicted automatically: callers that need bounded
//! memory call [`JobRegistry::clear_finished`], and callers that need
//! durability persist snapshots themselves.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::ProcessedDocument;

/// Opaque job identifier
pub type JobId = Uuid;

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Processing)
    }
}

/// A batch request covering one or more files
#[derive(Debug, Clone, Serialize)]
pub struct BatchJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Paths accepted into the work queue, in submission order
    pub file_paths: Vec<String>,
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    /// Successful outputs in completion order
    pub results: Vec<ProcessedDocument>,
    /// Error message per failed path
    pub errors: HashMap<String, String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub cancelled: bool,
}

impl BatchJob {
    fn new(file_paths: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            total_files: file_paths.len(),
            file_paths,
            processed_files: 0,
            failed_files: 0,
            results: Vec::new(),
            errors: HashMap::new(),
            created_at: chrono::Utc::now(),
            completed_at: None,
            cancelled: false,
        }
    }

    /// Move to a terminal status once every file is accounted for
    ///
    /// A job where every file failed ends as `failed`, so its results are
    /// blocked the same way as a fail-fast job.
    fn try_finalize(&mut self) {
        if self.status.is_terminal() || self.processed_files + self.failed_files < self.total_files {
            return;
        }
        self.status = if self.failed_files == 0 {
            JobStatus::Completed
        } else if self.processed_files == 0 {
            JobStatus::Failed
        } else {
            JobStatus::CompletedWithErrors
        };
        self.completed_at = Some(chrono::Utc::now());
        tracing::info!(
            "Job {} finished as {:?}: {} processed, {} failed",
            self.id,
            self.status,
            self.processed_files,
            self.failed_files
        );
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            status: self.status,
            file_paths: self.file_paths.clone(),
            total_files: self.total_files,
            processed_files: self.processed_files,
            failed_files: self.failed_files,
            result_count: self.results.len(),
            errors: self.errors.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            cancelled: self.cancelled,
        }
    }
}

/// Status view of a job, without the result payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub file_paths: Vec<String>,
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub result_count: usize,
    pub errors: HashMap<String, String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub cancelled: bool,
}

impl JobSnapshot {
    pub fn percent_complete(&self) -> f32 {
        if self.total_files == 0 {
            return 100.0;
        }
        (self.processed_files + self.failed_files) as f32 / self.total_files as f32 * 100.0
    }
}

/// Whether a worker should run a unit it pulled from the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Run,
    SkipCancelled,
    SkipFailed,
    SkipUnknown,
}

/// Job counts per status
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusCounts {
    pub total_jobs: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub completed_with_errors: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Thread-safe store of job records
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, Arc<Mutex<BatchJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the job handle, releasing the map shard before the caller locks it
    fn job(&self, job_id: JobId) -> Option<Arc<Mutex<BatchJob>>> {
        self.jobs.get(&job_id).map(|entry| entry.value().clone())
    }

    fn job_or_err(&self, job_id: JobId) -> Result<Arc<Mutex<BatchJob>>> {
        self.job(job_id).ok_or(Error::JobNotFound(job_id))
    }

    /// Register a new pending job; an empty file list completes immediately
    pub fn create(&self, file_paths: Vec<String>) -> JobId {
        let mut job = BatchJob::new(file_paths);
        job.try_finalize();
        let job_id = job.id;
        tracing::info!("Created job {} with {} files", job_id, job.total_files);
        self.jobs.insert(job_id, Arc::new(Mutex::new(job)));
        job_id
    }

    /// Drop a job record entirely
    pub fn remove(&self, job_id: JobId) -> Option<BatchJob> {
        let (_, job) = self.jobs.remove(&job_id)?;
        let removed = job.lock().clone();
        Some(removed)
    }

    /// Shrink a job to its first `accepted` files
    pub fn truncate(&self, job_id: JobId, accepted: usize) {
        if let Some(job) = self.job(job_id) {
            let mut job = job.lock();
            job.file_paths.truncate(accepted);
            job.total_files = accepted.min(job.total_files);
            job.try_finalize();
        }
    }

    /// Claim a unit for processing, moving the job to `processing` on first dispatch
    pub fn begin_unit(&self, job_id: JobId) -> Dispatch {
        let Some(job) = self.job(job_id) else {
            return Dispatch::SkipUnknown;
        };
        let mut job = job.lock();
        if job.cancelled {
            return Dispatch::SkipCancelled;
        }
        match job.status {
            JobStatus::Failed => Dispatch::SkipFailed,
            JobStatus::Pending => {
                job.status = JobStatus::Processing;
                Dispatch::Run
            }
            _ => Dispatch::Run,
        }
    }

    /// Whether more work for this job may still be started
    pub fn is_active(&self, job_id: JobId) -> bool {
        self.job(job_id)
            .map(|job| {
                let job = job.lock();
                !job.cancelled && job.status != JobStatus::Failed
            })
            .unwrap_or(false)
    }

    /// Record a successful file
    pub fn record_success(&self, job_id: JobId, doc: ProcessedDocument) {
        if let Some(job) = self.job(job_id) {
            let mut job = job.lock();
            job.results.push(doc);
            job.processed_files += 1;
            job.try_finalize();
        }
    }

    /// Record a file that failed for good; with `fail_fast` the job fails
    pub fn record_failure(&self, job_id: JobId, path: &str, error: String, fail_fast: bool) {
        if let Some(job) = self.job(job_id) {
            let mut job = job.lock();
            job.errors.insert(path.to_string(), error);
            job.failed_files += 1;

            if fail_fast && !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.completed_at = Some(chrono::Utc::now());
                tracing::warn!("Job {} failed fast on '{}'", job_id, path);
            } else {
                job.try_finalize();
            }
        }
    }

    /// Flag a job as cancelled
    ///
    /// Returns `false` when the job already reached a terminal status.
    pub fn cancel(&self, job_id: JobId) -> Result<bool> {
        let job = self.job_or_err(job_id)?;
        let mut job = job.lock();
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.cancelled = true;
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(chrono::Utc::now());
        tracing::info!("Cancelled job {}", job_id);
        Ok(true)
    }

    pub fn snapshot(&self, job_id: JobId) -> Result<JobSnapshot> {
        let job = self.job_or_err(job_id)?;
        let snapshot = job.lock().snapshot();
        Ok(snapshot)
    }

    /// Successful results so far; errors if the job failed
    pub fn results(&self, job_id: JobId) -> Result<Vec<ProcessedDocument>> {
        let job = self.job_or_err(job_id)?;
        let job = job.lock();
        if job.status == JobStatus::Failed {
            return Err(Error::JobFailed {
                job_id,
                errors: job.errors.clone(),
            });
        }
        Ok(job.results.clone())
    }

    pub fn list(&self) -> Vec<JobSnapshot> {
        let handles: Vec<_> = self.jobs.iter().map(|e| e.value().clone()).collect();
        handles.iter().map(|job| job.lock().snapshot()).collect()
    }

    /// Remove every job in a terminal status, returning how many were removed
    pub fn clear_finished(&self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| !job.lock().status.is_terminal());
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for snapshot in self.list() {
            counts.total_jobs += 1;
            match snapshot.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::CompletedWithErrors => counts.completed_with_errors += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str) -> ProcessedDocument {
        ProcessedDocument::new(path, String::new(), Vec::new())
    }

    fn paths(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("file{}.md", i)).collect()
    }

    #[test]
    fn test_lifecycle_completed() {
        let registry = JobRegistry::new();
        let id = registry.create(paths(2));
        assert_eq!(registry.snapshot(id).unwrap().status, JobStatus::Pending);

        assert_eq!(registry.begin_unit(id), Dispatch::Run);
        assert_eq!(registry.snapshot(id).unwrap().status, JobStatus::Processing);

        registry.record_success(id, doc("file0.md"));
        assert!(registry.snapshot(id).unwrap().completed_at.is_none());

        registry.begin_unit(id);
        registry.record_success(id, doc("file1.md"));
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.processed_files, 2);
        assert!(snapshot.completed_at.is_some());
        assert_eq!(registry.results(id).unwrap().len(), 2);
    }

    #[test]
    fn test_lifecycle_with_errors() {
        let registry = JobRegistry::new();
        let id = registry.create(paths(2));
        registry.begin_unit(id);
        registry.record_failure(id, "file0.md", "bad bytes".into(), false);
        registry.record_success(id, doc("file1.md"));

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.status, JobStatus::CompletedWithErrors);
        assert_eq!(snapshot.errors.get("file0.md").map(String::as_str), Some("bad bytes"));
        assert_eq!(registry.results(id).unwrap().len(), 1);
    }

    #[test]
    fn test_every_file_failed_marks_job_failed() {
        let registry = JobRegistry::new();
        let id = registry.create(vec!["a.md".to_string(), "b.md".to_string()]);
        registry.begin_unit(id);
        registry.record_failure(id, "a.md", "corrupt".into(), false);
        registry.record_failure(id, "b.md", "corrupt".into(), false);

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.completed_at.is_some());
        match registry.results(id) {
            Err(Error::JobFailed { job_id, errors }) => {
                assert_eq!(job_id, id);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("expected JobFailed, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_fail_fast_blocks_results_and_dispatch() {
        let registry = JobRegistry::new();
        let id = registry.create(paths(3));
        registry.begin_unit(id);
        registry.record_failure(id, "file0.md", "boom".into(), true);

        assert_eq!(registry.snapshot(id).unwrap().status, JobStatus::Failed);
        assert_eq!(registry.begin_unit(id), Dispatch::SkipFailed);
        assert!(!registry.is_active(id));
        assert!(matches!(registry.results(id), Err(Error::JobFailed { .. })));
    }

    #[test]
    fn test_cancel() {
        let registry = JobRegistry::new();
        let id = registry.create(paths(3));
        registry.begin_unit(id);

        assert!(registry.cancel(id).unwrap());
        assert_eq!(registry.begin_unit(id), Dispatch::SkipCancelled);

        // In-flight unit still lands, status stays cancelled
        registry.record_success(id, doc("file0.md"));
        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.cancelled);
        assert_eq!(snapshot.processed_files, 1);

        assert!(!registry.cancel(id).unwrap());
        assert!(matches!(registry.cancel(Uuid::new_v4()), Err(Error::JobNotFound(_))));
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let registry = JobRegistry::new();
        let id = registry.create(paths(1));
        registry.begin_unit(id);
        registry.record_success(id, doc("file0.md"));
        assert!(!registry.cancel(id).unwrap());
        assert_eq!(registry.snapshot(id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_empty_job_completes_immediately() {
        let registry = JobRegistry::new();
        let id = registry.create(Vec::new());
        assert_eq!(registry.snapshot(id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_truncate_finalizes() {
        let registry = JobRegistry::new();
        let id = registry.create(paths(3));
        registry.begin_unit(id);
        registry.record_success(id, doc("file0.md"));
        registry.truncate(id, 1);

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.total_files, 1);
        assert_eq!(snapshot.file_paths, vec!["file0.md"]);
        assert_eq!(snapshot.status, JobStatus::Completed);
    }

    #[test]
    fn test_unknown_job() {
        let registry = JobRegistry::new();
        let id = Uuid::new_v4();
        assert!(matches!(registry.snapshot(id), Err(Error::JobNotFound(_))));
        assert!(matches!(registry.results(id), Err(Error::JobNotFound(_))));
        assert_eq!(registry.begin_unit(id), Dispatch::SkipUnknown);
    }

    #[test]
    fn test_clear_finished_and_counts() {
        let registry = JobRegistry::new();
        let done = registry.create(Vec::new());
        let running = registry.create(paths(1));
        registry.begin_unit(running);

        let counts = registry.status_counts();
        assert_eq!(counts.total_jobs, 2);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.processing, 1);

        assert_eq!(registry.clear_finished(), 1);
        assert!(registry.snapshot(done).is_err());
        assert!(registry.snapshot(running).is_ok());
    }

    #[test]
    fn test_concurrent_updates_on_one_job() {
        let registry = Arc::new(JobRegistry::new());
        let id = registry.create(paths(64));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..8 {
                        registry.begin_unit(id);
                        if (t + i) % 4 == 0 {
                            registry.record_failure(id, &format!("f{}-{}", t, i), "err".into(), false);
                        } else {
                            registry.record_success(id, doc("ok.md"));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.processed_files + snapshot.failed_files, 64);
        assert_eq!(snapshot.failed_files, 16);
        assert_eq!(snapshot.status, JobStatus::CompletedWithErrors);
    }
}
