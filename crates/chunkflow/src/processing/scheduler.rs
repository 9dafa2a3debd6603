//! Batch scheduler: bounded work queue feeding a pool of workers
//!
//! Every file of a job is one queue unit, so a large job cannot starve
//! smaller ones queued behind it and workers never hold a whole job.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use chunkflow::{BatchConfig, BatchScheduler, ChunkConfig, Chunker, IngestPipeline, TextConverter};
//! # async fn run() -> chunkflow::Result<()> {
//! let pipeline = IngestPipeline::new(Chunker::new(ChunkConfig::default())?, Arc::new(TextConverter));
//! let scheduler = BatchScheduler::new(BatchConfig::default(), pipeline)?;
//! scheduler.start()?;
//!
//! let job_id = scheduler.enqueue(["docs/intro.md", "docs/setup.md"])?;
//! let status = scheduler.wait_for(job_id, std::time::Duration::from_millis(50)).await?;
//! println!("{:?}: {} processed", status.status, status.processed_files);
//!
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::types::ProcessedDocument;

use super::job_registry::{JobId, JobRegistry, JobSnapshot};
use super::worker::{process_with_retry, SharedReceiver, WorkUnit, Worker};

/// Scheduler statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub pending_jobs: usize,
    pub processing_jobs: usize,
    pub completed_jobs: usize,
    pub completed_with_errors_jobs: usize,
    pub failed_jobs: usize,
    pub cancelled_jobs: usize,
    /// Units waiting in the queue
    pub queued_files: usize,
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub running: bool,
}

/// Runs batch jobs on a fixed pool of workers
pub struct BatchScheduler {
    config: BatchConfig,
    pipeline: Arc<IngestPipeline>,
    registry: Arc<JobRegistry>,
    sender: mpsc::Sender<WorkUnit>,
    receiver: SharedReceiver,
    shutdown: watch::Sender<bool>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl BatchScheduler {
    /// Create a scheduler; no workers run until [`start`](Self::start)
    pub fn new(config: BatchConfig, pipeline: IngestPipeline) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_size);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            registry: Arc::new(JobRegistry::new()),
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            shutdown,
            workers: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Spawn the worker pool on the current Tokio runtime
    pub fn start(&self) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::internal(format!("no Tokio runtime: {}", e)))?;

        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return Err(Error::internal("scheduler is already running"));
        }

        self.shutdown.send_replace(false);
        for id in 0..self.config.max_workers {
            let worker = Worker::new(
                id,
                self.pipeline.clone(),
                self.registry.clone(),
                self.config.clone(),
                self.receiver.clone(),
                self.shutdown.subscribe(),
            );
            workers.push(handle.spawn(worker.run()));
        }

        tracing::info!(
            "Batch scheduler started: {} workers, queue capacity {}, {}s per-file timeout",
            self.config.max_workers,
            self.config.queue_size,
            self.config.timeout_per_file_secs
        );
        Ok(())
    }

    /// Signal shutdown and wait for every worker to finish its current file
    ///
    /// Units still queued stay queued and are picked up after a restart.
    pub async fn stop(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }

        self.shutdown.send_replace(true);
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("Worker task ended abnormally: {}", e);
            }
        }
        tracing::info!("Batch scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.workers.lock().is_empty()
    }

    /// Create a job and queue one unit per file without blocking
    ///
    /// When the queue fills up part way, the files already queued stay
    /// queued, the job shrinks to them, and the returned
    /// [`Error::QueueFull`] carries its id. If nothing fit, no job is kept.
    pub fn enqueue<I, P>(&self, file_paths: I) -> Result<JobId>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let file_paths: Vec<String> = file_paths.into_iter().map(Into::into).collect();
        let job_id = self.registry.create(file_paths.clone());

        for (accepted, path) in file_paths.into_iter().enumerate() {
            let Err(err) = self.sender.try_send(WorkUnit { job_id, path }) else {
                continue;
            };

            if accepted == 0 {
                self.registry.remove(job_id);
            } else {
                self.registry.truncate(job_id, accepted);
            }

            return Err(match err {
                TrySendError::Full(unit) => {
                    tracing::warn!(
                        "Queue full at '{}': job {} keeps {} file(s)",
                        unit.path,
                        job_id,
                        accepted
                    );
                    Error::QueueFull {
                        capacity: self.config.queue_size,
                        accepted,
                        job_id: (accepted > 0).then_some(job_id),
                    }
                }
                TrySendError::Closed(_) => Error::internal("work queue is closed"),
            });
        }

        Ok(job_id)
    }

    pub fn get_status(&self, job_id: JobId) -> Result<JobSnapshot> {
        self.registry.snapshot(job_id)
    }

    /// Results gathered so far; fails for jobs that ended in `failed`
    pub fn get_result(&self, job_id: JobId) -> Result<Vec<ProcessedDocument>> {
        self.registry.results(job_id)
    }

    /// Cancel a job; units already running finish, queued ones are skipped
    pub fn cancel(&self, job_id: JobId) -> Result<bool> {
        self.registry.cancel(job_id)
    }

    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        self.registry.list()
    }

    /// Drop every job in a terminal status
    pub fn clear_finished(&self) -> usize {
        let removed = self.registry.clear_finished();
        tracing::debug!("Cleared {} finished jobs", removed);
        removed
    }

    /// Poll until the job reaches a terminal status
    ///
    /// There is no deadline: on a scheduler that was never started, or
    /// whose workers were stopped, this waits forever. Wrap the call in
    /// `tokio::time::timeout` when an upper bound is needed.
    pub async fn wait_for(&self, job_id: JobId, poll: Duration) -> Result<JobSnapshot> {
        loop {
            let snapshot = self.registry.snapshot(job_id)?;
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Process files directly, bypassing the queue and registry
    ///
    /// Concurrency is bounded by `max_workers`. Results come back in input
    /// order. With `fail_fast` the first failure is returned and the rest of
    /// the batch is dropped; otherwise failed files are logged and left out.
    pub async fn process_files<I, P>(&self, file_paths: I) -> Result<Vec<ProcessedDocument>>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));

        let file_futures: Vec<_> = file_paths
            .into_iter()
            .map(Into::into)
            .map(|path: String| {
                let sem = semaphore.clone();
                async move {
                    let _permit = sem
                        .acquire()
                        .await
                        .map_err(|e| Error::internal(format!("semaphore closed: {}", e)))?;
                    process_with_retry(&self.pipeline, &self.config, &path, || true)
                        .await
                        .unwrap_or_else(|| Err(Error::internal(format!("'{}' was abandoned", path))))
                }
            })
            .collect();

        if self.config.fail_fast {
            return try_join_all(file_futures).await;
        }

        let docs = join_all(file_futures)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!("Dropping failed file from batch: {}", e);
                    None
                }
            })
            .collect();
        Ok(docs)
    }

    pub fn stats(&self) -> QueueStats {
        let counts = self.registry.status_counts();
        let capacity = self.sender.max_capacity();
        let worker_count = self.workers.lock().len();
        QueueStats {
            total_jobs: counts.total_jobs,
            pending_jobs: counts.pending,
            processing_jobs: counts.processing,
            completed_jobs: counts.completed,
            completed_with_errors_jobs: counts.completed_with_errors,
            failed_jobs: counts.failed,
            cancelled_jobs: counts.cancelled,
            queued_files: capacity - self.sender.capacity(),
            queue_capacity: capacity,
            worker_count,
            running: worker_count > 0,
        }
    }
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("config", &self.config)
            .field("jobs", &self.registry.len())
            .field("running", &self.is_running())
            .finish()
    }
}
