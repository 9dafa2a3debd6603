//! Pool worker: pulls file units off the shared queue and runs the pipeline

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;

use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::types::ProcessedDocument;

use super::job_registry::{Dispatch, JobId, JobRegistry};

/// One file of one job
#[derive(Debug, Clone)]
pub(crate) struct WorkUnit {
    pub job_id: JobId,
    pub path: String,
}

/// Receiving end of the work queue, shared by every worker in the pool
pub(crate) type SharedReceiver = Arc<Mutex<mpsc::Receiver<WorkUnit>>>;

pub(crate) struct Worker {
    id: usize,
    pipeline: Arc<IngestPipeline>,
    registry: Arc<JobRegistry>,
    config: BatchConfig,
    receiver: SharedReceiver,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: usize,
        pipeline: Arc<IngestPipeline>,
        registry: Arc<JobRegistry>,
        config: BatchConfig,
        receiver: SharedReceiver,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            pipeline,
            registry,
            config,
            receiver,
            shutdown,
        }
    }

    /// Process units until shutdown is signalled or every sender is gone
    pub async fn run(mut self) {
        tracing::debug!("Worker {} started", self.id);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let unit = {
                let mut receiver = self.receiver.lock().await;
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => None,
                    unit = receiver.recv() => unit,
                }
            };

            match unit {
                Some(unit) => self.process_unit(unit).await,
                None => break,
            }
        }

        tracing::debug!("Worker {} stopped", self.id);
    }

    async fn process_unit(&self, unit: WorkUnit) {
        let WorkUnit { job_id, path } = unit;

        match self.registry.begin_unit(job_id) {
            Dispatch::Run => {}
            skip => {
                tracing::debug!("[{}] Skipping unit of job {}: {:?}", display_name(&path), job_id, skip);
                return;
            }
        }

        let outcome = process_with_retry(&self.pipeline, &self.config, &path, || {
            self.registry.is_active(job_id)
        })
        .await;

        match outcome {
            Some(Ok(doc)) => self.registry.record_success(job_id, doc),
            Some(Err(e)) => {
                self.registry
                    .record_failure(job_id, &path, e.to_string(), self.config.fail_fast)
            }
            None => {
                tracing::debug!("[{}] Job {} stopped, dropping retry", display_name(&path), job_id);
            }
        }
    }
}

/// Run one file through the pipeline, retrying failures with backoff while
/// the retry budget lasts
///
/// `keep_going` is checked after every backoff sleep; `None` means the file
/// was abandoned because it returned false.
pub(crate) async fn process_with_retry(
    pipeline: &IngestPipeline,
    config: &BatchConfig,
    path: &str,
    keep_going: impl Fn() -> bool,
) -> Option<Result<ProcessedDocument>> {
    let filename = display_name(path);
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let start_time = Instant::now();

        match run_pipeline(pipeline, config, path).await {
            Ok(doc) => {
                tracing::info!(
                    "[{}] Processed in {:.2}s ({} chunks, attempt {})",
                    filename,
                    start_time.elapsed().as_secs_f64(),
                    doc.total_chunks(),
                    attempt
                );
                return Some(Ok(doc));
            }
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = config.backoff_for(attempt - 1);
                tracing::warn!(
                    "[{}] Attempt {}/{} failed: {}. Retrying in {}ms",
                    filename,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;

                if !keep_going() {
                    return None;
                }
            }
            Err(e) => {
                tracing::error!("[{}] Failed after {} attempt(s): {}", filename, attempt, e);
                return Some(Err(e));
            }
        }
    }
}

/// Run the pipeline for one file under the per-file deadline
async fn run_pipeline(
    pipeline: &IngestPipeline,
    config: &BatchConfig,
    path: &str,
) -> Result<ProcessedDocument> {
    let file_timeout = config.file_timeout();
    match timeout(file_timeout, pipeline.process_file(path)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("[{}] TIMEOUT after {}s", display_name(path), file_timeout.as_secs());
            Err(Error::Timeout {
                path: path.to_string(),
                secs: file_timeout.as_secs(),
            })
        }
    }
}

fn display_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
