//! chunkflow command line
//!
//! Run with: cargo run -p chunkflow -- chunk docs/guide.md

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chunkflow::{
    BatchScheduler, Chunker, Error, IngestConfig, IngestPipeline, JobSnapshot, ProcessedDocument,
    TextConverter,
};

/// Structure-aware chunking and batch ingestion
#[derive(Parser, Debug)]
#[command(name = "chunkflow", version, about)]
struct Cli {
    /// Path to a TOML config file with [chunking] and [batch] tables
    #[arg(long, global = true, env = "CHUNKFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Override the maximum chunk size in bytes
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Override the chunk overlap in bytes
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk a single file and print the document as JSON
    Chunk {
        file: PathBuf,
    },
    /// Process several files on the worker pool and print a job report
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override the worker count
        #[arg(long)]
        workers: Option<usize>,

        /// Stop the job on the first failed file
        #[arg(long)]
        fail_fast: bool,
    },
}

#[derive(Serialize)]
struct BatchReport {
    job: JobSnapshot,
    documents: Vec<ProcessedDocument>,
}

fn load_config(cli: &Cli) -> anyhow::Result<IngestConfig> {
    let mut config = match &cli.config {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => IngestConfig::default(),
    };

    if let Some(size) = cli.chunk_size {
        config.chunking.chunk_size = size;
    }
    if let Some(overlap) = cli.chunk_overlap {
        config.chunking.chunk_overlap = overlap;
    }
    if let Command::Batch { workers, fail_fast, .. } = &cli.command {
        if let Some(workers) = workers {
            config.batch.max_workers = *workers;
        }
        config.batch.fail_fast |= *fail_fast;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chunkflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    tracing::info!(
        "Chunk size {} / overlap {}, {} workers",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        config.batch.max_workers
    );

    let chunker = Chunker::new(config.chunking.clone())?;
    let pipeline = IngestPipeline::new(chunker, Arc::new(TextConverter));

    match cli.command {
        Command::Chunk { file } => {
            let doc = pipeline
                .process_file(&file)
                .await
                .with_context(|| format!("failed to chunk {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Command::Batch { files, .. } => {
            let scheduler = BatchScheduler::new(config.batch.clone(), pipeline)?;
            scheduler.start()?;

            let paths = files.iter().map(|p| p.to_string_lossy().into_owned());
            let job_id = match scheduler.enqueue(paths) {
                Ok(id) => id,
                Err(Error::QueueFull { accepted, job_id: Some(id), .. }) => {
                    tracing::warn!(
                        "Queue full: processing the first {} of {} files",
                        accepted,
                        files.len()
                    );
                    id
                }
                Err(e) => return Err(e.into()),
            };

            let job = scheduler.wait_for(job_id, Duration::from_millis(100)).await?;
            scheduler.stop().await;

            let documents = match scheduler.get_result(job_id) {
                Ok(docs) => docs,
                Err(Error::JobFailed { .. }) => Vec::new(),
                Err(e) => return Err(e.into()),
            };

            tracing::info!(
                "Job {} {:?}: {} processed, {} failed",
                job.id,
                job.status,
                job.processed_files,
                job.failed_files
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&BatchReport { job, documents })?
            );
        }
    }

    Ok(())
}
