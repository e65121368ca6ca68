//! Fan-out stages: start every unit of a stage at once, then wait for all.
//!
//! `TaskGroup` is the join barrier. Units are spawned onto the runtime as they
//! are added and `join_all` resolves only when every one of them has finished,
//! returning each unit's result in submission order. A failing or panicking
//! unit never cancels its siblings.

use futures::future::join_all;
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};

use crate::archive;
use crate::error::{ArchiveError, JobError};
use crate::log_collector::LogCollector;
use crate::models::{ArchiveOutcome, BuildJob, CompressionJob, JobOutcome};
use crate::orchestrator::runner::{run_process, ExitPolicy};

/// Spawned units of one stage, joined together.
pub struct TaskGroup<T> {
    handles: Vec<(String, JoinHandle<T>)>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new() -> Self {
        TaskGroup {
            handles: Vec::new(),
        }
    }

    /// Start `unit` immediately on the runtime.
    pub fn spawn<F>(&mut self, label: impl Into<String>, unit: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.handles.push((label.into(), tokio::spawn(unit)));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every unit; results are in the order units were spawned.
    pub async fn join_all(self) -> Vec<(String, Result<T, JoinError>)> {
        let (labels, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        labels.into_iter().zip(join_all(handles).await).collect()
    }
}

impl<T: Send + 'static> Default for TaskGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run all build jobs concurrently and wait for every one to finish.
pub async fn run_build_jobs(
    jobs: &[BuildJob],
    collector: &LogCollector,
    policy: ExitPolicy,
) -> Vec<JobOutcome> {
    let mut group = TaskGroup::new();
    for job in jobs {
        let job = job.clone();
        let collector = collector.clone();
        group.spawn(job.label.clone(), async move {
            run_process(&job, &collector, policy).await
        });
    }

    let outcomes: Vec<JobOutcome> = group
        .join_all()
        .await
        .into_iter()
        .map(|(label, joined)| JobOutcome {
            label,
            result: joined.unwrap_or_else(|e| Err(JobError::Panicked(e.to_string()))),
        })
        .collect();

    for outcome in &outcomes {
        if let Err(ref e) = outcome.result {
            log::error!("[{}] build job failed: {}", outcome.label, e);
        }
    }
    outcomes
}

/// Archive all (source, target) pairs concurrently and wait for every one.
pub async fn run_compression_jobs(jobs: &[CompressionJob]) -> Vec<ArchiveOutcome> {
    let mut group = TaskGroup::new();
    for job in jobs {
        let job = job.clone();
        group.spawn(job.label.clone(), async move {
            archive::compress_dir(&job.source_dir, &job.target).await
        });
    }

    let outcomes: Vec<ArchiveOutcome> = group
        .join_all()
        .await
        .into_iter()
        .zip(jobs)
        .map(|((label, joined), job)| ArchiveOutcome {
            label,
            target: job.target.clone(),
            result: joined.unwrap_or_else(|e| Err(ArchiveError::Panicked(e.to_string()))),
        })
        .collect();

    for outcome in &outcomes {
        match outcome.result {
            Ok(ref report) => log::info!(
                "Packed {} ({} files, {} bytes)",
                outcome.target.display(),
                report.files,
                report.bytes
            ),
            Err(ref e) => log::error!("[{}] compression failed: {}", outcome.label, e),
        }
    }
    outcomes
}
