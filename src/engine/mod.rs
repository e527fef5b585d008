//! Execution engine: runs job sets and checks their outputs.
//!
//! The orchestrator drives an engine through the [`ExecutionEngine`] trait.
//! [`ProcessEngine`] is the implementation that launches each job as a shell
//! process. [`dispatch_bounded`] is the bounded worker pool both it and test
//! engines build on.

mod compare;
mod process;

pub use compare::{ComparisonOutcome, ComparisonResult, compare_files};
pub use process::ProcessEngine;

use crate::job::JobRef;
use crate::phase::ConcurrencyBound;
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::error;

/// Runs jobs and reports on them.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Execute every job in `jobs` with at most `bound` running at once.
    ///
    /// Returns only once every job is terminal. Returns `true` if any job
    /// failed.
    async fn execute(&self, jobs: &[JobRef], bound: ConcurrencyBound, header: &str) -> bool;

    /// Compare run outputs against their baselines. Returns `true` on any
    /// mismatch.
    async fn compare(&self) -> bool;

    /// Print the verbose per-job report.
    fn report(&self);

    /// Print the condensed pass/fail summary.
    fn status_summary(&self);
}

/// Run `work` once per job with at most `bound` invocations in flight.
///
/// Jobs are dispatched in order. A permit is taken before each job is spawned
/// and held until its work finishes, so one slow or failing job never starves
/// its siblings of their share of the bound. Waits for every spawned job.
pub async fn dispatch_bounded<F, Fut>(jobs: &[JobRef], bound: ConcurrencyBound, work: F) -> Result<()>
where
    F: Fn(JobRef) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    // More permits than jobs would never be used.
    let permits = bound
        .get()
        .min(jobs.len().max(1))
        .min(Semaphore::MAX_PERMITS);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let permit = semaphore.clone().acquire_owned().await?;
        let fut = work(job.clone());
        handles.push(tokio::spawn(async move {
            let _permit = permit; // Hold until complete
            fut.await;
        }));
    }

    for (job, outcome) in jobs.iter().zip(futures::future::join_all(handles).await) {
        if let Err(e) = outcome {
            error!(job = job.name(), error = %e, "Job task did not complete");
        }
    }

    Ok(())
}
