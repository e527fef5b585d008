//! Phase execution: hands one phase to the engine and records how it went.

use crate::engine::ExecutionEngine;
use crate::job::JobStatus;
use crate::phase::{Phase, PhaseKind};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of executing a single phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: PhaseKind,
    /// Number of jobs in the phase
    pub jobs: usize,
    /// Number of jobs that ended in `Failed`
    pub failed_jobs: usize,
    /// Whether the phase as a whole failed
    pub failed: bool,
    /// Whether the phase was skipped because it had no jobs
    pub skipped: bool,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl PhaseReport {
    fn skipped(phase: PhaseKind) -> Self {
        Self {
            phase,
            jobs: 0,
            failed_jobs: 0,
            failed: false,
            skipped: true,
            duration: Duration::ZERO,
        }
    }
}

/// Run `phase` to completion on `engine`.
///
/// Blocks until every job of the phase is terminal; no job's failure cuts the
/// phase short. An empty phase is not dispatched and counts as passed.
pub async fn execute_phase(engine: &dyn ExecutionEngine, phase: &Phase) -> PhaseReport {
    if phase.is_empty() {
        info!(phase = %phase.kind, "No jobs, skipping phase");
        return PhaseReport::skipped(phase.kind);
    }

    let start = Instant::now();
    info!(phase = %phase.kind, jobs = phase.len(), bound = phase.bound.get(), "Phase started");

    let failed = engine.execute(&phase.jobs, phase.bound, &phase.header).await;

    let failed_jobs = phase
        .jobs
        .iter()
        .filter(|j| j.status() == JobStatus::Failed)
        .count();
    let unfinished = phase
        .jobs
        .iter()
        .filter(|j| !j.status().is_terminal())
        .count();
    if unfinished > 0 {
        warn!(phase = %phase.kind, unfinished, "Engine returned with unfinished jobs");
    }

    let report = PhaseReport {
        phase: phase.kind,
        jobs: phase.len(),
        failed_jobs,
        failed,
        skipped: false,
        duration: start.elapsed(),
    };
    info!(
        phase = %phase.kind,
        failed,
        failed_jobs,
        elapsed_ms = report.duration.as_millis() as u64,
        "Phase finished"
    );
    report
}

/// Serde helpers for Duration serialization.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
