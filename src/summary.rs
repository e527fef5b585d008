//! Machine-readable campaign summary written next to the job logs.

use crate::campaign::CampaignOutcome;
use crate::engine::ComparisonResult;
use crate::executor::PhaseReport;
use crate::failure_log::LogReadFailure;
use crate::job::{JobKind, JobRef, JobStatus};
use crate::verdict::PhaseOutcomes;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name of the summary inside the log directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// Final state of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub name: String,
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub log_file: PathBuf,
}

impl From<&JobRef> for JobSummary {
    fn from(job: &JobRef) -> Self {
        Self {
            name: job.name().to_string(),
            kind: job.kind(),
            status: job.status(),
            exit_code: job.exit_code(),
            duration_ms: job.duration().map(|d| d.as_millis() as u64),
            log_file: job.log_file().to_path_buf(),
        }
    }
}

/// Everything an external tool needs to know about a finished campaign.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub exit_code: i32,
    pub outcomes: PhaseOutcomes,
    pub phases: Vec<PhaseReport>,
    pub jobs: Vec<JobSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comparisons: Vec<ComparisonResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unreadable_logs: Vec<LogReadFailure>,
}

impl CampaignSummary {
    pub fn from_outcome(outcome: &CampaignOutcome) -> Self {
        Self {
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            success: outcome.outcomes.success(),
            exit_code: outcome.outcomes.exit_code(),
            outcomes: outcome.outcomes,
            phases: outcome.phases.clone(),
            jobs: outcome.jobs.iter().map(JobSummary::from).collect(),
            comparisons: Vec::new(),
            config_errors: outcome.config_errors.clone(),
            unreadable_logs: outcome.dump.unreadable.clone(),
        }
    }

    pub fn with_comparisons(mut self, comparisons: Vec<ComparisonResult>) -> Self {
        self.comparisons = comparisons;
        self
    }

    /// Write the summary as pretty JSON to `<log_dir>/summary.json`.
    pub fn write(&self, log_dir: &Path) -> Result<PathBuf> {
        let path = log_dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize summary")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        Ok(path)
    }
}
