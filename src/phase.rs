//! Campaign phases and the plan that orders them.
//!
//! A campaign always runs the same four job phases, strictly one after the
//! other:
//!
//! 1. **Build** - compile every sim
//! 2. **FirstRuns** - runs whose output later runs consume
//! 3. **Runs** - every other run
//! 4. **Analysis** - post-run analysis scripts
//!
//! Output comparison happens between Runs and Analysis.

use crate::catalog::JobCatalog;
use crate::errors::ConfigError;
use crate::job::{JobKind, JobRef};
use crate::partition::{DependencyDeclaration, RunPartition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use tokio::sync::Semaphore;

/// Maximum number of jobs of one phase allowed to run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyBound(NonZeroUsize);

impl ConcurrencyBound {
    /// Validate a raw bound. Zero, negative and values above
    /// [`Semaphore::MAX_PERMITS`] are rejected.
    pub fn new(value: i64) -> Result<Self, ConfigError> {
        usize::try_from(value)
            .ok()
            .filter(|&n| n <= Semaphore::MAX_PERMITS)
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or(ConfigError::InvalidConcurrency { value })
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for ConcurrencyBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which stage of the campaign a phase is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Build,
    FirstRuns,
    Runs,
    Analysis,
}

impl PhaseKind {
    /// Operator-facing progress header.
    pub fn header(&self) -> &'static str {
        match self {
            PhaseKind::Build => "Executing all sim builds.",
            PhaseKind::FirstRuns => "Executing required first phase runs.",
            PhaseKind::Runs => "Executing all sim runs.",
            PhaseKind::Analysis => "Executing all analysis.",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Build => write!(f, "build"),
            PhaseKind::FirstRuns => write!(f, "first-runs"),
            PhaseKind::Runs => write!(f, "runs"),
            PhaseKind::Analysis => write!(f, "analysis"),
        }
    }
}

/// An ordered set of jobs that run concurrently with each other.
#[derive(Debug, Clone)]
pub struct Phase {
    pub kind: PhaseKind,
    pub header: String,
    pub jobs: Vec<JobRef>,
    pub bound: ConcurrencyBound,
}

impl Phase {
    pub fn new(kind: PhaseKind, jobs: Vec<JobRef>, bound: ConcurrencyBound) -> Self {
        Self {
            kind,
            header: kind.header().to_string(),
            jobs,
            bound,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// The four job phases of one campaign, fully validated.
#[derive(Debug, Clone)]
pub struct CampaignPlan {
    pub build: Phase,
    pub first_runs: Phase,
    pub runs: Phase,
    pub analysis: Phase,
}

impl CampaignPlan {
    /// Partition the catalog's jobs into phases.
    ///
    /// Every configuration check happens here, before anything is dispatched:
    /// the bound is validated and every declaration is resolved.
    pub fn build(
        catalog: &dyn JobCatalog,
        declarations: &[DependencyDeclaration],
        max_concurrent: i64,
    ) -> Result<Self, ConfigError> {
        let bound = ConcurrencyBound::new(max_concurrent)?;
        let partition = RunPartition::build(catalog, catalog.jobs(JobKind::Run), declarations)?;

        Ok(Self {
            build: Phase::new(PhaseKind::Build, catalog.jobs(JobKind::Build), bound),
            first_runs: Phase::new(PhaseKind::FirstRuns, partition.first_phase, bound),
            runs: Phase::new(PhaseKind::Runs, partition.remaining, bound),
            analysis: Phase::new(PhaseKind::Analysis, catalog.jobs(JobKind::Analyze), bound),
        })
    }

    /// Phases in execution order.
    pub fn phases(&self) -> [&Phase; 4] {
        [&self.build, &self.first_runs, &self.runs, &self.analysis]
    }

    /// Jobs whose logs are dumped on failure. Analysis jobs are included only
    /// when asked for.
    pub fn dump_scope(&self, include_analysis: bool) -> Vec<JobRef> {
        let mut jobs: Vec<JobRef> = self
            .build
            .jobs
            .iter()
            .chain(&self.first_runs.jobs)
            .chain(&self.runs.jobs)
            .cloned()
            .collect();
        if include_analysis {
            jobs.extend(self.analysis.jobs.iter().cloned());
        }
        jobs
    }

    /// Every job in the plan, in phase order.
    pub fn all_jobs(&self) -> Vec<JobRef> {
        self.dump_scope(true)
    }
}
