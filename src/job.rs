//! Job handles shared between the catalog, the engine and the orchestrator.
//!
//! A `Job` is created once at catalog load and lives for the whole campaign.
//! Only the execution engine writes its status; everything else reads it after
//! the phase that contains the job has returned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Shared handle to a job.
pub type JobRef = Arc<Job>;

/// Identity of a job within one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Build,
    Run,
    Analyze,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Build => write!(f, "build"),
            JobKind::Run => write!(f, "run"),
            JobKind::Analyze => write!(f, "analyze"),
        }
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Not dispatched yet
    #[default]
    Pending,
    /// Dispatched and not finished
    Running,
    /// Finished with the expected exit code
    Passed,
    /// Finished with anything else, or could not be launched
    Failed,
}

impl JobStatus {
    /// Check if the job has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }
}

/// How the engine should launch a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Shell command line. Run jobs may contain `{binary}`.
    pub command: String,
    /// Directory the command runs in.
    pub working_dir: PathBuf,
    /// Exit code that counts as a pass.
    pub expected_exit: i32,
    /// Glob for the executable substituted into `{binary}`. Resolved at
    /// launch time because the build phase creates it.
    pub binary: Option<String>,
}

#[derive(Debug, Default)]
struct JobState {
    status: JobStatus,
    exit_code: Option<i32>,
    duration: Option<Duration>,
}

/// A unit of work: a sim build, a sim run, or an analysis script.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    name: String,
    kind: JobKind,
    group: String,
    /// Run input for run/analyze jobs, `None` for builds.
    input: Option<String>,
    launch: LaunchSpec,
    log_file: PathBuf,
    state: Mutex<JobState>,
}

impl Job {
    pub fn new(
        id: JobId,
        kind: JobKind,
        group: impl Into<String>,
        input: Option<String>,
        launch: LaunchSpec,
        log_file: PathBuf,
    ) -> Self {
        let group = group.into();
        let verb = match kind {
            JobKind::Build => "Build",
            JobKind::Run => "Run",
            JobKind::Analyze => "Analyze",
        };
        let name = match (kind, &input) {
            (JobKind::Build, _) | (_, None) => format!("{} {}", verb, group),
            (_, Some(input)) => format!("{} {} {}", verb, group, input),
        };
        Self {
            id,
            name,
            kind,
            group,
            input,
            launch,
            log_file,
            state: Mutex::new(JobState::default()),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn launch(&self) -> &LaunchSpec {
        &self.launch
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.lock().exit_code
    }

    pub fn duration(&self) -> Option<Duration> {
        self.lock().duration
    }

    /// Mark the job as dispatched.
    pub fn mark_running(&self) {
        let mut state = self.lock();
        state.status = JobStatus::Running;
        state.exit_code = None;
        state.duration = None;
    }

    /// Record the terminal outcome of the job.
    pub fn finish(&self, passed: bool, exit_code: Option<i32>, duration: Duration) {
        let mut state = self.lock();
        state.status = if passed {
            JobStatus::Passed
        } else {
            JobStatus::Failed
        };
        state.exit_code = exit_code;
        state.duration = Some(duration);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobState> {
        // State is plain data, a panicked writer cannot leave it half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// True if any job in the set ended in `Failed`.
pub fn any_failed<'a>(jobs: impl IntoIterator<Item = &'a JobRef>) -> bool {
    jobs.into_iter().any(|j| j.status() == JobStatus::Failed)
}
