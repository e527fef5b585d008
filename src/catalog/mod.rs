//! Job catalog: the set of jobs a campaign can execute.
//!
//! The orchestrator only depends on the [`JobCatalog`] trait. [`SimCatalog`]
//! is the implementation backed by the campaign config file.

mod sim;

pub use sim::{Comparison, SimCatalog};

use crate::config::ConfigIssue;
use crate::job::{JobKind, JobRef};

/// Outcome of resolving a run by `(group, run)`.
#[derive(Debug, Clone)]
pub enum RunLookup {
    Found(JobRef),
    GroupNotFound,
    RunNotFound,
}

/// Source of jobs for a campaign.
pub trait JobCatalog {
    /// All jobs of one kind, in catalog order.
    fn jobs(&self, kind: JobKind) -> Vec<JobRef>;

    /// Resolve the run job for `run` in sim `group`.
    fn lookup_run(&self, group: &str, run: &str) -> RunLookup;

    /// All run jobs of `group` in catalog order, or `None` for an unknown group.
    fn group_runs(&self, group: &str) -> Option<Vec<JobRef>>;

    /// Problems found while loading the catalog.
    fn config_errors(&self) -> &[ConfigIssue];
}
