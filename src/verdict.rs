//! Folding every failure source of a campaign into one verdict.
//!
//! A campaign is binary: it passes only if every phase passed, every output
//! comparison matched and the configuration loaded cleanly.

use serde::{Deserialize, Serialize};

/// Failure flags collected over one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutcomes {
    pub build_failed: bool,
    pub first_phase_failed: bool,
    pub runs_failed: bool,
    pub comparison_failed: bool,
    pub analysis_failed: bool,
    /// Number of non-fatal configuration errors found while loading
    pub config_errors: usize,
}

impl PhaseOutcomes {
    /// True iff nothing failed.
    pub fn success(&self) -> bool {
        !(self.build_failed
            || self.first_phase_failed
            || self.runs_failed
            || self.comparison_failed
            || self.analysis_failed
            || self.config_errors > 0)
    }

    /// Process exit code for this verdict.
    pub fn exit_code(&self) -> i32 {
        if self.success() { 0 } else { 1 }
    }

    /// Names of the sources that failed, for operator output.
    pub fn failure_sources(&self) -> Vec<&'static str> {
        [
            (self.build_failed, "builds"),
            (self.first_phase_failed, "first phase runs"),
            (self.runs_failed, "runs"),
            (self.comparison_failed, "comparisons"),
            (self.analysis_failed, "analyses"),
            (self.config_errors > 0, "configuration"),
        ]
        .into_iter()
        .filter_map(|(failed, name)| failed.then_some(name))
        .collect()
    }
}
