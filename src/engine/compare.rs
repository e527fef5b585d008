//! Byte-for-byte comparison of run outputs against baselines.

use crate::catalog::Comparison;
use serde::Serialize;
use std::path::Path;

/// How a single comparison turned out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Match,
    Differs,
    Missing { path: String, error: String },
}

impl ComparisonOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// A comparison together with its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub job: String,
    pub test: String,
    pub baseline: String,
    #[serde(flatten)]
    pub outcome: ComparisonOutcome,
}

impl ComparisonResult {
    pub fn new(comparison: &Comparison, outcome: ComparisonOutcome) -> Self {
        Self {
            job: comparison.job.clone(),
            test: comparison.test.display().to_string(),
            baseline: comparison.baseline.display().to_string(),
            outcome,
        }
    }
}

/// Compare two files. Either file missing or unreadable is reported as
/// `Missing` and counts as a failed comparison.
pub async fn compare_files(test: &Path, baseline: &Path) -> ComparisonOutcome {
    let read = |path: &Path| {
        let path = path.to_path_buf();
        async move {
            tokio::fs::read(&path)
                .await
                .map_err(|e| ComparisonOutcome::Missing {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })
        }
    };

    let test = match read(test).await {
        Ok(bytes) => bytes,
        Err(missing) => return missing,
    };
    let baseline = match read(baseline).await {
        Ok(bytes) => bytes,
        Err(missing) => return missing,
    };

    if test == baseline {
        ComparisonOutcome::Match
    } else {
        ComparisonOutcome::Differs
    }
}
