//! Typed error hierarchy for the campaign orchestrator.
//!
//! Two top-level enums cover the two failure domains:
//! - `ConfigError`: fatal configuration problems detected before any dispatch
//! - `CampaignError`: anything that aborts a campaign as a whole

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration errors. Any of these aborts the campaign before the
/// first phase is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Dependency on sim '{group}': no sim group with that name")]
    GroupNotFound { group: String },

    #[error("Dependency on {group}/{run}: sim '{group}' has no run '{run}'")]
    RunNotFound { group: String, run: String },

    #[error("Duplicate dependency declaration for job '{job}'")]
    DuplicateDependency { job: String },

    #[error("Dependency declaration resolved to '{job}', which is not a pending run job")]
    NotARunJob { job: String },

    #[error("Invalid concurrency bound {value}: must be a positive integer no larger than 2^61 - 1")]
    InvalidConcurrency { value: i64 },

    #[error("Invalid first-phase entry for sim '{group}': {reason}")]
    InvalidDeclaration { group: String, reason: String },

    #[error("Failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors that abort a campaign.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create log directory at {path}: {source}")]
    LogDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
