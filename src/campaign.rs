//! The campaign orchestrator.
//!
//! Drives one campaign from a loaded catalog to a verdict:
//!
//! 1. build the plan (all configuration checks, nothing dispatched yet)
//! 2. builds, first-phase runs, remaining runs, each to completion
//! 3. output comparison
//! 4. analysis
//! 5. engine report and status summary
//! 6. failing-log dump
//!
//! A failed phase never stops later phases from running.

use crate::catalog::JobCatalog;
use crate::engine::ExecutionEngine;
use crate::errors::CampaignError;
use crate::executor::{PhaseReport, execute_phase};
use crate::failure_log::{FailureLogDump, dump_failing_logs};
use crate::job::JobRef;
use crate::partition::DependencyDeclaration;
use crate::phase::CampaignPlan;
use crate::verdict::PhaseOutcomes;
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use tracing::{error, info, warn};

/// Knobs of one campaign that are not part of the catalog.
#[derive(Debug, Clone)]
pub struct CampaignOptions {
    /// Raw concurrency bound, validated before dispatch.
    pub max_concurrent: i64,
    /// Include analysis jobs in the failing-log dump.
    pub dump_analysis_logs: bool,
}

/// Everything a finished campaign produced.
#[derive(Debug, Clone)]
pub struct CampaignOutcome {
    pub outcomes: PhaseOutcomes,
    pub phases: Vec<PhaseReport>,
    /// Every job of the plan, in phase order.
    pub jobs: Vec<JobRef>,
    pub config_errors: Vec<String>,
    pub dump: FailureLogDump,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CampaignOutcome {
    pub fn success(&self) -> bool {
        self.outcomes.success()
    }

    pub fn exit_code(&self) -> i32 {
        self.outcomes.exit_code()
    }
}

/// One regression campaign over a catalog.
pub struct Campaign<'a> {
    catalog: &'a dyn JobCatalog,
    engine: &'a dyn ExecutionEngine,
    declarations: Vec<DependencyDeclaration>,
    options: CampaignOptions,
}

impl<'a> Campaign<'a> {
    pub fn new(
        catalog: &'a dyn JobCatalog,
        engine: &'a dyn ExecutionEngine,
        declarations: Vec<DependencyDeclaration>,
        options: CampaignOptions,
    ) -> Self {
        Self {
            catalog,
            engine,
            declarations,
            options,
        }
    }

    /// Resolve declarations and the bound into a plan without running anything.
    pub fn plan(&self) -> Result<CampaignPlan, CampaignError> {
        Ok(CampaignPlan::build(
            self.catalog,
            &self.declarations,
            self.options.max_concurrent,
        )?)
    }

    /// Run the campaign, dumping failing logs to stdout.
    pub async fn run(&self) -> Result<CampaignOutcome, CampaignError> {
        let mut stdout = io::stdout();
        self.run_with_output(&mut stdout).await
    }

    /// Run the campaign, dumping failing logs to `out`.
    ///
    /// Returns `Err` only for fatal configuration errors, which are detected
    /// before any job starts. Job, comparison and non-fatal configuration
    /// failures are folded into the returned outcome.
    pub async fn run_with_output<W: Write + Send>(
        &self,
        out: &mut W,
    ) -> Result<CampaignOutcome, CampaignError> {
        let plan = self.plan()?;
        let started_at = Utc::now();

        let config_errors: Vec<String> = self
            .catalog
            .config_errors()
            .iter()
            .map(|issue| issue.to_string())
            .collect();
        for issue in &config_errors {
            warn!(issue = %issue, "Configuration error");
        }

        info!(
            builds = plan.build.len(),
            first_runs = plan.first_runs.len(),
            runs = plan.runs.len(),
            analyses = plan.analysis.len(),
            bound = plan.build.bound.get(),
            "Campaign started"
        );

        let build = execute_phase(self.engine, &plan.build).await;
        let first_runs = execute_phase(self.engine, &plan.first_runs).await;
        let runs = execute_phase(self.engine, &plan.runs).await;

        let comparison_failed = self.engine.compare().await;
        if comparison_failed {
            warn!("Output comparison failed");
        }

        let analysis = execute_phase(self.engine, &plan.analysis).await;

        self.engine.report();
        self.engine.status_summary();

        let outcomes = PhaseOutcomes {
            build_failed: build.failed,
            first_phase_failed: first_runs.failed,
            runs_failed: runs.failed,
            comparison_failed,
            analysis_failed: analysis.failed,
            config_errors: config_errors.len(),
        };

        let dump = match dump_failing_logs(
            out,
            &plan.dump_scope(self.options.dump_analysis_logs),
        ) {
            Ok(dump) => dump,
            Err(e) => {
                warn!(error = %e, "Failed to write failing job logs");
                FailureLogDump::default()
            }
        };
        for failure in &dump.unreadable {
            error!(
                job = %failure.job,
                log_file = %failure.log_file.display(),
                error = %failure.error,
                "Could not read log of failed job"
            );
            eprintln!(
                "Could not read log of failed job {} ({}): {}",
                failure.job,
                failure.log_file.display(),
                failure.error
            );
        }

        info!(
            success = outcomes.success(),
            failed = ?outcomes.failure_sources(),
            "Campaign finished"
        );

        Ok(CampaignOutcome {
            outcomes,
            phases: vec![build, first_runs, runs, analysis],
            jobs: plan.all_jobs(),
            config_errors,
            dump,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
