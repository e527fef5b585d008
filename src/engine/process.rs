//! Engine that runs every job as a shell process.
//!
//! Each job runs as `sh -c <command>` in its working directory with stdout and
//! stderr captured to its log file. A job passes when its exit code equals the
//! expected code from the config.

use super::compare::{ComparisonResult, compare_files};
use super::{ExecutionEngine, dispatch_bounded};
use crate::catalog::{JobCatalog, SimCatalog};
use crate::job::{Job, JobKind, JobRef, JobStatus, LaunchSpec, any_failed};
use crate::phase::ConcurrencyBound;
use crate::ui::icons::{CHECK, COMPARE, CROSS, WARNING};
use crate::ui::{PhaseProgress, status_label};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use console::style;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default glob for the sim executable when a run job has none.
const DEFAULT_BINARY: &str = "S_main*.exe";

/// Launches jobs from a [`SimCatalog`] as local processes.
pub struct ProcessEngine {
    catalog: Arc<SimCatalog>,
    quiet: bool,
    comparisons: Mutex<Vec<ComparisonResult>>,
}

impl ProcessEngine {
    pub fn new(catalog: Arc<SimCatalog>, quiet: bool) -> Self {
        Self {
            catalog,
            quiet,
            comparisons: Mutex::new(Vec::new()),
        }
    }

    /// Results of the last `compare()` call.
    pub fn comparison_results(&self) -> Vec<ComparisonResult> {
        self.comparisons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn print_job(job: &Job, indent: usize) {
        let duration = job
            .duration()
            .map(|d| format!("{:.1}s", d.as_secs_f64()))
            .unwrap_or_default();
        println!(
            "{:indent$}{:<8} {} {}",
            "",
            status_label(job.status()),
            job.name(),
            style(duration).dim(),
            indent = indent
        );
    }
}

#[async_trait]
impl ExecutionEngine for ProcessEngine {
    async fn execute(&self, jobs: &[JobRef], bound: ConcurrencyBound, header: &str) -> bool {
        let progress = Arc::new(PhaseProgress::start(header, jobs.len(), self.quiet));
        info!(phase = header, jobs = jobs.len(), bound = bound.get(), "Dispatching jobs");

        let dispatched = dispatch_bounded(jobs, bound, |job| {
            let progress = progress.clone();
            async move {
                progress.job_started(&job);
                run_job(&job).await;
                progress.job_finished(&job);
            }
        })
        .await;

        if let Err(e) = dispatched {
            warn!(phase = header, error = %e, "Dispatch stopped early");
        }

        // A job whose task panicked or was never dispatched is a failure.
        for job in jobs.iter().filter(|j| !j.status().is_terminal()) {
            job.finish(false, None, Duration::ZERO);
        }

        progress.finish();
        any_failed(jobs)
    }

    async fn compare(&self) -> bool {
        let mut results = Vec::with_capacity(self.catalog.comparisons().len());
        for comparison in self.catalog.comparisons() {
            let outcome = compare_files(&comparison.test, &comparison.baseline).await;
            debug!(job = %comparison.job, test = %comparison.test.display(), ?outcome, "Compared output");
            results.push(ComparisonResult::new(comparison, outcome));
        }

        let failed = results.iter().any(|r| !r.outcome.is_match());
        *self.comparisons.lock().unwrap_or_else(PoisonError::into_inner) = results;
        failed
    }

    fn report(&self) {
        let comparisons = self.comparison_results();

        println!();
        println!("{}", style("Campaign Report").bold().cyan());
        println!("{}", style("═".repeat(60)).cyan());

        for sim in self.catalog.sims() {
            println!("{} {}", style(&sim.name).bold(), style(sim.dir.display()).dim());
            Self::print_job(&sim.build, 2);
            for run in &sim.runs {
                Self::print_job(&run.job, 2);
                for cmp in comparisons.iter().filter(|c| c.job == run.job.name()) {
                    let icon = if cmp.outcome.is_match() { &CHECK } else { &CROSS };
                    println!(
                        "      {}{}{} vs. {}",
                        COMPARE,
                        icon,
                        cmp.test,
                        cmp.baseline
                    );
                }
                if let Some(analyze) = &run.analyze {
                    Self::print_job(analyze, 4);
                }
            }
        }

        let issues = self.catalog.config_errors();
        if !issues.is_empty() {
            println!();
            println!("{}{}", WARNING, style("Configuration errors").yellow().bold());
            for issue in issues {
                println!("  - {}", issue);
            }
        }
    }

    fn status_summary(&self) {
        let comparisons = self.comparison_results();

        println!();
        println!("{}", style("Summary").bold().cyan());
        for (label, kind) in [
            ("Builds", JobKind::Build),
            ("Runs", JobKind::Run),
            ("Analyses", JobKind::Analyze),
        ] {
            let jobs = self.catalog.jobs(kind);
            let passed = jobs.iter().filter(|j| j.status() == JobStatus::Passed).count();
            let failed = jobs.iter().filter(|j| j.status() == JobStatus::Failed).count();
            print_tally(label, passed, failed);
        }

        let matched = comparisons.iter().filter(|c| c.outcome.is_match()).count();
        print_tally("Comparisons", matched, comparisons.len() - matched);

        let issues = self.catalog.config_errors().len();
        if issues > 0 {
            println!("  {:<12} {}", "Config", style(format!("{} errors", issues)).red().bold());
        }
    }
}

fn print_tally(label: &str, passed: usize, failed: usize) {
    let failed = if failed == 0 {
        style(format!("{} failed", failed)).dim()
    } else {
        style(format!("{} failed", failed)).red().bold()
    };
    println!(
        "  {:<12} {}, {}",
        label,
        style(format!("{} passed", passed)).green(),
        failed
    );
}

/// Run one job to completion and record its outcome on the job.
async fn run_job(job: &Job) {
    job.mark_running();
    let start = Instant::now();

    let (passed, exit_code) = match launch(job).await {
        Ok(code) => (code == Some(job.launch().expected_exit), code),
        Err(e) => {
            warn!(job = job.name(), id = %job.id(), error = %e, "Job could not be launched");
            if let Err(log_err) = append_to_log(job.log_file(), &format!("simops: {:#}\n", e)).await {
                warn!(job = job.name(), error = %log_err, "Failed to record launch error in log");
            }
            (false, None)
        }
    };

    debug!(job = job.name(), id = %job.id(), ?exit_code, passed, "Job finished");
    job.finish(passed, exit_code, start.elapsed());
}

/// Spawn the job's process with output redirected to its log file.
async fn launch(job: &Job) -> Result<Option<i32>> {
    let spec = job.launch();
    if let Some(parent) = job.log_file().parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let log = std::fs::File::create(job.log_file())
        .with_context(|| format!("Failed to create log file {}", job.log_file().display()))?;
    let stderr = log.try_clone().context("Failed to duplicate log file handle")?;

    let command = expand_command(spec)?;
    debug!(job = job.name(), %command, dir = %spec.working_dir.display(), "Spawning");

    let status = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .current_dir(&spec.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("Failed to spawn '{}'", command))?;

    Ok(status.code())
}

/// Substitute `{binary}` with the executable found in the working directory.
fn expand_command(spec: &LaunchSpec) -> Result<String> {
    if !spec.command.contains("{binary}") {
        return Ok(spec.command.clone());
    }
    let pattern = spec.binary.as_deref().unwrap_or(DEFAULT_BINARY);
    let binary = find_binary(&spec.working_dir, pattern)?;
    Ok(spec.command.replace("{binary}", &binary))
}

fn find_binary(dir: &Path, pattern: &str) -> Result<String> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let mut matches: Vec<PathBuf> = glob::glob(&full)
        .with_context(|| format!("Invalid binary pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    matches.sort();

    let Some(first) = matches.first() else {
        bail!(
            "No executable matching '{}' in {} (did the build succeed?)",
            pattern,
            dir.display()
        );
    };
    let relative = first.strip_prefix(dir).unwrap_or(first);
    Ok(format!("./{}", relative.display()))
}

async fn append_to_log(path: &Path, message: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(message.as_bytes()).await
}
