//! Catalog built from the campaign config file.

use super::{JobCatalog, RunLookup};
use crate::config::{CampaignFile, CampaignSettings, ConfigIssue, SimEntry};
use crate::job::{Job, JobId, JobKind, JobRef, LaunchSpec};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A `test vs. baseline` output comparison attached to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Name of the run job that produces `test`.
    pub job: String,
    pub test: PathBuf,
    pub baseline: PathBuf,
}

impl Comparison {
    /// Parse `"<test> vs. <baseline>"`, resolving both sides against `root`.
    pub fn parse(job: &str, pair: &str, root: &Path) -> Option<Self> {
        let (test, baseline) = pair.split_once(" vs. ")?;
        let (test, baseline) = (test.trim(), baseline.trim());
        if test.is_empty() || baseline.is_empty() {
            return None;
        }
        Some(Self {
            job: job.to_string(),
            test: root.join(test),
            baseline: root.join(baseline),
        })
    }
}

/// One run of a sim, with the analysis job it owns (if any).
#[derive(Debug, Clone)]
pub struct SimRun {
    pub input: String,
    pub job: JobRef,
    pub analyze: Option<JobRef>,
}

/// One sim: a build job plus its runs in declaration order.
#[derive(Debug, Clone)]
pub struct Sim {
    pub name: String,
    pub dir: PathBuf,
    pub build: JobRef,
    pub runs: Vec<SimRun>,
}

/// Jobs discovered from a [`CampaignFile`].
#[derive(Debug, Default)]
pub struct SimCatalog {
    sims: Vec<Sim>,
    comparisons: Vec<Comparison>,
    issues: Vec<ConfigIssue>,
    /// Log paths handed out so far. Two jobs never share one.
    log_files: HashSet<PathBuf>,
}

impl SimCatalog {
    /// Build every job described by `file`. Sims whose directory does not
    /// exist and runs whose input file does not exist are skipped and
    /// recorded as config issues, as are jobs whose log file name would
    /// clash with an earlier job's after sanitizing.
    pub fn load(file: &CampaignFile, settings: &CampaignSettings) -> Self {
        let mut catalog = SimCatalog {
            issues: file.issues.clone(),
            ..Default::default()
        };
        let mut next_id = 0usize;

        for entry in &file.sims {
            catalog.add_sim(entry, settings, &mut next_id);
        }

        catalog
    }

    fn add_sim(&mut self, entry: &SimEntry, settings: &CampaignSettings, next_id: &mut usize) {
        let root = &settings.project_root;
        let dir = root.join(&entry.config.path);
        if !dir.is_dir() {
            self.issues.push(ConfigIssue::new(format!(
                "Sim '{}': directory {} does not exist",
                entry.name,
                dir.display()
            )));
            return;
        }

        let log_path =
            |kind: JobKind, input: Option<&str>| settings.log_dir.join(log_file_name(kind, &entry.name, input));

        let build_log = log_path(JobKind::Build, None);
        if !self.log_files.insert(build_log.clone()) {
            self.issues.push(ConfigIssue::new(format!(
                "Sim '{}': log file {} is already used by another sim",
                entry.name,
                build_log.display()
            )));
            return;
        }

        let mut new_job = |kind: JobKind, input: Option<&str>, command: &str, expected_exit: i32| {
            let id = JobId(*next_id);
            *next_id += 1;
            let launch = LaunchSpec {
                command: with_env(settings.env.as_deref(), command),
                working_dir: dir.clone(),
                expected_exit,
                binary: (kind == JobKind::Run).then(|| entry.config.binary.clone()),
            };
            Arc::new(Job::new(
                id,
                kind,
                entry.name.clone(),
                input.map(str::to_string),
                launch,
                log_path(kind, input),
            ))
        };

        let build = new_job(JobKind::Build, None, &entry.config.build_command, 0);
        let mut runs = Vec::with_capacity(entry.runs.len());
        let mut comparisons = Vec::new();
        let mut issues = Vec::new();

        for (input, run) in &entry.runs {
            if !dir.join(input_file(input)).exists() {
                issues.push(ConfigIssue::new(format!(
                    "Sim '{}': run input {} does not exist",
                    entry.name, input
                )));
                continue;
            }

            let mut logs = vec![log_path(JobKind::Run, Some(input))];
            if run.analyze.is_some() {
                logs.push(log_path(JobKind::Analyze, Some(input)));
            }
            if let Some(taken) = logs.iter().find(|l| self.log_files.contains(*l)) {
                issues.push(ConfigIssue::new(format!(
                    "Sim '{}' run '{}': log file {} is already used by another run",
                    entry.name,
                    input,
                    taken.display()
                )));
                continue;
            }
            self.log_files.extend(logs);

            let command = entry.config.run_command.replace("{input}", input);
            let job = new_job(JobKind::Run, Some(input), &command, run.returns);
            let analyze = run
                .analyze
                .as_deref()
                .map(|cmd| new_job(JobKind::Analyze, Some(input), cmd, 0));

            for pair in &run.compare {
                match Comparison::parse(job.name(), pair, root) {
                    Some(c) => comparisons.push(c),
                    None => issues.push(ConfigIssue::new(format!(
                        "Sim '{}' run '{}': malformed compare entry '{}', expected '<test> vs. <baseline>'",
                        entry.name, input, pair
                    ))),
                }
            }

            runs.push(SimRun {
                input: input.clone(),
                job,
                analyze,
            });
        }

        self.sims.push(Sim {
            name: entry.name.clone(),
            dir: dir.clone(),
            build,
            runs,
        });
        self.comparisons.extend(comparisons);
        self.issues.extend(issues);
    }

    pub fn sims(&self) -> &[Sim] {
        &self.sims
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    fn sim(&self, name: &str) -> Option<&Sim> {
        self.sims.iter().find(|s| s.name == name)
    }
}

impl JobCatalog for SimCatalog {
    fn jobs(&self, kind: JobKind) -> Vec<JobRef> {
        match kind {
            JobKind::Build => self.sims.iter().map(|s| s.build.clone()).collect(),
            JobKind::Run => self
                .sims
                .iter()
                .flat_map(|s| s.runs.iter().map(|r| r.job.clone()))
                .collect(),
            JobKind::Analyze => self
                .sims
                .iter()
                .flat_map(|s| s.runs.iter().filter_map(|r| r.analyze.clone()))
                .collect(),
        }
    }

    fn lookup_run(&self, group: &str, run: &str) -> RunLookup {
        let Some(sim) = self.sim(group) else {
            return RunLookup::GroupNotFound;
        };
        match sim.runs.iter().find(|r| r.input == run) {
            Some(r) => RunLookup::Found(r.job.clone()),
            None => RunLookup::RunNotFound,
        }
    }

    fn group_runs(&self, group: &str) -> Option<Vec<JobRef>> {
        self.sim(group)
            .map(|s| s.runs.iter().map(|r| r.job.clone()).collect())
    }

    fn config_errors(&self) -> &[ConfigIssue] {
        &self.issues
    }
}

/// The input file of a run entry. Entries may carry trailing arguments
/// (`RUN_test/input.py --flag`); only the first word names the file.
fn input_file(input: &str) -> &str {
    input.split_whitespace().next().unwrap_or(input)
}

fn with_env(env: Option<&str>, command: &str) -> String {
    match env {
        Some(env) if !env.trim().is_empty() => format!("{} && {}", env, command),
        _ => command.to_string(),
    }
}

fn log_file_name(kind: JobKind, group: &str, input: Option<&str>) -> String {
    let stem = match input {
        Some(input) => format!("{}_{}_{}", kind, group, input),
        None => format!("{}_{}", kind, group),
    };
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.log", sanitized)
}
