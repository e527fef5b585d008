//! Splitting the run set into a mandatory first phase and the remainder.
//!
//! Some runs produce state that other runs read back (a checkpoint dump
//! followed by a checkpoint load). Those producers are lifted out of the
//! general run set so they finish before their consumers start.

use crate::catalog::{JobCatalog, RunLookup};
use crate::errors::ConfigError;
use crate::job::JobRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A run (or set of runs) that must execute before the general run phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencyDeclaration {
    /// One named run of a sim.
    Run { group: String, run: String },
    /// The first `floor(N/2)` runs of a sim, in catalog order.
    FirstHalf { group: String },
}

/// Result of partitioning: the two run phases.
#[derive(Debug, Clone, Default)]
pub struct RunPartition {
    /// Lifted runs, in declaration order.
    pub first_phase: Vec<JobRef>,
    /// Everything else, in catalog order.
    pub remaining: Vec<JobRef>,
}

impl RunPartition {
    /// Apply `declarations` to `runs`, resolving each one through `catalog`.
    ///
    /// Fails on the first declaration that cannot be resolved, that names a
    /// job outside `runs`, or that names a job an earlier declaration has
    /// already lifted.
    pub fn build(
        catalog: &dyn JobCatalog,
        runs: Vec<JobRef>,
        declarations: &[DependencyDeclaration],
    ) -> Result<Self, ConfigError> {
        let mut partition = RunPartition {
            first_phase: Vec::new(),
            remaining: runs,
        };

        for declaration in declarations {
            for job in resolve(catalog, declaration)? {
                partition.lift(job)?;
            }
        }

        Ok(partition)
    }

    /// Move one job from `remaining` to the end of `first_phase`.
    pub fn lift(&mut self, job: JobRef) -> Result<(), ConfigError> {
        if let Some(pos) = self.remaining.iter().position(|j| j.id() == job.id()) {
            let job = self.remaining.remove(pos);
            debug!(job = job.name(), id = %job.id(), "Lifted run into first phase");
            self.first_phase.push(job);
            return Ok(());
        }

        if self.first_phase.iter().any(|j| j.id() == job.id()) {
            Err(ConfigError::DuplicateDependency {
                job: job.name().to_string(),
            })
        } else {
            Err(ConfigError::NotARunJob {
                job: job.name().to_string(),
            })
        }
    }

    /// Total number of run jobs across both phases.
    pub fn len(&self) -> usize {
        self.first_phase.len() + self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve one declaration to the jobs it names.
fn resolve(
    catalog: &dyn JobCatalog,
    declaration: &DependencyDeclaration,
) -> Result<Vec<JobRef>, ConfigError> {
    match declaration {
        DependencyDeclaration::Run { group, run } => match catalog.lookup_run(group, run) {
            RunLookup::Found(job) => Ok(vec![job]),
            RunLookup::GroupNotFound => Err(ConfigError::GroupNotFound {
                group: group.clone(),
            }),
            RunLookup::RunNotFound => Err(ConfigError::RunNotFound {
                group: group.clone(),
                run: run.clone(),
            }),
        },
        DependencyDeclaration::FirstHalf { group } => {
            let runs = catalog
                .group_runs(group)
                .ok_or_else(|| ConfigError::GroupNotFound {
                    group: group.clone(),
                })?;
            let producers = runs.len() / 2;
            Ok(runs.into_iter().take(producers).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigIssue;
    use crate::job::{Job, JobId, JobKind, LaunchSpec};
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct StubCatalog {
        groups: Vec<(String, Vec<JobRef>)>,
        builds: Vec<JobRef>,
    }

    impl StubCatalog {
        fn new(groups: &[(&str, Vec<&str>)]) -> Self {
            let mut next = 0;
            let mut make = |kind: JobKind, group: &str, input: Option<&str>| {
                next += 1;
                Arc::new(Job::new(
                    JobId(next),
                    kind,
                    group,
                    input.map(str::to_string),
                    LaunchSpec {
                        command: "true".to_string(),
                        working_dir: PathBuf::from("."),
                        expected_exit: 0,
                        binary: None,
                    },
                    PathBuf::from("job.log"),
                ))
            };
            let mut builds = Vec::new();
            let groups = groups
                .iter()
                .map(|(group, inputs)| {
                    builds.push(make(JobKind::Build, group, None));
                    let runs = inputs
                        .iter()
                        .map(|i| make(JobKind::Run, group, Some(*i)))
                        .collect();
                    (group.to_string(), runs)
                })
                .collect();
            Self { groups, builds }
        }
    }

    impl JobCatalog for StubCatalog {
        fn jobs(&self, kind: JobKind) -> Vec<JobRef> {
            match kind {
                JobKind::Build => self.builds.clone(),
                JobKind::Run => self.groups.iter().flat_map(|(_, r)| r.clone()).collect(),
                JobKind::Analyze => Vec::new(),
            }
        }

        fn lookup_run(&self, group: &str, run: &str) -> RunLookup {
            match self.groups.iter().find(|(g, _)| g == group) {
                None => RunLookup::GroupNotFound,
                Some((_, runs)) => runs
                    .iter()
                    .find(|j| j.input() == Some(run))
                    .map(|j| RunLookup::Found(j.clone()))
                    .unwrap_or(RunLookup::RunNotFound),
            }
        }

        fn group_runs(&self, group: &str) -> Option<Vec<JobRef>> {
            self.groups
                .iter()
                .find(|(g, _)| g == group)
                .map(|(_, r)| r.clone())
        }

        fn config_errors(&self) -> &[ConfigIssue] {
            &[]
        }
    }

    fn run(group: &str, run: &str) -> DependencyDeclaration {
        DependencyDeclaration::Run {
            group: group.to_string(),
            run: run.to_string(),
        }
    }

    fn names(jobs: &[JobRef]) -> Vec<&str> {
        jobs.iter().map(|j| j.name()).collect()
    }

    fn catalog() -> StubCatalog {
        StubCatalog::new(&[
            ("SIM_stls", vec!["RUN_test/setup.py", "RUN_test/unit_test.py"]),
            (
                "SIM_checkpoint_data_recording",
                vec![
                    "RUN_test1/dump.py",
                    "RUN_test2/dump.py",
                    "RUN_test1/unit_test.py",
                    "RUN_test2/unit_test.py",
                ],
            ),
            ("SIM_odd", vec!["RUN_a/in.py", "RUN_b/in.py", "RUN_c/in.py"]),
        ])
    }

    #[test]
    fn test_single_declaration_lifts_one_job() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);
        let partition =
            RunPartition::build(&catalog, runs, &[run("SIM_stls", "RUN_test/setup.py")]).unwrap();

        assert_eq!(names(&partition.first_phase), vec!["Run SIM_stls RUN_test/setup.py"]);
        assert_eq!(partition.remaining.len(), 8);
        assert!(
            !names(&partition.remaining).contains(&"Run SIM_stls RUN_test/setup.py")
        );
    }

    #[test]
    fn test_first_half_moves_floor_half_in_catalog_order() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);
        let partition = RunPartition::build(
            &catalog,
            runs,
            &[DependencyDeclaration::FirstHalf {
                group: "SIM_checkpoint_data_recording".to_string(),
            }],
        )
        .unwrap();

        assert_eq!(
            names(&partition.first_phase),
            vec![
                "Run SIM_checkpoint_data_recording RUN_test1/dump.py",
                "Run SIM_checkpoint_data_recording RUN_test2/dump.py",
            ]
        );
        let consumers: Vec<&str> = names(&partition.remaining)
            .into_iter()
            .filter(|n| n.contains("SIM_checkpoint_data_recording"))
            .collect();
        assert_eq!(consumers.len(), 2);
    }

    #[test]
    fn test_first_half_of_odd_group_floors() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);
        let partition = RunPartition::build(
            &catalog,
            runs,
            &[DependencyDeclaration::FirstHalf {
                group: "SIM_odd".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(names(&partition.first_phase), vec!["Run SIM_odd RUN_a/in.py"]);
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);
        let partition = RunPartition::build(
            &catalog,
            runs,
            &[
                run("SIM_odd", "RUN_c/in.py"),
                run("SIM_stls", "RUN_test/setup.py"),
                DependencyDeclaration::FirstHalf {
                    group: "SIM_checkpoint_data_recording".to_string(),
                },
            ],
        )
        .unwrap();
        assert_eq!(
            names(&partition.first_phase),
            vec![
                "Run SIM_odd RUN_c/in.py",
                "Run SIM_stls RUN_test/setup.py",
                "Run SIM_checkpoint_data_recording RUN_test1/dump.py",
                "Run SIM_checkpoint_data_recording RUN_test2/dump.py",
            ]
        );
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);
        let all: HashSet<JobId> = runs.iter().map(|j| j.id()).collect();

        let declaration_sets: Vec<Vec<DependencyDeclaration>> = vec![
            vec![],
            vec![run("SIM_stls", "RUN_test/setup.py")],
            vec![DependencyDeclaration::FirstHalf {
                group: "SIM_checkpoint_data_recording".to_string(),
            }],
            vec![
                run("SIM_stls", "RUN_test/unit_test.py"),
                DependencyDeclaration::FirstHalf {
                    group: "SIM_odd".to_string(),
                },
                run("SIM_checkpoint_data_recording", "RUN_test2/unit_test.py"),
            ],
        ];

        for declarations in declaration_sets {
            let partition = RunPartition::build(&catalog, runs.clone(), &declarations).unwrap();
            let first: HashSet<JobId> = partition.first_phase.iter().map(|j| j.id()).collect();
            let rest: HashSet<JobId> = partition.remaining.iter().map(|j| j.id()).collect();

            assert!(first.is_disjoint(&rest));
            assert_eq!(first.union(&rest).copied().collect::<HashSet<_>>(), all);
            assert_eq!(partition.len(), runs.len());
        }
    }

    #[test]
    fn test_duplicate_declaration_is_error() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);
        let result = RunPartition::build(
            &catalog,
            runs,
            &[
                run("SIM_stls", "RUN_test/setup.py"),
                run("SIM_stls", "RUN_test/setup.py"),
            ],
        );
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateDependency { ref job }) if job == "Run SIM_stls RUN_test/setup.py"
        ));
    }

    #[test]
    fn test_overlapping_first_half_and_run_is_duplicate() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);
        let result = RunPartition::build(
            &catalog,
            runs,
            &[
                DependencyDeclaration::FirstHalf {
                    group: "SIM_checkpoint_data_recording".to_string(),
                },
                run("SIM_checkpoint_data_recording", "RUN_test1/dump.py"),
            ],
        );
        assert!(matches!(result, Err(ConfigError::DuplicateDependency { .. })));
    }

    #[test]
    fn test_unknown_group_and_run_are_errors() {
        let catalog = catalog();
        let runs = catalog.jobs(JobKind::Run);

        let result = RunPartition::build(&catalog, runs.clone(), &[run("SIM_nope", "RUN_x/in.py")]);
        assert!(matches!(result, Err(ConfigError::GroupNotFound { .. })));

        let result = RunPartition::build(&catalog, runs.clone(), &[run("SIM_stls", "RUN_x/in.py")]);
        assert!(matches!(result, Err(ConfigError::RunNotFound { .. })));

        let result = RunPartition::build(
            &catalog,
            runs,
            &[DependencyDeclaration::FirstHalf {
                group: "SIM_nope".to_string(),
            }],
        );
        assert!(matches!(result, Err(ConfigError::GroupNotFound { .. })));
    }

    #[test]
    fn test_job_outside_run_set_is_error() {
        let catalog = catalog();
        // Run set that does not contain the SIM_stls runs.
        let runs: Vec<JobRef> = catalog
            .jobs(JobKind::Run)
            .into_iter()
            .filter(|j| j.group() != "SIM_stls")
            .collect();
        let result = RunPartition::build(&catalog, runs, &[run("SIM_stls", "RUN_test/setup.py")]);
        assert!(matches!(result, Err(ConfigError::NotARunJob { .. })));
    }
}
