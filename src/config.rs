//! Campaign configuration loaded from the project's sim config file.
//!
//! The file is YAML and lists every sim in the campaign alongside an optional
//! `campaign` block that controls phase ordering and concurrency.
//!
//! # Configuration File Format
//!
//! ```yaml
//! globals:
//!   env: "source bin/env.sh"
//!
//! campaign:
//!   log_dir: trickops_logs
//!   max_concurrent: 4
//!   dump_analysis_logs: false
//!   first_phase:
//!     - sim: SIM_stls
//!       run: RUN_test/setup.py
//!     - sim: SIM_checkpoint_data_recording
//!       first_half: true
//!
//! SIM_stls:
//!   path: test/SIM_stls
//!   build_command: trick-CP
//!   runs:
//!     RUN_test/setup.py:
//!     RUN_test/unit_test.py:
//!       returns: 0
//!       compare:
//!         - test/SIM_stls/RUN_test/log.csv vs. test/SIM_stls/Ref/log.csv
//!       analyze: "python3 check_log.py"
//! ```
//!
//! Only top-level keys beginning with `SIM` describe sims. A malformed sim or
//! run entry is recorded as a [`ConfigIssue`] and skipped, so one bad entry
//! fails the campaign verdict without hiding every other result. A malformed
//! `campaign` block is fatal.

use crate::errors::ConfigError;
use crate::partition::DependencyDeclaration;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default config file name, relative to the project root.
pub const DEFAULT_CONFIG_FILE: &str = "test_sims.yml";

/// Default log directory name, relative to the project root.
pub const DEFAULT_LOG_DIR: &str = "trickops_logs";

/// Concurrency used when the host CPU count cannot be determined.
pub const FALLBACK_CONCURRENCY: i64 = 8;

/// A non-fatal problem found while loading the config. Each one counts as a
/// configuration error in the final verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub message: String,
}

impl ConfigIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Settings applied to every sim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Globals {
    /// Shell prelude run before every job command
    #[serde(default)]
    pub env: Option<String>,
}

/// One `first_phase` entry as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstPhaseEntry {
    pub sim: String,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default)]
    pub first_half: bool,
}

impl FirstPhaseEntry {
    /// Convert into a typed declaration. Exactly one of `run` or `first_half`
    /// must be given.
    pub fn to_declaration(&self) -> Result<DependencyDeclaration, ConfigError> {
        match (&self.run, self.first_half) {
            (Some(run), false) => Ok(DependencyDeclaration::Run {
                group: self.sim.clone(),
                run: run.clone(),
            }),
            (None, true) => Ok(DependencyDeclaration::FirstHalf {
                group: self.sim.clone(),
            }),
            (Some(_), true) => Err(ConfigError::InvalidDeclaration {
                group: self.sim.clone(),
                reason: "'run' and 'first_half' are mutually exclusive".to_string(),
            }),
            (None, false) => Err(ConfigError::InvalidDeclaration {
                group: self.sim.clone(),
                reason: "one of 'run' or 'first_half: true' is required".to_string(),
            }),
        }
    }
}

/// The `campaign` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignSection {
    /// Log directory, relative to the project root
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Concurrency bound for every phase (default: CPU count)
    #[serde(default)]
    pub max_concurrent: Option<i64>,
    /// Include analysis jobs in the failing-log dump
    #[serde(default)]
    pub dump_analysis_logs: bool,
    /// Runs that must complete before the general run phase
    #[serde(default)]
    pub first_phase: Vec<FirstPhaseEntry>,
}

fn default_build_command() -> String {
    "trick-CP".to_string()
}

fn default_binary() -> String {
    "S_main*.exe".to_string()
}

fn default_run_command() -> String {
    "{binary} {input}".to_string()
}

/// One run of a sim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Expected exit code
    #[serde(default)]
    pub returns: i32,
    /// `"<test> vs. <baseline>"` pairs, relative to the project root
    #[serde(default)]
    pub compare: Vec<String>,
    /// Analysis command run from the sim directory after all runs
    #[serde(default)]
    pub analyze: Option<String>,
}

/// One sim as written in the file. `runs` keeps declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_build_command")]
    pub build_command: String,
    /// Glob for the sim executable, resolved in the sim directory
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Template for run commands; `{binary}` and `{input}` are substituted
    #[serde(default = "default_run_command")]
    pub run_command: String,
    #[serde(default)]
    pub runs: Mapping,
}

/// A parsed sim with its runs in declaration order.
#[derive(Debug, Clone)]
pub struct SimEntry {
    pub name: String,
    pub config: SimConfig,
    pub runs: Vec<(String, RunConfig)>,
}

/// The complete parsed config file.
#[derive(Debug, Clone, Default)]
pub struct CampaignFile {
    pub globals: Globals,
    pub campaign: CampaignSection,
    pub sims: Vec<SimEntry>,
    pub issues: Vec<ConfigIssue>,
}

impl CampaignFile {
    /// Load the config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse the config from a YAML string.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        let root: Value = serde_yaml::from_str(content)?;
        let mut file = CampaignFile::default();

        let mapping = match root {
            Value::Mapping(m) => m,
            Value::Null => return Ok(file),
            _ => {
                file.issues
                    .push(ConfigIssue::new("Config root must be a mapping of sims"));
                return Ok(file);
            }
        };

        for (key, value) in mapping {
            let Some(key) = key.as_str().map(str::to_string) else {
                file.issues
                    .push(ConfigIssue::new(format!("Non-string top-level key {:?}", key)));
                continue;
            };

            match key.as_str() {
                "globals" => file.globals = from_optional_value(value)?,
                "campaign" => file.campaign = from_optional_value(value)?,
                name if name.starts_with("SIM") => {
                    if let Some(entry) = parse_sim(name, value, &mut file.issues) {
                        file.sims.push(entry);
                    }
                }
                other => file.issues.push(ConfigIssue::new(format!(
                    "Unrecognized top-level key '{}': sim names must begin with 'SIM'",
                    other
                ))),
            }
        }

        Ok(file)
    }

    /// Typed dependency declarations from the `campaign.first_phase` list.
    pub fn declarations(&self) -> Result<Vec<DependencyDeclaration>, ConfigError> {
        self.campaign
            .first_phase
            .iter()
            .map(FirstPhaseEntry::to_declaration)
            .collect()
    }
}

fn from_optional_value<T: Default + for<'de> Deserialize<'de>>(
    value: Value,
) -> Result<T, serde_yaml::Error> {
    if value.is_null() {
        Ok(T::default())
    } else {
        serde_yaml::from_value(value)
    }
}

fn parse_sim(name: &str, value: Value, issues: &mut Vec<ConfigIssue>) -> Option<SimEntry> {
    let config: SimConfig = match serde_yaml::from_value(value) {
        Ok(c) => c,
        Err(e) => {
            issues.push(ConfigIssue::new(format!("Invalid entry for sim '{}': {}", name, e)));
            return None;
        }
    };

    let mut runs = Vec::with_capacity(config.runs.len());
    for (key, value) in &config.runs {
        let Some(input) = key.as_str() else {
            issues.push(ConfigIssue::new(format!(
                "Sim '{}' has a non-string run key {:?}",
                name, key
            )));
            continue;
        };
        if runs.iter().any(|(existing, _)| existing == input) {
            issues.push(ConfigIssue::new(format!(
                "Sim '{}' lists run '{}' more than once",
                name, input
            )));
            continue;
        }
        match from_optional_value::<RunConfig>(value.clone()) {
            Ok(run) => runs.push((input.to_string(), run)),
            Err(e) => issues.push(ConfigIssue::new(format!(
                "Invalid run '{}' in sim '{}': {}",
                input, name, e
            ))),
        }
    }

    Some(SimEntry {
        name: name.to_string(),
        config,
        runs,
    })
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_dir: Option<PathBuf>,
    pub max_concurrent: Option<i64>,
    pub quiet: bool,
    pub dump_analysis_logs: bool,
}

/// Fully resolved runtime settings for one campaign.
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    pub project_root: PathBuf,
    pub log_dir: PathBuf,
    /// Raw bound; validated when the campaign plan is built.
    pub max_concurrent: i64,
    pub quiet: bool,
    pub dump_analysis_logs: bool,
    pub env: Option<String>,
}

impl CampaignSettings {
    /// Layer CLI overrides over the file, falling back to defaults.
    pub fn resolve(project_root: &Path, file: &CampaignFile, overrides: &Overrides) -> Self {
        let log_dir = overrides
            .log_dir
            .clone()
            .or_else(|| file.campaign.log_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
        let log_dir = if log_dir.is_absolute() {
            log_dir
        } else {
            project_root.join(log_dir)
        };

        Self {
            project_root: project_root.to_path_buf(),
            log_dir,
            max_concurrent: overrides
                .max_concurrent
                .or(file.campaign.max_concurrent)
                .unwrap_or_else(default_concurrency),
            quiet: overrides.quiet,
            dump_analysis_logs: overrides.dump_analysis_logs || file.campaign.dump_analysis_logs,
            env: file.globals.env.clone(),
        }
    }
}

/// Host CPU count, or [`FALLBACK_CONCURRENCY`] when it cannot be determined.
pub fn default_concurrency() -> i64 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(FALLBACK_CONCURRENCY)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
globals:
  env: "export SIM_HOME=/opt/sim"
campaign:
  max_concurrent: 3
  first_phase:
    - sim: SIM_stls
      run: RUN_test/setup.py
    - sim: SIM_checkpoint
      first_half: true
SIM_stls:
  path: test/SIM_stls
  runs:
    RUN_test/setup.py:
    RUN_test/unit_test.py:
      returns: 0
      compare:
        - a.csv vs. b.csv
      analyze: "python3 check.py"
SIM_checkpoint:
  path: test/SIM_checkpoint
  build_command: make
  runs:
    RUN_test1/dump.py:
    RUN_test2/dump.py:
    RUN_test1/check.py:
    RUN_test2/check.py:
"#;

    #[test]
    fn test_parse_sample_config() {
        let file = CampaignFile::parse(SAMPLE).unwrap();
        assert!(file.issues.is_empty(), "{:?}", file.issues);
        assert_eq!(file.globals.env.as_deref(), Some("export SIM_HOME=/opt/sim"));
        assert_eq!(file.campaign.max_concurrent, Some(3));
        assert_eq!(file.sims.len(), 2);

        let stls = &file.sims[0];
        assert_eq!(stls.name, "SIM_stls");
        assert_eq!(stls.config.build_command, "trick-CP");
        assert_eq!(stls.config.binary, "S_main*.exe");
        assert_eq!(stls.runs.len(), 2);
        assert_eq!(stls.runs[0].0, "RUN_test/setup.py");
        assert_eq!(stls.runs[0].1, RunConfig::default());
        assert_eq!(stls.runs[1].1.compare, vec!["a.csv vs. b.csv".to_string()]);
        assert_eq!(stls.runs[1].1.analyze.as_deref(), Some("python3 check.py"));

        assert_eq!(file.sims[1].config.build_command, "make");
    }

    #[test]
    fn test_runs_keep_declaration_order() {
        let file = CampaignFile::parse(SAMPLE).unwrap();
        let inputs: Vec<&str> = file.sims[1].runs.iter().map(|(i, _)| i.as_str()).collect();
        assert_eq!(
            inputs,
            vec![
                "RUN_test1/dump.py",
                "RUN_test2/dump.py",
                "RUN_test1/check.py",
                "RUN_test2/check.py"
            ]
        );
    }

    #[test]
    fn test_declarations_from_first_phase() {
        let file = CampaignFile::parse(SAMPLE).unwrap();
        let decls = file.declarations().unwrap();
        assert_eq!(
            decls,
            vec![
                DependencyDeclaration::Run {
                    group: "SIM_stls".to_string(),
                    run: "RUN_test/setup.py".to_string(),
                },
                DependencyDeclaration::FirstHalf {
                    group: "SIM_checkpoint".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_first_phase_entry_needs_exactly_one_selector() {
        let both = FirstPhaseEntry {
            sim: "SIM_a".to_string(),
            run: Some("RUN_x/input.py".to_string()),
            first_half: true,
        };
        assert!(matches!(
            both.to_declaration(),
            Err(ConfigError::InvalidDeclaration { .. })
        ));

        let neither = FirstPhaseEntry {
            sim: "SIM_a".to_string(),
            run: None,
            first_half: false,
        };
        assert!(matches!(
            neither.to_declaration(),
            Err(ConfigError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    fn test_bad_entries_become_issues() {
        let content = r#"
not_a_sim:
  path: x
SIM_missing_path:
  runs:
    RUN_a/input.py:
SIM_ok:
  path: test/SIM_ok
  runs:
    RUN_a/input.py:
      returns: "not a number"
    RUN_b/input.py:
"#;
        let file = CampaignFile::parse(content).unwrap();
        assert_eq!(file.issues.len(), 3, "{:?}", file.issues);
        assert_eq!(file.sims.len(), 1);
        assert_eq!(file.sims[0].runs.len(), 1);
        assert_eq!(file.sims[0].runs[0].0, "RUN_b/input.py");
    }

    #[test]
    fn test_malformed_campaign_block_is_fatal() {
        let content = "campaign:\n  max_concurrent: lots\n";
        assert!(CampaignFile::parse(content).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CampaignFile::load(&dir.path().join("nope.yml"));
        assert!(matches!(result, Err(ConfigError::ConfigRead { .. })));
    }

    #[test]
    fn test_settings_cli_overrides_file() {
        let file = CampaignFile::parse(SAMPLE).unwrap();
        let root = Path::new("/project");

        let settings = CampaignSettings::resolve(root, &file, &Overrides::default());
        assert_eq!(settings.max_concurrent, 3);
        assert_eq!(settings.log_dir, PathBuf::from("/project/trickops_logs"));
        assert!(!settings.dump_analysis_logs);

        let overrides = Overrides {
            log_dir: Some(PathBuf::from("/tmp/logs")),
            max_concurrent: Some(7),
            quiet: true,
            dump_analysis_logs: true,
        };
        let settings = CampaignSettings::resolve(root, &file, &overrides);
        assert_eq!(settings.max_concurrent, 7);
        assert_eq!(settings.log_dir, PathBuf::from("/tmp/logs"));
        assert!(settings.quiet);
        assert!(settings.dump_analysis_logs);
    }

    #[test]
    fn test_default_concurrency_is_positive() {
        assert!(default_concurrency() >= 1);
    }
}
