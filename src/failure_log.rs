//! Dumping the captured logs of failed jobs.
//!
//! Runs after every phase has finished. The dump is diagnostic only: it never
//! changes the campaign verdict.

use crate::job::{JobRef, JobStatus};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

/// Width of the delimiter lines around each log.
pub const BANNER_WIDTH: usize = 120;

/// A failed job whose log could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct LogReadFailure {
    pub job: String,
    pub log_file: PathBuf,
    pub error: String,
}

/// What the dump printed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureLogDump {
    /// Names of the failed jobs, in dump order
    pub failed_jobs: Vec<String>,
    pub unreadable: Vec<LogReadFailure>,
}

/// Write a delimited block with the full log of every failed job in `jobs`.
///
/// Passing and unfinished jobs are skipped. A log that cannot be read gets a
/// placeholder inside its block and is returned in `unreadable`. The `Err`
/// case is reserved for failures writing to `out`.
pub fn dump_failing_logs<'a, W: Write>(
    out: &mut W,
    jobs: impl IntoIterator<Item = &'a JobRef>,
) -> io::Result<FailureLogDump> {
    let banner = "*".repeat(BANNER_WIDTH);
    let mut dump = FailureLogDump::default();

    for job in jobs {
        if job.status() != JobStatus::Failed {
            continue;
        }

        writeln!(out, "Failing job:  {}", job.name())?;
        writeln!(out, "{}", banner)?;
        match std::fs::read(job.log_file()) {
            Ok(bytes) => {
                out.write_all(&bytes)?;
                if !bytes.is_empty() && !bytes.ends_with(b"\n") {
                    writeln!(out)?;
                }
            }
            Err(e) => {
                writeln!(
                    out,
                    "<unable to read log file {}: {}>",
                    job.log_file().display(),
                    e
                )?;
                dump.unreadable.push(LogReadFailure {
                    job: job.name().to_string(),
                    log_file: job.log_file().to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
        writeln!(out, "{}", banner)?;
        writeln!(out)?;

        dump.failed_jobs.push(job.name().to_string());
    }

    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobId, JobKind, LaunchSpec};
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn job(id: usize, group: &str, log_file: PathBuf, passed: bool) -> JobRef {
        let job = Arc::new(Job::new(
            JobId(id),
            JobKind::Build,
            group,
            None,
            LaunchSpec {
                command: "trick-CP".to_string(),
                working_dir: PathBuf::from("."),
                expected_exit: 0,
                binary: None,
            },
            log_file,
        ));
        job.finish(passed, Some(if passed { 0 } else { 1 }), Duration::ZERO);
        job
    }

    #[test]
    fn test_failed_job_log_is_bracketed() {
        let dir = tempdir().unwrap();
        let bad_log = dir.path().join("bad.log");
        let good_log = dir.path().join("good.log");
        fs::write(&bad_log, "compiling...\nerror: undefined symbol\n").unwrap();
        fs::write(&good_log, "all good\n").unwrap();

        let jobs = vec![
            job(0, "SIM_good", good_log, true),
            job(1, "SIM_bad", bad_log, false),
        ];
        let mut out = Vec::new();
        let dump = dump_failing_logs(&mut out, &jobs).unwrap();
        let text = String::from_utf8(out).unwrap();

        let banner = "*".repeat(BANNER_WIDTH);
        let expected = format!(
            "Failing job:  Build SIM_bad\n{b}\ncompiling...\nerror: undefined symbol\n{b}\n\n",
            b = banner
        );
        assert_eq!(text, expected);
        assert!(!text.contains("SIM_good"));
        assert!(!text.contains("all good"));
        assert_eq!(dump.failed_jobs, vec!["Build SIM_bad"]);
        assert!(dump.unreadable.is_empty());
    }

    #[test]
    fn test_unreadable_log_is_surfaced() {
        let dir = tempdir().unwrap();
        let jobs = vec![job(0, "SIM_bad", dir.path().join("missing.log"), false)];

        let mut out = Vec::new();
        let dump = dump_failing_logs(&mut out, &jobs).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Failing job:  Build SIM_bad\n"));
        assert!(text.contains("<unable to read log file"));
        assert_eq!(dump.failed_jobs, vec!["Build SIM_bad"]);
        assert_eq!(dump.unreadable.len(), 1);
        assert_eq!(dump.unreadable[0].job, "Build SIM_bad");
    }

    #[test]
    fn test_log_without_trailing_newline() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("bad.log");
        fs::write(&log, "no newline").unwrap();
        let jobs = vec![job(0, "SIM_bad", log, false)];

        let mut out = Vec::new();
        dump_failing_logs(&mut out, &jobs).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("no newline\n{}", "*".repeat(BANNER_WIDTH))));
    }

    #[test]
    fn test_no_failures_prints_nothing() {
        let dir = tempdir().unwrap();
        let jobs = vec![job(0, "SIM_good", dir.path().join("good.log"), true)];
        let mut out = Vec::new();
        let dump = dump_failing_logs(&mut out, &jobs).unwrap();
        assert!(out.is_empty());
        assert!(dump.failed_jobs.is_empty());
    }
}
