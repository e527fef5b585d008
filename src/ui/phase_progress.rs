//! Progress display for one executing phase.
//!
//! In the default mode a progress bar tracks finished jobs and the most
//! recently started job. In quiet mode (CI) only the phase header and one
//! line per failed job are printed, so logs stay readable without a TTY.

use crate::job::{Job, JobStatus};
use crate::ui::icons::{CHECK, CROSS, PHASE, RUNNING};
use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Colored label for a job status.
pub fn status_label(status: JobStatus) -> StyledObject<&'static str> {
    match status {
        JobStatus::Passed => style("PASSED").green().bold(),
        JobStatus::Failed => style("FAILED").red().bold(),
        JobStatus::Running => style("RUNNING").yellow(),
        JobStatus::Pending => style("NOT RUN").dim(),
    }
}

/// Tracks progress of the jobs of a single phase.
pub struct PhaseProgress {
    bar: Option<ProgressBar>,
    passed: AtomicUsize,
    failed: AtomicUsize,
}

impl PhaseProgress {
    /// Print the phase header and, unless `quiet`, start a progress bar.
    pub fn start(header: &str, total: usize, quiet: bool) -> Self {
        println!("{}{}", PHASE, style(header).bold().cyan());

        let bar = (!quiet).then(|| {
            let bar_style = ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {elapsed_precise} {msg}")
                .expect("progress bar template is a valid static string")
                .progress_chars("█▓▒░");
            let bar = ProgressBar::new(total as u64);
            bar.set_style(bar_style);
            bar.set_prefix("Jobs");
            bar.enable_steady_tick(Duration::from_millis(200));
            bar
        });

        Self {
            bar,
            passed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Note that a job has been dispatched.
    pub fn job_started(&self, job: &Job) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{}{}", RUNNING, style(job.name()).dim()));
        }
    }

    /// Record a finished job.
    pub fn job_finished(&self, job: &Job) {
        let failed = job.status() == JobStatus::Failed;
        if failed {
            self.failed.fetch_add(1, Ordering::SeqCst);
            self.print_line(format!(
                "  {}{} {}",
                CROSS,
                job.name(),
                style(format!("(log: {})", job.log_file().display())).dim()
            ));
        } else {
            self.passed.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// Clear the bar and print the phase tally.
    pub fn finish(&self) {
        let passed = self.passed.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        let icon = if failed == 0 { &CHECK } else { &CROSS };
        println!(
            "  {}{} passed, {} failed",
            icon,
            style(passed).green(),
            if failed == 0 {
                style(failed).dim()
            } else {
                style(failed).red().bold()
            }
        );
    }

    fn print_line(&self, msg: String) {
        match &self.bar {
            // println() is a no-op on a hidden bar; suspend() always prints.
            Some(bar) => bar.suspend(|| println!("{}", msg)),
            None => println!("{}", msg),
        }
    }
}
