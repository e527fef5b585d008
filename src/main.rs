use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "simops")]
#[command(
    version,
    about = "Build, run, compare and analyze every sim of a project in ordered phases"
)]
pub struct Cli {
    /// Project root containing the sims and the campaign file
    pub project_root: PathBuf,

    /// Campaign file (defaults to <PROJECT_ROOT>/test_sims.yml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for job logs and the campaign summary
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Maximum number of jobs running at once within a phase
    #[arg(short = 'j', long, allow_negative_numbers = true)]
    pub max_concurrent: Option<i64>,

    /// Suppress progress bars (also enabled when CI is set)
    #[arg(short, long)]
    pub quiet: bool,

    /// Also dump logs of failed analysis jobs
    #[arg(long)]
    pub dump_analysis_logs: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let code = cmd::run_campaign(&cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
