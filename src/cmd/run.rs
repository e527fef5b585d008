//! `simops <PROJECT_ROOT>`: load the campaign file and run every phase.

use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tracing::{info, warn};

use super::super::Cli;

/// Run one campaign and return the process exit code.
///
/// `Err` means the campaign never started: the project root, the config file
/// or a dependency declaration is unusable.
pub async fn run_campaign(cli: &Cli) -> Result<i32> {
    use simops::campaign::{Campaign, CampaignOptions};
    use simops::catalog::SimCatalog;
    use simops::config::{CampaignFile, CampaignSettings, DEFAULT_CONFIG_FILE, Overrides};
    use simops::engine::ProcessEngine;
    use simops::errors::CampaignError;
    use simops::summary::CampaignSummary;
    use simops::ui::icons::{CHECK, CROSS};

    let project_root = cli.project_root.canonicalize().with_context(|| {
        format!(
            "Project root {} does not exist",
            cli.project_root.display()
        )
    })?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| project_root.join(DEFAULT_CONFIG_FILE));

    let file = CampaignFile::load(&config_path)?;
    let overrides = Overrides {
        log_dir: cli.log_dir.clone(),
        max_concurrent: cli.max_concurrent,
        quiet: cli.quiet || std::env::var_os("CI").is_some(),
        dump_analysis_logs: cli.dump_analysis_logs,
    };
    let settings = CampaignSettings::resolve(&project_root, &file, &overrides);

    std::fs::create_dir_all(&settings.log_dir).map_err(|source| CampaignError::LogDirFailed {
        path: settings.log_dir.clone(),
        source,
    })?;
    let _guard = simops::logging::init(&settings.log_dir, cli.verbose)?;
    info!(
        project_root = %project_root.display(),
        config = %config_path.display(),
        log_dir = %settings.log_dir.display(),
        "Loaded campaign file"
    );

    let declarations = file.declarations()?;
    let catalog = Arc::new(SimCatalog::load(&file, &settings));
    let engine = ProcessEngine::new(Arc::clone(&catalog), settings.quiet);
    let campaign = Campaign::new(
        catalog.as_ref(),
        &engine,
        declarations,
        CampaignOptions {
            max_concurrent: settings.max_concurrent,
            dump_analysis_logs: settings.dump_analysis_logs,
        },
    );

    let outcome = campaign.run().await?;

    let summary =
        CampaignSummary::from_outcome(&outcome).with_comparisons(engine.comparison_results());
    match summary.write(&settings.log_dir) {
        Ok(path) => info!(path = %path.display(), "Wrote campaign summary"),
        Err(e) => warn!(error = %e, "Could not write campaign summary"),
    }

    if outcome.success() {
        println!("{} {}", CHECK, style("All phases passed").green().bold());
    } else {
        println!(
            "{} {} {}",
            CROSS,
            style("Campaign failed:").red().bold(),
            outcome.outcomes.failure_sources().join(", ")
        );
    }

    Ok(outcome.exit_code())
}
