//! Batch command - fetch and score every configured location

use anyhow::{bail, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use snowcast::assess::Assessor;
use snowcast::batch::{BatchReport, BatchRunner, BatchUnit, UnitOutcome};
use snowcast::config::SnowcastConfig;
use snowcast::scoring::NeuralScorer;
use snowcast::summary::{MemorySummaryStore, SummaryStore};
use snowcast::weather::OpenMeteoClient;
use std::sync::Arc;
use tracing::info;

fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .expect("valid template")
        .progress_chars("█▓▒░  ")
}

pub fn run(config: &SnowcastConfig, workers: Option<usize>, dry_run: bool, json: bool) -> Result<()> {
    if config.locations.is_empty() {
        bail!("No locations configured. Add [[locations]] entries to snowcast.toml");
    }

    let units = BatchUnit::expand(&config.locations);
    let workers = workers.unwrap_or(config.batch.workers);

    let store: Arc<dyn SummaryStore> = if dry_run {
        info!("Dry run: summaries are kept in memory");
        Arc::new(MemorySummaryStore::new())
    } else {
        Arc::new(super::open_store(config)?)
    };

    let source = Arc::new(OpenMeteoClient::new(
        config.fetch.base_url.clone(),
        config.fetch.past_days,
        config.fetch.forecast_days,
        config.fetch_timeout(),
        config.retry_policy(),
    ));

    let assessor = Assessor::new(
        NeuralScorer::from_path(config.model.path.as_deref()),
        config.detector_config(),
    );
    if !assessor.neural().is_available() {
        info!("No neural model loaded, scoring with the heuristic");
    }

    let mut runner = BatchRunner::new(workers, assessor, source, store)
        .context("Failed to build worker pool")?
        .with_budget(config.time_budget());

    let bar = if json {
        None
    } else {
        let bar = ProgressBar::new(units.len() as u64);
        bar.set_style(create_bar_style());
        Some(bar)
    };
    if let Some(bar) = bar.clone() {
        runner = runner.with_progress_callback(Box::new(move |unit, done, _total| {
            bar.set_position(done as u64);
            bar.set_message(format!("{}:{}", unit.location_id, unit.elevation));
        }));
    }

    let report = runner.run(&units);

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, dry_run);
    }

    if report.total() > 0 && report.assessed == 0 {
        bail!("No unit could be assessed ({} failed, {} skipped)", report.failed, report.skipped);
    }
    Ok(())
}

fn print_report(report: &BatchReport, dry_run: bool) {
    println!("\n{}\n", style("Snowcast batch").bold());

    for unit in &report.units {
        let label = format!("{}:{}", unit.location_id, unit.elevation);
        match &unit.outcome {
            UnitOutcome::Assessed {
                result, persisted, ..
            } => println!(
                "  {} {:<28} {:<10} {:.2}  {:>5.1} cm  {}",
                style("[OK]").green(),
                label,
                result.quality,
                result.raw_score,
                result.fresh_snow_estimate_cm,
                if *persisted { "" } else { "(not saved)" }
            ),
            UnitOutcome::Failed { error } => {
                println!("  {} {:<28} {}", style("[!!]").red(), label, style(error).red())
            }
            UnitOutcome::Skipped => println!("  {} {:<28} skipped", style("[--]").dim(), label),
        }
    }

    println!(
        "\n  {} assessed, {} failed, {} skipped in {:.1}s{}",
        style(report.assessed).cyan(),
        style(report.failed).cyan(),
        style(report.skipped).cyan(),
        report.duration_ms as f64 / 1000.0,
        if dry_run { " (dry run)" } else { "" }
    );
}
