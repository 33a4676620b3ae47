//! Assess command - score one stored series

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use snowcast::assess::{Assessment, Assessor};
use snowcast::config::SnowcastConfig;
use snowcast::models::{ElevationLevel, HourlySeries, Quality, SnowSummary, SummaryKey};
use snowcast::scoring::NeuralScorer;
use snowcast::summary::SummaryStore;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct AssessArgs {
    pub series: PathBuf,
    pub location: String,
    pub elevation: ElevationLevel,
    pub elevation_m: Option<f64>,
    pub now: Option<String>,
    pub model: Option<PathBuf>,
    pub dry_run: bool,
    pub json: bool,
}

pub fn run(config: &SnowcastConfig, args: AssessArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.series)
        .with_context(|| format!("Failed to read series {}", args.series.display()))?;
    let series: HourlySeries = serde_json::from_str(&content)
        .with_context(|| format!("Invalid series in {}", args.series.display()))?;

    let elevation_m = match (args.elevation_m, config.location(&args.location)) {
        (Some(m), _) => m,
        (None, Some(loc)) => loc.elevation_m(args.elevation),
        (None, None) => bail!(
            "Location '{}' is not configured; pass --elevation-m",
            args.location
        ),
    };

    let now = match args.now.as_deref() {
        Some(raw) => parse_now(raw)?,
        None => Utc::now(),
    };

    let model_path = args.model.as_deref().or(config.model.path.as_deref());
    let assessor = Assessor::new(NeuralScorer::from_path(model_path), config.detector_config());

    let key = SummaryKey::new(args.location, args.elevation);
    // An unusable store still yields an assessment; only the write is lost
    let store = if args.dry_run {
        None
    } else {
        match super::open_store(config) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("{:#}; assessing without stored state", e);
                None
            }
        }
    };

    let (persisted, writable) = match &store {
        Some(store) => load_summary(store, &key, now),
        None => (SnowSummary::new(now), false),
    };

    let assessment = assessor.assess(&key, &series, &persisted, elevation_m, now);

    if let Some(store) = store.as_ref().filter(|_| writable) {
        if assessment.persist {
            match store.put(&key, &assessment.summary) {
                Ok(()) => info!("Updated summary for {}", key),
                Err(e) => warn!("Summary write failed for {}: {}", key, e),
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&assessment.report(&key))?);
    } else {
        print_text(&key, &assessment);
    }
    Ok(())
}

/// Stored summary and whether it may be written back. A failed read falls
/// back to a fresh summary that must not overwrite the stored one.
fn load_summary(store: &dyn SummaryStore, key: &SummaryKey, now: DateTime<Utc>) -> (SnowSummary, bool) {
    match store.get_or_create(key, now) {
        Ok(summary) => (summary, true),
        Err(e) => {
            warn!("Summary read failed for {}, using defaults: {}", key, e);
            (SnowSummary::new(now), false)
        }
    }
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw).with_context(|| format!("--now '{}' is not RFC 3339", raw))?;
    Ok(parsed.with_timezone(&Utc))
}

fn print_text(key: &SummaryKey, assessment: &Assessment) {
    let result = &assessment.result;
    let quality = match result.quality {
        Quality::Excellent | Quality::Good => style(result.quality.to_string()).green().bold(),
        Quality::Fair => style(result.quality.to_string()).yellow().bold(),
        Quality::Unknown => style(result.quality.to_string()).dim(),
        _ => style(result.quality.to_string()).red().bold(),
    };

    println!("\n{} {}\n", style("Snow conditions").bold(), style(key).cyan());
    println!("  Quality:    {} ({:.2})", quality, result.raw_score);
    println!("              {}", style(result.quality.description()).dim());
    println!("  Confidence: {}", result.confidence);
    println!("  Fresh snow: {:.1} cm since last freeze-thaw", result.fresh_snow_estimate_cm);
    println!("  Scorer:     {:?}", result.source);
    println!();
    println!(
        "  Season total {:.1} cm, summary {}",
        assessment.summary.total_season_snowfall_cm,
        style(assessment.transition).dim()
    );
    println!();
}
