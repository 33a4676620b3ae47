//! Summary and reset-season commands

use super::{levels, open_store};
use anyhow::{Context, Result};
use chrono::Utc;
use console::style;
use snowcast::config::SnowcastConfig;
use snowcast::models::{ElevationLevel, SnowSummary, SummaryKey};
use snowcast::summary::SummaryStore;
use std::collections::BTreeMap;

pub fn show(
    config: &SnowcastConfig,
    location: Option<&str>,
    elevation: Option<ElevationLevel>,
    json: bool,
) -> Result<()> {
    let store = open_store(config)?;

    let rows: Vec<(String, SnowSummary)> = match location {
        Some(id) => {
            let mut rows = Vec::new();
            for level in levels(elevation) {
                let key = SummaryKey::new(id, level);
                if let Some(summary) = store.get(&key).with_context(|| format!("Failed to read {}", key))? {
                    rows.push((key.encode(), summary));
                }
            }
            rows
        }
        None => {
            let suffix = elevation.map(|e| format!(":{}", e));
            store
                .list()
                .context("Failed to list summaries")?
                .into_iter()
                .filter(|(key, _)| suffix.as_deref().map_or(true, |s| key.ends_with(s)))
                .collect()
        }
    };

    if json {
        let map: BTreeMap<String, SnowSummary> = rows.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("\n  {} No summaries stored yet\n", style("[--]").dim());
        return Ok(());
    }

    println!("\n{}\n", style("Snow summaries").bold());
    for (key, summary) in &rows {
        print_summary(key, summary);
    }
    Ok(())
}

fn print_summary(key: &str, summary: &SnowSummary) {
    let last_freeze = summary
        .last_freeze_date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "none recorded".to_string());

    println!("  {}", style(key).cyan());
    println!("      since freeze {:>6.1} cm   last freeze {}", summary.snowfall_since_freeze_cm, last_freeze);
    println!(
        "      season       {:>6.1} cm   since {}",
        summary.total_season_snowfall_cm,
        summary.season_start_date.format("%Y-%m-%d")
    );
    println!(
        "      last 24h     {:>6.1} cm   {}",
        summary.last_snowfall_24h_cm,
        style(format!("updated {}", summary.last_updated.format("%Y-%m-%d %H:%M"))).dim()
    );
}

pub fn reset(config: &SnowcastConfig, location: &str, levels: Vec<ElevationLevel>) -> Result<()> {
    let store = open_store(config)?;
    let now = Utc::now();

    for level in levels {
        let key = SummaryKey::new(location, level);
        store
            .reset_season(&key, now)
            .with_context(|| format!("Failed to reset {}", key))?;
        println!("  {} Season reset for {}", style("[OK]").green(), style(&key).cyan());
    }
    Ok(())
}
