//! CLI command definitions and handlers

mod assess;
mod batch;
mod model;
mod summary;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snowcast::config::{SnowcastConfig, MAX_WORKERS, MIN_WORKERS};
use snowcast::models::ElevationLevel;
use snowcast::summary::RedbSummaryStore;
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n < MIN_WORKERS {
        Err("workers must be at least 1".to_string())
    } else if n > MAX_WORKERS {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

fn parse_elevation(s: &str) -> Result<ElevationLevel, String> {
    s.parse()
}

/// Snowcast - snow condition scoring
#[derive(Parser, Debug)]
#[command(name = "snowcast")]
#[command(
    version,
    about = "Score ski conditions from hourly weather: freeze-thaw detection, neural scoring with heuristic fallback",
    after_help = "\
Examples:
  snowcast batch                                   Fetch and score every configured location
  snowcast batch --dry-run --workers 4             Score without touching the summary store
  snowcast assess --series hourly.json --location whistler --elevation top --elevation-m 2284
  snowcast summary --location whistler             Show persisted accumulation state
  snowcast model --path models/snow-quality.json   Validate a model artifact"
)]
pub struct Cli {
    /// Config file (default: ./snowcast.toml if present)
    #[arg(long, global = true, env = "SNOWCAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a stored hourly series for one location and elevation
    Assess {
        /// Hourly series JSON (times, temperature_c, snowfall_cm, optional wind_speed_kmh, snow_depth_m)
        #[arg(long)]
        series: PathBuf,

        /// Location id (summary key)
        #[arg(long)]
        location: String,

        /// Elevation band: base, mid, top
        #[arg(long, value_parser = parse_elevation)]
        elevation: ElevationLevel,

        /// Elevation in meters (default: from the configured location)
        #[arg(long)]
        elevation_m: Option<f64>,

        /// Assessment time, RFC 3339 (default: now)
        #[arg(long)]
        now: Option<String>,

        /// Model artifact (overrides [model] path)
        #[arg(long, env = "SNOWCAST_MODEL")]
        model: Option<PathBuf>,

        /// Do not write the updated summary
        #[arg(long)]
        dry_run: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Fetch and score every configured location at all three elevations
    Batch {
        /// Number of parallel workers (1-64, default: [batch] workers)
        #[arg(long, value_parser = parse_workers)]
        workers: Option<usize>,

        /// Use an in-memory summary store
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show persisted snow summaries
    Summary {
        /// Location id (default: all)
        #[arg(long)]
        location: Option<String>,

        /// Elevation band (default: all three)
        #[arg(long, value_parser = parse_elevation)]
        elevation: Option<ElevationLevel>,

        #[arg(long)]
        json: bool,
    },

    /// Start a new season: zero accumulators for a location
    ResetSeason {
        #[arg(long)]
        location: String,

        /// Elevation band (default: all three)
        #[arg(long, value_parser = parse_elevation)]
        elevation: Option<ElevationLevel>,
    },

    /// Validate a model artifact and print its shape
    Model {
        #[arg(long)]
        path: PathBuf,
    },
}

fn open_store(config: &SnowcastConfig) -> Result<RedbSummaryStore> {
    let path = config.store_path();
    RedbSummaryStore::open(&path).with_context(|| format!("Failed to open summary store {}", path.display()))
}

/// Elevation levels selected by an optional flag
fn levels(elevation: Option<ElevationLevel>) -> Vec<ElevationLevel> {
    match elevation {
        Some(level) => vec![level],
        None => ElevationLevel::ALL.to_vec(),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = SnowcastConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Assess {
            series,
            location,
            elevation,
            elevation_m,
            now,
            model,
            dry_run,
            json,
        } => assess::run(
            &config,
            assess::AssessArgs {
                series,
                location,
                elevation,
                elevation_m,
                now,
                model,
                dry_run,
                json,
            },
        ),

        Commands::Batch {
            workers,
            dry_run,
            json,
        } => batch::run(&config, workers, dry_run, json),

        Commands::Summary {
            location,
            elevation,
            json,
        } => summary::show(&config, location.as_deref(), elevation, json),

        Commands::ResetSeason { location, elevation } => summary::reset(&config, &location, levels(elevation)),

        Commands::Model { path } => model::run(&path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers_bounds() {
        assert_eq!(parse_workers("1"), Ok(1));
        assert_eq!(parse_workers("64"), Ok(64));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_cli_parses_assess() {
        let cli = Cli::try_parse_from([
            "snowcast",
            "assess",
            "--series",
            "s.json",
            "--location",
            "alta",
            "--elevation",
            "top",
            "--elevation-m",
            "3200",
        ])
        .unwrap();
        match cli.command {
            Commands::Assess {
                elevation,
                elevation_m,
                ..
            } => {
                assert_eq!(elevation, ElevationLevel::Top);
                assert_eq!(elevation_m, Some(3200.0));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_levels_default_to_all() {
        assert_eq!(levels(None).len(), 3);
        assert_eq!(levels(Some(ElevationLevel::Mid)), vec![ElevationLevel::Mid]);
    }
}
