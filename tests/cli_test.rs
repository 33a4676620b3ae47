//! CLI contract tests
//!
//! Run the built binary in an isolated temp directory so no local
//! snowcast.toml or user data dir is touched.

use chrono::{Duration, TimeZone, Utc};
use std::path::Path;
use std::process::{Command, Output};

fn snowcast_bin() -> String {
    env!("CARGO_BIN_EXE_snowcast").to_string()
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(snowcast_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("SNOWCAST_CONFIG")
        .env_remove("SNOWCAST_MODEL")
        .output()
        .unwrap()
}

/// 72 cold hours with 20cm over the last day
fn write_series(dir: &Path) -> String {
    let start = Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap();
    let times: Vec<String> = (0..72).map(|h| (start + Duration::hours(h)).to_rfc3339()).collect();
    let snow: Vec<f64> = (0..72).map(|h| if h >= 48 { 20.0 / 24.0 } else { 0.0 }).collect();
    let body = serde_json::json!({
        "times": times,
        "temperature_c": vec![-10.0; 72],
        "snowfall_cm": snow,
    });
    let path = dir.join("series.json");
    std::fs::write(&path, body.to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

fn write_config(dir: &Path) -> String {
    let store = dir.join("summaries.redb");
    let config = format!(
        "[store]\npath = \"{}\"\n\n[[locations]]\nid = \"alta\"\nlatitude = 40.58\nlongitude = -111.64\nbase_elevation_m = 2600\nmid_elevation_m = 2900\ntop_elevation_m = 3200\n",
        store.display()
    );
    let path = dir.join("snowcast.toml");
    std::fs::write(&path, config).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_assess_json_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let series = write_series(dir.path());

    let output = run(
        dir.path(),
        &[
            "assess",
            "--series",
            &series,
            "--location",
            "alta",
            "--elevation",
            "top",
            "--elevation-m",
            "3200",
            "--now",
            "2025-01-22T23:00:00Z",
            "--dry-run",
            "--json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["location_id"], "alta");
    assert_eq!(report["elevation"], "top");
    assert_eq!(report["result"]["quality"], "excellent");
    assert_eq!(report["result"]["source"], "heuristic");
    assert!(!dir.path().join("summaries.redb").exists());
}

#[test]
fn test_assess_persists_and_summary_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let series = write_series(dir.path());
    let config = write_config(dir.path());

    let output = run(
        dir.path(),
        &[
            "--config",
            &config,
            "assess",
            "--series",
            &series,
            "--location",
            "alta",
            "--elevation",
            "mid",
            "--now",
            "2025-01-22T23:00:00Z",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let output = run(dir.path(), &["--config", &config, "summary", "--json"]);
    assert!(output.status.success());
    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let mid = &summaries["alta:mid"];
    assert!(mid["snowfall_since_freeze_cm"].as_f64().unwrap() > 19.9);

    let output = run(dir.path(), &["--config", &config, "reset-season", "--location", "alta", "--elevation", "mid"]);
    assert!(output.status.success());

    let output = run(dir.path(), &["--config", &config, "summary", "--location", "alta", "--json"]);
    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summaries["alta:mid"]["total_season_snowfall_cm"], 0.0);
}

#[test]
fn test_assess_survives_unusable_store() {
    let dir = tempfile::tempdir().unwrap();
    let series = write_series(dir.path());
    // A directory where the database file should be
    let store_dir = dir.path().join("store-dir");
    std::fs::create_dir(&store_dir).unwrap();
    let config = dir.path().join("broken-store.toml");
    std::fs::write(&config, format!("[store]\npath = \"{}\"\n", store_dir.display())).unwrap();

    let output = run(
        dir.path(),
        &[
            "--config",
            &config.to_string_lossy(),
            "assess",
            "--series",
            &series,
            "--location",
            "alta",
            "--elevation",
            "top",
            "--elevation-m",
            "3200",
            "--now",
            "2025-01-22T23:00:00Z",
            "--json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["result"]["quality"], "excellent");
    assert!(String::from_utf8_lossy(&output.stderr).contains("WARN"));
    assert!(store_dir.is_dir());
}

#[test]
fn test_assess_unknown_location_needs_elevation() {
    let dir = tempfile::tempdir().unwrap();
    let series = write_series(dir.path());
    let output = run(
        dir.path(),
        &["assess", "--series", &series, "--location", "nowhere", "--elevation", "base", "--dry-run"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--elevation-m"));
}

#[test]
fn test_model_command_rejects_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["model", "--path", "absent.json"]);
    assert!(!output.status.success());
}

#[test]
fn test_batch_without_locations_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["batch", "--dry-run"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No locations configured"));
}

#[test]
fn test_workers_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["batch", "--workers", "0"]);
    assert!(!output.status.success());
}
