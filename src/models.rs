//! Core data models for snowcast
//!
//! These models are shared by the detector, the scorers, the snow summary
//! state machine and the batch runner.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Elevation band of a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationLevel {
    Base,
    Mid,
    Top,
}

impl ElevationLevel {
    pub const ALL: [ElevationLevel; 3] = [ElevationLevel::Base, ElevationLevel::Mid, ElevationLevel::Top];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationLevel::Base => "base",
            ElevationLevel::Mid => "mid",
            ElevationLevel::Top => "top",
        }
    }
}

impl std::fmt::Display for ElevationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ElevationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(ElevationLevel::Base),
            "mid" => Ok(ElevationLevel::Mid),
            "top" => Ok(ElevationLevel::Top),
            other => Err(format!("'{}' is not an elevation level (base, mid, top)", other)),
        }
    }
}

/// Persistence key of a snow summary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub location_id: String,
    pub elevation: ElevationLevel,
}

impl SummaryKey {
    pub fn new(location_id: impl Into<String>, elevation: ElevationLevel) -> Self {
        Self {
            location_id: location_id.into(),
            elevation,
        }
    }

    /// Stable `"<location_id>:<level>"` encoding used by the stores
    pub fn encode(&self) -> String {
        format!("{}:{}", self.location_id, self.elevation)
    }
}

impl std::fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A ski area with its three elevation bands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub base_elevation_m: f64,
    pub mid_elevation_m: f64,
    pub top_elevation_m: f64,
}

impl Location {
    pub fn elevation_m(&self, level: ElevationLevel) -> f64 {
        match level {
            ElevationLevel::Base => self.base_elevation_m,
            ElevationLevel::Mid => self.mid_elevation_m,
            ElevationLevel::Top => self.top_elevation_m,
        }
    }
}

/// Errors raised when an hourly series is malformed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("series field '{field}' has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("series times are not strictly increasing at index {index}")]
    NonMonotonicTime { index: usize },

    #[error("series times are not one hour apart at index {index}")]
    NotHourly { index: usize },

    #[error("series field '{field}' has a non-finite value at index {index}")]
    NonFinite { field: &'static str, index: usize },

    #[error("series is empty")]
    Empty,
}

/// Wire form of an hourly series, validated into [`HourlySeries`]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawHourlySeries {
    pub times: Vec<DateTime<Utc>>,
    pub temperature_c: Vec<f64>,
    pub snowfall_cm: Vec<f64>,
    #[serde(default)]
    pub wind_speed_kmh: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub snow_depth_m: Option<Vec<Option<f64>>>,
}

/// Hour-aligned weather series. Index 0 is the earliest hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawHourlySeries")]
pub struct HourlySeries {
    times: Vec<DateTime<Utc>>,
    temperature_c: Vec<f64>,
    snowfall_cm: Vec<f64>,
    wind_speed_kmh: Vec<Option<f64>>,
    snow_depth_m: Vec<Option<f64>>,
}

impl HourlySeries {
    /// Build a series, checking that every array has the same length, that
    /// times advance by exactly one hour and that every reading is finite.
    pub fn new(
        times: Vec<DateTime<Utc>>,
        temperature_c: Vec<f64>,
        snowfall_cm: Vec<f64>,
        wind_speed_kmh: Vec<Option<f64>>,
        snow_depth_m: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        let expected = times.len();
        if expected == 0 {
            return Err(SeriesError::Empty);
        }
        for (field, actual) in [
            ("temperature_c", temperature_c.len()),
            ("snowfall_cm", snowfall_cm.len()),
            ("wind_speed_kmh", wind_speed_kmh.len()),
            ("snow_depth_m", snow_depth_m.len()),
        ] {
            if actual != expected {
                return Err(SeriesError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        if let Some(index) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SeriesError::NonMonotonicTime { index: index + 1 });
        }
        // Every window and age counts index steps as hours
        if let Some(index) = times.windows(2).position(|w| w[1] - w[0] != Duration::hours(1)) {
            return Err(SeriesError::NotHourly { index: index + 1 });
        }
        check_finite("temperature_c", temperature_c.iter().copied())?;
        check_finite("snowfall_cm", snowfall_cm.iter().copied())?;
        check_finite("wind_speed_kmh", wind_speed_kmh.iter().map(|v| v.unwrap_or(0.0)))?;
        check_finite("snow_depth_m", snow_depth_m.iter().map(|v| v.unwrap_or(0.0)))?;

        Ok(Self {
            times,
            temperature_c,
            snowfall_cm,
            wind_speed_kmh,
            snow_depth_m,
        })
    }

    /// Hourly series starting at `start` with no wind or depth data
    pub fn from_hourly(
        start: DateTime<Utc>,
        temperature_c: Vec<f64>,
        snowfall_cm: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        let len = temperature_c.len();
        let times = (0..len).map(|h| start + Duration::hours(h as i64)).collect();
        Self::new(times, temperature_c, snowfall_cm, vec![None; len], vec![None; len])
    }

    pub fn with_wind_speed(mut self, wind_speed_kmh: Vec<Option<f64>>) -> Result<Self, SeriesError> {
        if wind_speed_kmh.len() != self.len() {
            return Err(SeriesError::LengthMismatch {
                field: "wind_speed_kmh",
                expected: self.len(),
                actual: wind_speed_kmh.len(),
            });
        }
        check_finite("wind_speed_kmh", wind_speed_kmh.iter().map(|v| v.unwrap_or(0.0)))?;
        self.wind_speed_kmh = wind_speed_kmh;
        Ok(self)
    }

    pub fn with_snow_depth(mut self, snow_depth_m: Vec<Option<f64>>) -> Result<Self, SeriesError> {
        if snow_depth_m.len() != self.len() {
            return Err(SeriesError::LengthMismatch {
                field: "snow_depth_m",
                expected: self.len(),
                actual: snow_depth_m.len(),
            });
        }
        check_finite("snow_depth_m", snow_depth_m.iter().map(|v| v.unwrap_or(0.0)))?;
        self.snow_depth_m = snow_depth_m;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn temperature_c(&self) -> &[f64] {
        &self.temperature_c
    }

    pub fn snowfall_cm(&self) -> &[f64] {
        &self.snowfall_cm
    }

    pub fn wind_speed_kmh(&self) -> &[Option<f64>] {
        &self.wind_speed_kmh
    }

    pub fn snow_depth_m(&self) -> &[Option<f64>] {
        &self.snow_depth_m
    }

    /// Index of the last hour at or before `now`, or `None` if the series
    /// starts after `now`. Forecast hours past `now` are never selected.
    pub fn target_index(&self, now: DateTime<Utc>) -> Option<usize> {
        match self.times.partition_point(|t| *t <= now) {
            0 => None,
            n => Some(n - 1),
        }
    }
}

fn check_finite(field: &'static str, values: impl Iterator<Item = f64>) -> Result<(), SeriesError> {
    match values.enumerate().find(|(_, v)| !v.is_finite()) {
        Some((index, _)) => Err(SeriesError::NonFinite { field, index }),
        None => Ok(()),
    }
}

impl TryFrom<RawHourlySeries> for HourlySeries {
    type Error = SeriesError;

    fn try_from(raw: RawHourlySeries) -> Result<Self, Self::Error> {
        let len = raw.times.len();
        HourlySeries::new(
            raw.times,
            raw.temperature_c,
            raw.snowfall_cm,
            raw.wind_speed_kmh.unwrap_or_else(|| vec![None; len]),
            raw.snow_depth_m.unwrap_or_else(|| vec![None; len]),
        )
    }
}

impl From<HourlySeries> for RawHourlySeries {
    fn from(series: HourlySeries) -> Self {
        Self {
            times: series.times,
            temperature_c: series.temperature_c,
            snowfall_cm: series.snowfall_cm,
            wind_speed_kmh: Some(series.wind_speed_kmh),
            snow_depth_m: Some(series.snow_depth_m),
        }
    }
}

/// Ordinal snow quality, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
    Bad,
    Horrible,
    Unknown,
}

impl Quality {
    /// Rank for ordering: higher is better, `Unknown` ranks below everything
    pub fn rank(&self) -> u8 {
        match self {
            Quality::Excellent => 6,
            Quality::Good => 5,
            Quality::Fair => 4,
            Quality::Poor => 3,
            Quality::Bad => 2,
            Quality::Horrible => 1,
            Quality::Unknown => 0,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Quality::Excellent => "Fresh powder on a cold base",
            Quality::Good => "Soft snow with recent accumulation",
            Quality::Fair => "Packed or aging snow, still enjoyable",
            Quality::Poor => "Hard, icy or thin cover",
            Quality::Bad => "Crusted or refrozen surface, limited skiing",
            Quality::Horrible => "No skiable snow or melting out",
            Quality::Unknown => "Not enough weather history to judge",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Quality::Excellent => "excellent",
            Quality::Good => "good",
            Quality::Fair => "fair",
            Quality::Poor => "poor",
            Quality::Bad => "bad",
            Quality::Horrible => "horrible",
            Quality::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Data-reliability tag, independent of how good the snow is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Confidence::VeryLow => "very low",
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
            Confidence::VeryHigh => "very high",
        };
        f.write_str(label)
    }
}

/// Which scorer produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Neural,
    Heuristic,
    /// Insufficient history; the score is the neutral sentinel
    Fallback,
}

/// Outcome of scoring one location/elevation at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Continuous score in [1.0, 6.0]
    pub raw_score: f64,
    pub quality: Quality,
    pub confidence: Confidence,
    pub fresh_snow_estimate_cm: f64,
    pub source: ScoreSource,
}

/// Persisted accumulation state per `(location, elevation)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnowSummary {
    pub last_freeze_date: Option<DateTime<Utc>>,
    pub snowfall_since_freeze_cm: f64,
    pub total_season_snowfall_cm: f64,
    pub season_start_date: DateTime<Utc>,
    pub last_snowfall_24h_cm: f64,
    pub last_updated: DateTime<Utc>,
}

impl SnowSummary {
    /// Fresh summary with zeroed accumulators and the season starting at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_freeze_date: None,
            snowfall_since_freeze_cm: 0.0,
            total_season_snowfall_cm: 0.0,
            season_start_date: now,
            last_snowfall_24h_cm: 0.0,
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_series_rejects_length_mismatch() {
        let err = HourlySeries::from_hourly(start(), vec![0.0; 5], vec![0.0; 4]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::LengthMismatch {
                field: "snowfall_cm",
                expected: 5,
                actual: 4
            }
        );
    }

    #[test]
    fn test_series_rejects_unordered_times() {
        let t = start();
        let err = HourlySeries::new(
            vec![t, t + Duration::hours(2), t + Duration::hours(1)],
            vec![0.0; 3],
            vec![0.0; 3],
            vec![None; 3],
            vec![None; 3],
        )
        .unwrap_err();
        assert_eq!(err, SeriesError::NonMonotonicTime { index: 2 });
    }

    #[test]
    fn test_series_rejects_gaps_between_hours() {
        let t = start();
        let times: Vec<_> = (0..100).map(|i| t + Duration::hours(2 * i)).collect();
        let err = HourlySeries::new(times, vec![0.0; 100], vec![0.0; 100], vec![None; 100], vec![None; 100])
            .unwrap_err();
        assert_eq!(err, SeriesError::NotHourly { index: 1 });

        let mut times: Vec<_> = (0..5).map(|i| t + Duration::hours(i)).collect();
        times[4] = t + Duration::minutes(210);
        let err = HourlySeries::new(times, vec![0.0; 5], vec![0.0; 5], vec![None; 5], vec![None; 5]).unwrap_err();
        assert_eq!(err, SeriesError::NotHourly { index: 4 });
    }

    #[test]
    fn test_series_rejects_non_finite_readings() {
        let mut temps = vec![-4.0; 6];
        temps[3] = f64::NAN;
        let err = HourlySeries::from_hourly(start(), temps, vec![0.0; 6]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::NonFinite {
                field: "temperature_c",
                index: 3
            }
        );

        let mut snow = vec![0.0; 6];
        snow[5] = f64::INFINITY;
        assert!(HourlySeries::from_hourly(start(), vec![-4.0; 6], snow).is_err());

        let series = HourlySeries::from_hourly(start(), vec![-4.0; 6], vec![0.0; 6]).unwrap();
        let mut depth = vec![None; 6];
        depth[0] = Some(f64::NAN);
        assert!(matches!(
            series.with_snow_depth(depth),
            Err(SeriesError::NonFinite { field: "snow_depth_m", index: 0 })
        ));
    }

    #[test]
    fn test_target_index_ignores_forecast_hours() {
        let series = HourlySeries::from_hourly(start(), vec![0.0; 10], vec![0.0; 10]).unwrap();
        assert_eq!(series.target_index(start() + Duration::minutes(330)), Some(5));
        assert_eq!(series.target_index(start() + Duration::hours(40)), Some(9));
        assert_eq!(series.target_index(start() - Duration::hours(1)), None);
    }

    #[test]
    fn test_series_json_defaults_missing_optional_arrays() {
        let json = r#"{
            "times": ["2025-01-10T00:00:00Z", "2025-01-10T01:00:00Z"],
            "temperature_c": [-3.0, -4.0],
            "snowfall_cm": [0.0, 1.2]
        }"#;
        let series: HourlySeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.wind_speed_kmh(), &[None, None]);
    }

    #[test]
    fn test_summary_key_encoding() {
        let key = SummaryKey::new("whistler", ElevationLevel::Top);
        assert_eq!(key.encode(), "whistler:top");
        assert_eq!("MID".parse::<ElevationLevel>(), Ok(ElevationLevel::Mid));
    }

    #[test]
    fn test_quality_rank_orders_best_first() {
        assert!(Quality::Excellent.rank() > Quality::Good.rank());
        assert!(Quality::Horrible.rank() > Quality::Unknown.rank());
    }
}
