//! Feature engineering for the neural scorer
//!
//! Turns [`WeatherAggregates`] into the fixed-order vector the trained model
//! expects. The order below is part of the model's input contract: a model
//! trained against it breaks silently if entries move.

pub mod aggregates;

pub use aggregates::WeatherAggregates;

use crate::freeze_thaw::FreezeThawScan;

/// Number of entries in a feature vector
pub const FEATURE_COUNT: usize = 28;

/// Feature names in contract order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "current_temp_c",
    "max_temp_24h_c",
    "min_temp_24h_c",
    "max_temp_48h_c",
    "min_temp_48h_c",
    "snowfall_24h_cm",
    "snowfall_48h_cm",
    "snowfall_72h_cm",
    "snow_since_freeze_cm",
    "elevation_km",
    "freeze_thaw_days_ago",
    "thaw_intensity",
    "hours_above_0c_since_freeze",
    "hours_above_1c_since_freeze",
    "hours_above_2c_since_freeze",
    "hours_above_3c_since_freeze",
    "warm_spell_hours_above_0c",
    "warm_spell_hours_above_1c",
    "warm_spell_hours_above_2c",
    "wind_speed_current_kmh",
    "wind_speed_avg_24h_kmh",
    "wind_speed_max_24h_kmh",
    "snow_depth_cm",
    "snowfall_x_cold",
    "snowfall_x_wind",
    "warm_temp_x_warm_hours",
    "is_summer",
    "currently_warming",
];

/// Freeze-thaw age is capped here (matches the detector's lookback horizon)
const MAX_FREEZE_DAYS: f64 = 14.0;

/// Floor for the thaw-intensity denominator
const MIN_THAW_DAYS: f64 = 0.1;

/// Summer flag: current temperature above this ...
const SUMMER_TEMP_C: f64 = 10.0;
/// ... and more than this many hours above 0°C since the last freeze
const SUMMER_WARM_HOURS: usize = 48;

/// Feature vector for one assessment
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value by contract name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    /// True when every entry is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// Build the feature vector for an assessment.
///
/// `snow_since_freeze_cm` is passed separately because the orchestrator may
/// substitute the reconciled value from the persisted summary.
pub fn extract(
    agg: &WeatherAggregates,
    scan: &FreezeThawScan,
    snow_since_freeze_cm: f64,
    elevation_m: f64,
) -> FeatureVector {
    let days_ago = scan.days_ago_or_horizon().min(MAX_FREEZE_DAYS);
    let thaw_intensity = match agg.freeze_peak_temp_c {
        Some(peak) => peak / days_ago.max(MIN_THAW_DAYS),
        None => 0.0,
    };

    // Unknown wind and depth default to 0
    let wind_current = agg.wind_current_kmh.unwrap_or(0.0);
    let wind_avg = agg.wind_avg_24h_kmh.unwrap_or(0.0);
    let wind_max = agg.wind_max_24h_kmh.unwrap_or(0.0);
    let snow_depth = agg.snow_depth_cm.unwrap_or(0.0);

    let coldness = (-agg.current_temp_c).max(0.0);
    let warm_temp = agg.max_temp_24h_c.max(0.0);
    let warm_hours = agg.warm_spell_hours_above[0] as f64;

    let is_summer = agg.current_temp_c > SUMMER_TEMP_C
        && agg.hours_above_since_freeze[0] > SUMMER_WARM_HOURS;

    let mut values = Vec::with_capacity(FEATURE_COUNT);
    values.extend([
        agg.current_temp_c,
        agg.max_temp_24h_c,
        agg.min_temp_24h_c,
        agg.max_temp_48h_c,
        agg.min_temp_48h_c,
        agg.snowfall_24h_cm,
        agg.snowfall_48h_cm,
        agg.snowfall_72h_cm,
        snow_since_freeze_cm,
        elevation_m / 1000.0,
        days_ago,
        thaw_intensity,
    ]);
    values.extend(agg.hours_above_since_freeze.iter().map(|&h| h as f64));
    values.extend(agg.warm_spell_hours_above.iter().map(|&h| h as f64));
    values.extend([
        wind_current,
        wind_avg,
        wind_max,
        snow_depth,
        agg.snowfall_24h_cm * coldness,
        agg.snowfall_24h_cm * wind_avg,
        warm_temp * warm_hours,
        flag(is_summer),
        flag(scan.currently_warming),
    ]);

    debug_assert_eq!(values.len(), FEATURE_COUNT);
    FeatureVector::new(values)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
