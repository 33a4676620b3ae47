//! Rolling-window aggregates over an hourly series
//!
//! Every window is anchored on the target hour and counts back a fixed
//! number of hours (the target hour included). Calendar days play no part.

use crate::freeze_thaw::FreezeThawScan;
use crate::models::HourlySeries;
use serde::{Deserialize, Serialize};

/// Hourly snowfall at or above this counts as "it snowed that hour"
pub const SNOWFALL_TRACE_CM: f64 = 0.1;

/// Thresholds for hours-above counts since the freeze event
pub const SINCE_FREEZE_THRESHOLDS_C: [f64; 4] = [0.0, 1.0, 2.0, 3.0];

/// Thresholds for hours-above counts in the current warm spell
pub const WARM_SPELL_THRESHOLDS_C: [f64; 3] = [0.0, 1.0, 2.0];

/// Everything the feature engineer and the heuristic scorer read from the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAggregates {
    pub target_index: usize,
    /// Hours of data available up to and including the target hour
    pub history_hours: usize,
    pub current_temp_c: f64,
    pub max_temp_24h_c: f64,
    pub min_temp_24h_c: f64,
    pub max_temp_48h_c: f64,
    pub min_temp_48h_c: f64,
    pub snowfall_24h_cm: f64,
    pub snowfall_48h_cm: f64,
    pub snowfall_72h_cm: f64,
    /// Snowfall after the freeze event, or over the lookback window when there is none
    pub snow_since_freeze_cm: f64,
    pub hours_since_last_snowfall: Option<usize>,
    pub wind_current_kmh: Option<f64>,
    pub wind_avg_24h_kmh: Option<f64>,
    pub wind_max_24h_kmh: Option<f64>,
    pub snow_depth_cm: Option<f64>,
    /// Hours at/above 0/1/2/3°C from the start of the freeze event's warm spell
    pub hours_above_since_freeze: [usize; 4],
    pub warm_spell_hours_above: [usize; 3],
    pub freeze_hours_ago: Option<usize>,
    pub freeze_peak_temp_c: Option<f64>,
}

impl WeatherAggregates {
    /// Compute aggregates for `target_index` (clamped to the series length).
    pub fn compute(series: &HourlySeries, target_index: usize, scan: &FreezeThawScan) -> Self {
        let temps = series.temperature_c();
        let snow = series.snowfall_cm();
        let target = target_index.min(series.len().saturating_sub(1));

        let lookback_start = window_start(target, scan.lookback_hours);
        // Snow counts after the spell; warm hours count the spell itself too
        let (since_freeze_start, warm_count_start) = match scan.event {
            Some(event) => (
                event.end_index + 1,
                (event.end_index + 1).saturating_sub(event.duration_hours),
            ),
            None => (lookback_start, lookback_start),
        };

        let mut hours_above_since_freeze = [0usize; 4];
        for (slot, threshold) in hours_above_since_freeze
            .iter_mut()
            .zip(SINCE_FREEZE_THRESHOLDS_C)
        {
            *slot = temps[warm_count_start..=target]
                .iter()
                .filter(|&&t| t >= threshold)
                .count();
        }

        let mut warm_spell_hours_above = [0usize; 3];
        for (slot, threshold) in warm_spell_hours_above.iter_mut().zip(WARM_SPELL_THRESHOLDS_C) {
            *slot = temps[..=target]
                .iter()
                .rev()
                .take_while(|&&t| t >= threshold)
                .count();
        }

        let wind_24h: Vec<f64> = series.wind_speed_kmh()[window_start(target, 24)..=target]
            .iter()
            .flatten()
            .copied()
            .collect();

        Self {
            target_index: target,
            history_hours: target + 1,
            current_temp_c: temps[target],
            max_temp_24h_c: window_max(temps, target, 24),
            min_temp_24h_c: window_min(temps, target, 24),
            max_temp_48h_c: window_max(temps, target, 48),
            min_temp_48h_c: window_min(temps, target, 48),
            snowfall_24h_cm: window_sum(snow, target, 24),
            snowfall_48h_cm: window_sum(snow, target, 48),
            snowfall_72h_cm: window_sum(snow, target, 72),
            snow_since_freeze_cm: snow[since_freeze_start..=target].iter().sum(),
            hours_since_last_snowfall: snow[lookback_start..=target]
                .iter()
                .rev()
                .position(|&s| s >= SNOWFALL_TRACE_CM),
            wind_current_kmh: series.wind_speed_kmh()[target],
            wind_avg_24h_kmh: (!wind_24h.is_empty())
                .then(|| wind_24h.iter().sum::<f64>() / wind_24h.len() as f64),
            wind_max_24h_kmh: wind_24h.iter().copied().reduce(f64::max),
            snow_depth_cm: series.snow_depth_m()[target].map(|m| m * 100.0),
            hours_above_since_freeze,
            warm_spell_hours_above,
            freeze_hours_ago: scan.event.map(|e| e.hours_ago),
            freeze_peak_temp_c: scan.event.map(|e| e.peak_temp_c),
        }
    }

    pub fn has_wind(&self) -> bool {
        self.wind_current_kmh.is_some() || self.wind_avg_24h_kmh.is_some()
    }
}

/// First index of a `hours`-long window ending at `target`
fn window_start(target: usize, hours: usize) -> usize {
    (target + 1).saturating_sub(hours)
}

fn window_sum(values: &[f64], target: usize, hours: usize) -> f64 {
    values[window_start(target, hours)..=target].iter().sum()
}

fn window_max(values: &[f64], target: usize, hours: usize) -> f64 {
    values[window_start(target, hours)..=target]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

fn window_min(values: &[f64], target: usize, hours: usize) -> f64 {
    values[window_start(target, hours)..=target]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freeze_thaw::{detect, FreezeThawConfig};
    use chrono::{TimeZone, Utc};

    fn series(temps: Vec<f64>, snow: Vec<f64>) -> HourlySeries {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        HourlySeries::from_hourly(start, temps, snow).unwrap()
    }

    #[test]
    fn test_rolling_windows_are_hour_based() {
        let mut snow = vec![0.0; 100];
        snow[99] = 1.0; // inside 24h
        snow[75] = 2.0; // 24 hours back: outside 24h, inside 48h
        snow[40] = 4.0; // inside 72h only
        let s = series(vec![-5.0; 100], snow);
        let scan = detect(s.temperature_c(), 99, &FreezeThawConfig::default());
        let agg = WeatherAggregates::compute(&s, 99, &scan);

        assert_eq!(agg.snowfall_24h_cm, 1.0);
        assert_eq!(agg.snowfall_48h_cm, 3.0);
        assert_eq!(agg.snowfall_72h_cm, 7.0);
        assert_eq!(agg.hours_since_last_snowfall, Some(0));
    }

    #[test]
    fn test_snow_since_freeze_counts_after_event_only() {
        let mut temps = vec![-6.0; 100];
        for t in &mut temps[80..84] {
            *t = 3.5;
        }
        let mut snow = vec![0.0; 100];
        snow[70] = 10.0; // before the thaw
        snow[90] = 1.5;
        snow[95] = 0.5;
        let s = series(temps, snow);
        let scan = detect(s.temperature_c(), 99, &FreezeThawConfig::default());
        let agg = WeatherAggregates::compute(&s, 99, &scan);

        assert_eq!(agg.freeze_hours_ago, Some(16));
        assert!((agg.snow_since_freeze_cm - 2.0).abs() < 1e-9);
        assert_eq!(agg.hours_since_last_snowfall, Some(4));
        // The four thaw hours themselves are counted
        assert_eq!(agg.hours_above_since_freeze, [4, 4, 4, 4]);
        assert_eq!(agg.freeze_peak_temp_c, Some(3.5));
    }

    #[test]
    fn test_warm_spell_counts_stop_at_first_cold_hour() {
        let mut temps = vec![-2.0; 60];
        temps[57] = 0.5;
        temps[58] = 1.5;
        temps[59] = 2.5;
        let s = series(temps, vec![0.0; 60]);
        let scan = detect(s.temperature_c(), 59, &FreezeThawConfig::default());
        let agg = WeatherAggregates::compute(&s, 59, &scan);
        assert_eq!(agg.warm_spell_hours_above, [3, 2, 1]);
        assert_eq!(agg.max_temp_24h_c, 2.5);
        assert_eq!(agg.min_temp_24h_c, -2.0);
    }

    #[test]
    fn test_missing_wind_and_depth_stay_unknown() {
        let s = series(vec![-3.0; 50], vec![0.0; 50]);
        let scan = detect(s.temperature_c(), 49, &FreezeThawConfig::default());
        let agg = WeatherAggregates::compute(&s, 49, &scan);
        assert!(!agg.has_wind());
        assert!(agg.wind_max_24h_kmh.is_none());
        assert!(agg.snow_depth_cm.is_none());
        assert!(agg.hours_since_last_snowfall.is_none());
    }

    #[test]
    fn test_partial_wind_data_is_averaged_over_known_hours() {
        let mut wind = vec![None; 50];
        wind[48] = Some(10.0);
        wind[49] = Some(30.0);
        let s = series(vec![-3.0; 50], vec![0.0; 50])
            .with_wind_speed(wind)
            .unwrap()
            .with_snow_depth(vec![Some(1.2); 50])
            .unwrap();
        let scan = detect(s.temperature_c(), 49, &FreezeThawConfig::default());
        let agg = WeatherAggregates::compute(&s, 49, &scan);
        assert_eq!(agg.wind_avg_24h_kmh, Some(20.0));
        assert_eq!(agg.wind_max_24h_kmh, Some(30.0));
        assert_eq!(agg.snow_depth_cm, Some(120.0));
    }
}
