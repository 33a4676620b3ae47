//! Post-score adjustments on the 1.0-6.0 scale
//!
//! Aging pulls down snow that has sat untouched for days; the cold boost
//! rewards deep accumulation on an old, stable freeze. Their gates do not
//! overlap in practice. Both run in that order and re-clamp after each.

use crate::features::aggregates::SNOWFALL_TRACE_CM;
use crate::features::WeatherAggregates;

/// Aging starts once this many hours passed without snowfall
const AGING_GRACE_HOURS: usize = 48;
const AGING_PER_DAY: f64 = 0.15;
const MAX_AGING_PENALTY: f64 = 0.8;

/// Cold slows snow aging down
const VERY_COLD_C: f64 = -15.0;
const COLD_C: f64 = -8.0;

/// Cold boost gates
const BOOST_MIN_FREEZE_AGE_HOURS: usize = 120;
const BOOST_MIN_ACCUMULATION_CM: f64 = 15.0;
const MAX_COLD_BOOST: f64 = 0.6;
/// Temperature and accumulation at which each half of the boost saturates
const BOOST_FULL_COLD_C: f64 = 10.0;
const BOOST_FULL_EXTRA_CM: f64 = 35.0;

/// Signals read by the adjusters
#[derive(Debug, Clone, Copy)]
pub struct AdjustInput {
    pub current_temp_c: f64,
    pub snowfall_24h_cm: f64,
    /// `None` when it has not snowed within the lookback
    pub hours_since_last_snowfall: Option<usize>,
    /// `None` when no freeze event was found
    pub freeze_hours_ago: Option<usize>,
    pub snow_since_freeze_cm: f64,
    pub lookback_hours: usize,
}

impl AdjustInput {
    pub fn from_aggregates(agg: &WeatherAggregates, snow_since_freeze_cm: f64, lookback_hours: usize) -> Self {
        Self {
            current_temp_c: agg.current_temp_c,
            snowfall_24h_cm: agg.snowfall_24h_cm,
            hours_since_last_snowfall: agg.hours_since_last_snowfall,
            freeze_hours_ago: agg.freeze_hours_ago,
            snow_since_freeze_cm,
            lookback_hours,
        }
    }
}

fn cold_multiplier(temp_c: f64) -> f64 {
    if temp_c <= VERY_COLD_C {
        0.6
    } else if temp_c <= COLD_C {
        0.8
    } else {
        1.0
    }
}

/// Penalty for snow that has not been refreshed in more than two days.
/// No-op when it snowed recently or is snowing now.
pub fn aging_penalty(score: f64, input: &AdjustInput) -> f64 {
    let hours = input
        .hours_since_last_snowfall
        .unwrap_or(input.lookback_hours);
    if hours <= AGING_GRACE_HOURS || input.snowfall_24h_cm >= SNOWFALL_TRACE_CM {
        return score;
    }

    let days = hours as f64 / 24.0;
    let penalty = ((days - 2.0) * AGING_PER_DAY).min(MAX_AGING_PENALTY) * cold_multiplier(input.current_temp_c);
    (score - penalty).clamp(1.0, 6.0)
}

/// Boost for deep accumulation since an old freeze in cold weather
pub fn cold_boost(score: f64, input: &AdjustInput) -> f64 {
    let freeze_age = input.freeze_hours_ago.unwrap_or(input.lookback_hours);
    if freeze_age < BOOST_MIN_FREEZE_AGE_HOURS
        || input.snow_since_freeze_cm < BOOST_MIN_ACCUMULATION_CM
        || input.current_temp_c >= 0.0
    {
        return score;
    }

    let cold = (-input.current_temp_c / BOOST_FULL_COLD_C).clamp(0.0, 1.0);
    let depth = ((input.snow_since_freeze_cm - BOOST_MIN_ACCUMULATION_CM) / BOOST_FULL_EXTRA_CM).clamp(0.0, 1.0);
    let boost = MAX_COLD_BOOST * (0.5 * cold + 0.5 * depth);
    (score + boost).clamp(1.0, 6.0)
}

/// Apply both adjusters in order
pub fn adjust(score: f64, input: &AdjustInput) -> f64 {
    let score = aging_penalty(score.clamp(1.0, 6.0), input);
    cold_boost(score, input)
}
