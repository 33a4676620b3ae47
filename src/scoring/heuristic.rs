//! Rule-based fallback scorer
//!
//! Works in [0, 1] space and rescales `× 5 + 1` at the end so the output
//! lines up with the neural scorer. Three sub-scores are blended into a
//! base score, then a cascade of caps can only pull it down. The
//! confirmed-base floor runs last and wins over every cap.

use crate::features::WeatherAggregates;
use serde::{Deserialize, Serialize};

/// Optimal temperature band for snow quality
const OPTIMAL_MIN_C: f64 = -10.0;
const OPTIMAL_MAX_C: f64 = -2.0;

/// Warm-hours penalty per hour in the current warm spell, and its ceiling
const WARM_HOUR_PENALTY: f64 = 0.02;
const MAX_WARM_PENALTY: f64 = 0.5;

/// E-folding time of the observation freshness decay
const DECAY_HOURS: f64 = 36.0;
const MIN_DECAY: f64 = 0.2;

/// Effective snowfall that saturates the snowfall sub-score
const SNOWFALL_SATURATION_CM: f64 = 20.0;

/// Snow-since-freeze scale of the fresh-powder amount term
const POWDER_SCALE_CM: f64 = 12.0;
/// A week without snowfall at full ice-forming speed takes freshness to the floor
const FRESHNESS_HORIZON_HOURS: f64 = 168.0;

/// Snow-depth reliability checks
const CONTRADICTING_SNOWFALL_CM: f64 = 2.0;
const MELT_OUT_TEMP_C: f64 = 20.0;

/// Hard temperature caps
const HOT_TEMP_C: f64 = 20.0;
const HOT_CAP: f64 = 0.02;
const WARM_TEMP_C: f64 = 15.0;
const WARM_UNKNOWN_DEPTH_CAP: f64 = 0.15;

/// Snow-depth bands (cm) and their caps
const THIN_BASE_CM: f64 = 20.0;
const THIN_BASE_CAP: f64 = 0.08;
const MODEST_BASE_CM: f64 = 50.0;
const MODEST_BASE_CAP: f64 = 0.6;
const DEEP_BASE_CM: f64 = 100.0;
const DEEP_BASE_BOOST: f64 = 0.05;

/// Confirmed-base floor ("poor")
const CONFIRMED_BASE_FLOOR: f64 = 0.20;

/// No-fresh-snow cap blends from `COLD` at -5°C to `MILD` at +3°C
const NO_FRESH_CAP_COLD: f64 = 0.25;
const NO_FRESH_CAP_MILD: f64 = 0.45;
const NO_FRESH_BLEND_FROM_C: f64 = -5.0;
const NO_FRESH_BLEND_SPAN_C: f64 = 8.0;
/// A freeze this recent gets the tightest no-fresh cap
const RECENT_FREEZE_HOURS: f64 = 72.0;
/// Snow-since-freeze at which the thin-snow cap lifts entirely
const THIN_SNOW_LIFT_CM: f64 = 10.0;

/// Blend weights of the base score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeuristicWeights {
    pub temperature: f64,
    pub time_decay: f64,
    pub snowfall: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            time_decay: 0.3,
            snowfall: 0.3,
        }
    }
}

/// What the heuristic scorer reads for one assessment
#[derive(Debug, Clone, Copy)]
pub struct HeuristicInput<'a> {
    pub aggregates: &'a WeatherAggregates,
    /// Known accumulation since the last freeze; selects the fresh-powder sub-score
    pub snow_since_freeze_cm: Option<f64>,
    /// Age of the newest observation in hours
    pub observation_age_hours: f64,
}

/// Sub-scores and the result of the cascade, all in [0, 1] except `score`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeuristicBreakdown {
    pub temperature: f64,
    pub time_decay: f64,
    /// Snowfall sub-score, or fresh-powder sub-score when snow-since-freeze is known
    pub snow: f64,
    pub used_fresh_powder: bool,
    pub reliable_snow_depth: bool,
    pub base: f64,
    pub capped: f64,
    /// Final score in [1.0, 6.0]
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    weights: HeuristicWeights,
}

impl HeuristicScorer {
    pub fn new(weights: HeuristicWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, input: &HeuristicInput<'_>) -> HeuristicBreakdown {
        let agg = input.aggregates;

        let temperature = temperature_subscore(agg.current_temp_c, agg.warm_spell_hours_above[0]);
        let time_decay = time_decay_subscore(input.observation_age_hours);
        let (snow, used_fresh_powder) = match input.snow_since_freeze_cm {
            Some(ssf) => (
                fresh_powder_subscore(ssf, agg.current_temp_c, agg.hours_since_last_snowfall),
                true,
            ),
            None => (snowfall_subscore(agg), false),
        };

        let base = self.weights.temperature * temperature
            + self.weights.time_decay * time_decay
            + self.weights.snowfall * snow;

        let reliable_snow_depth = snow_depth_reliable(agg);
        let capped = apply_caps(base.clamp(0.0, 1.0), agg, input.snow_since_freeze_cm, reliable_snow_depth);

        HeuristicBreakdown {
            temperature,
            time_decay,
            snow,
            used_fresh_powder,
            reliable_snow_depth,
            base,
            capped,
            score: (capped * 5.0 + 1.0).clamp(1.0, 6.0),
        }
    }
}

/// 1.0 inside the optimal band, degrading outside it, minus a warm-hours penalty
pub fn temperature_subscore(temp_c: f64, warm_hours: usize) -> f64 {
    let band = if temp_c < OPTIMAL_MIN_C {
        // Very cold snow is fine but squeaky and slow
        (1.0 - (OPTIMAL_MIN_C - temp_c) * 0.02).max(0.5)
    } else if temp_c <= OPTIMAL_MAX_C {
        1.0
    } else if temp_c <= 0.0 {
        1.0 - (temp_c - OPTIMAL_MAX_C) * 0.1
    } else {
        (0.8 - 0.12 * temp_c).max(0.0)
    };

    let penalty = (warm_hours as f64 * WARM_HOUR_PENALTY).min(MAX_WARM_PENALTY);
    (band - penalty).clamp(0.0, 1.0)
}

/// Freshness of the observation itself
pub fn time_decay_subscore(age_hours: f64) -> f64 {
    (-age_hours.max(0.0) / DECAY_HOURS).exp().max(MIN_DECAY)
}

/// Weighted recent snowfall: last 24h in full, the day before at 0.6, the one before at 0.3
pub fn snowfall_subscore(agg: &WeatherAggregates) -> f64 {
    let day1 = agg.snowfall_24h_cm;
    let day2 = (agg.snowfall_48h_cm - agg.snowfall_24h_cm).max(0.0);
    let day3 = (agg.snowfall_72h_cm - agg.snowfall_48h_cm).max(0.0);
    let effective = day1 + 0.6 * day2 + 0.3 * day3;
    (effective / SNOWFALL_SATURATION_CM).clamp(0.0, 1.0)
}

/// How slowly the surface crusts at `temp_c`: 1.0 when cold, lower when mild
pub fn ice_forming_speed(temp_c: f64) -> f64 {
    if temp_c <= -5.0 {
        1.0
    } else if temp_c <= 0.0 {
        1.0 - 0.4 * (temp_c + 5.0) / 5.0
    } else {
        (0.6 - 0.08 * temp_c).max(0.2)
    }
}

/// Amount since freeze, scaled by crusting speed and time since it last snowed
pub fn fresh_powder_subscore(
    snow_since_freeze_cm: f64,
    temp_c: f64,
    hours_since_snowfall: Option<usize>,
) -> f64 {
    let amount = 1.0 - (-snow_since_freeze_cm.max(0.0) / POWDER_SCALE_CM).exp();
    let speed = ice_forming_speed(temp_c);
    let freshness = match hours_since_snowfall {
        Some(h) => (1.0 - h as f64 / (FRESHNESS_HORIZON_HOURS * speed)).clamp(0.2, 1.0),
        None => 0.6,
    };
    (amount * (0.4 + 0.6 * freshness) * (0.7 + 0.3 * speed)).clamp(0.0, 1.0)
}

/// A depth reading is trusted unless the rest of the series contradicts it
pub fn snow_depth_reliable(agg: &WeatherAggregates) -> bool {
    match agg.snow_depth_cm {
        None => false,
        Some(depth) if depth <= 0.0 => agg.snowfall_72h_cm < CONTRADICTING_SNOWFALL_CM,
        Some(_) => agg.max_temp_48h_c < MELT_OUT_TEMP_C,
    }
}

/// Linear blend of `from..to` at `t` in [0, 1]
fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Ceiling for a surface with little or nothing on top of a recent freeze.
/// Continuous in temperature, freeze age and snow-since-freeze.
pub fn freeze_recency_cap(temp_c: f64, freeze_hours_ago: usize, snow_since_freeze_cm: f64) -> f64 {
    let no_fresh = lerp(
        NO_FRESH_CAP_COLD,
        NO_FRESH_CAP_MILD,
        (temp_c - NO_FRESH_BLEND_FROM_C) / NO_FRESH_BLEND_SPAN_C,
    );
    let recency = (freeze_hours_ago as f64 / RECENT_FREEZE_HOURS).clamp(0.0, 1.0);
    let no_fresh = no_fresh * (0.85 + 0.15 * recency);

    let cover = (snow_since_freeze_cm.max(0.0) / THIN_SNOW_LIFT_CM).min(1.0);
    no_fresh + (1.0 - no_fresh) * cover
}

fn apply_caps(
    base: f64,
    agg: &WeatherAggregates,
    snow_since_freeze_cm: Option<f64>,
    reliable_depth: bool,
) -> f64 {
    let temp = agg.current_temp_c;
    let depth = agg.snow_depth_cm.filter(|_| reliable_depth);
    let mut score = base;

    if temp >= HOT_TEMP_C {
        score = score.min(HOT_CAP);
    } else if temp >= WARM_TEMP_C && depth.is_none() {
        score = score.min(WARM_UNKNOWN_DEPTH_CAP);
    }

    if let Some(depth) = depth {
        if depth < THIN_BASE_CM {
            score = score.min(THIN_BASE_CAP);
        } else if depth < MODEST_BASE_CM {
            score = score.min(MODEST_BASE_CAP);
        } else if depth >= DEEP_BASE_CM {
            score = (score + DEEP_BASE_BOOST).min(1.0);
        }
    }

    if let Some(hours_ago) = agg.freeze_hours_ago {
        let ssf = snow_since_freeze_cm.unwrap_or(agg.snow_since_freeze_cm);
        score = score.min(freeze_recency_cap(temp, hours_ago, ssf));
    }

    if depth.is_some_and(|d| d >= MODEST_BASE_CM) {
        score = score.max(CONFIRMED_BASE_FLOOR);
    }

    score.clamp(0.0, 1.0)
}
