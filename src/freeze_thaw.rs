//! Freeze-thaw (ice formation) detection
//!
//! Scans an hourly temperature array backwards from the target hour for the
//! most recent completed warm spell. A warm spell crusts the existing snow
//! when it refreezes, so everything that fell before it no longer counts as
//! fresh.
//!
//! Rules are tried most-aggressive-first at every candidate hour:
//!
//! ```text
//! +3.0°C for 3h  |  +2.0°C for 6h  |  +1.0°C for 8h  |  0.0°C for 4h
//! ```
//!
//! The current hour is never a candidate: it may still be warming up.

use serde::{Deserialize, Serialize};

/// Default lookback horizon (14 days)
pub const DEFAULT_LOOKBACK_HOURS: usize = 336;

/// Minimum hours of history before any detection is attempted
pub const DEFAULT_MIN_HISTORY_HOURS: usize = 48;

/// Current-hour temperature at which the surface counts as warming
pub const WARMING_THRESHOLD_C: f64 = 1.0;

/// A threshold/duration pair that qualifies as an ice-forming warm spell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarmSpellRule {
    pub threshold_c: f64,
    pub min_hours: usize,
}

impl WarmSpellRule {
    pub const fn new(threshold_c: f64, min_hours: usize) -> Self {
        Self {
            threshold_c,
            min_hours,
        }
    }
}

/// Default rules, most aggressive first
pub const DEFAULT_RULES: [WarmSpellRule; 4] = [
    WarmSpellRule::new(3.0, 3),
    WarmSpellRule::new(2.0, 6),
    WarmSpellRule::new(1.0, 8),
    WarmSpellRule::new(0.0, 4),
];

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeThawConfig {
    pub lookback_hours: usize,
    pub min_history_hours: usize,
    pub rules: Vec<WarmSpellRule>,
}

impl Default for FreezeThawConfig {
    fn default() -> Self {
        Self {
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            min_history_hours: DEFAULT_MIN_HISTORY_HOURS,
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

/// The most recent qualifying warm spell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreezeEvent {
    /// Last hour of the warm spell; always `< target_index`
    pub end_index: usize,
    pub hours_ago: usize,
    pub threshold_c: f64,
    /// Consecutive hours at/above the threshold, counted back from `end_index`
    pub duration_hours: usize,
    /// Warmest hour inside the spell
    pub peak_temp_c: f64,
}

/// Detector output for one target hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreezeThawScan {
    pub event: Option<FreezeEvent>,
    pub currently_warming: bool,
    /// False when the series held less than the minimum history
    pub sufficient_history: bool,
    pub lookback_hours: usize,
}

impl FreezeThawScan {
    /// Hours since the event, or the lookback horizon when there is none
    pub fn hours_ago_or_horizon(&self) -> usize {
        self.event
            .map(|e| e.hours_ago)
            .unwrap_or(self.lookback_hours)
    }

    pub fn days_ago_or_horizon(&self) -> f64 {
        self.hours_ago_or_horizon() as f64 / 24.0
    }
}

/// Scan `temperatures` for the most recent warm spell ending before `target_index`.
///
/// `target_index` past the end of the array is clamped to the last hour.
pub fn detect(temperatures: &[f64], target_index: usize, config: &FreezeThawConfig) -> FreezeThawScan {
    let lookback_hours = config.lookback_hours;

    if temperatures.is_empty() {
        return FreezeThawScan {
            event: None,
            currently_warming: false,
            sufficient_history: false,
            lookback_hours,
        };
    }

    let target = target_index.min(temperatures.len() - 1);
    let currently_warming = temperatures[target] >= WARMING_THRESHOLD_C;

    // History available before the target hour
    if target < config.min_history_hours {
        return FreezeThawScan {
            event: None,
            currently_warming,
            sufficient_history: false,
            lookback_hours,
        };
    }

    let oldest = target.saturating_sub(lookback_hours);
    let event = (oldest..target)
        .rev()
        .find_map(|hour| match_rules(temperatures, hour, oldest, target, &config.rules));

    FreezeThawScan {
        event,
        currently_warming,
        sufficient_history: true,
        lookback_hours,
    }
}

/// First rule (in priority order) satisfied by a spell ending at `hour`
fn match_rules(
    temperatures: &[f64],
    hour: usize,
    oldest: usize,
    target: usize,
    rules: &[WarmSpellRule],
) -> Option<FreezeEvent> {
    rules.iter().find_map(|rule| {
        if temperatures[hour] < rule.threshold_c {
            return None;
        }

        let mut duration = 0;
        let mut peak = f64::NEG_INFINITY;
        for &temp in temperatures[oldest..=hour].iter().rev() {
            if temp < rule.threshold_c {
                break;
            }
            duration += 1;
            peak = peak.max(temp);
        }

        (duration >= rule.min_hours).then_some(FreezeEvent {
            end_index: hour,
            hours_ago: target - hour,
            threshold_c: rule.threshold_c,
            duration_hours: duration,
            peak_temp_c: peak,
        })
    })
}
