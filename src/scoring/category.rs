//! Score to quality category, plus the confidence tag
//!
//! Cutoffs are fixed. A model artifact carries its own copy of them, which
//! is validated on load but never overrides these.

use crate::models::{Confidence, Quality};
use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of each quality band on the 1.0-6.0 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityCutoffs {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
    pub bad: f64,
    /// Bottom of the scale; everything below `bad` is horrible
    pub horrible: f64,
}

impl Default for QualityCutoffs {
    fn default() -> Self {
        Self {
            excellent: 5.5,
            good: 4.5,
            fair: 3.5,
            poor: 2.5,
            bad: 1.5,
            horrible: 1.0,
        }
    }
}

impl QualityCutoffs {
    fn as_array(&self) -> [f64; 6] {
        [
            self.excellent,
            self.good,
            self.fair,
            self.poor,
            self.bad,
            self.horrible,
        ]
    }

    /// Finite and non-increasing from excellent down to horrible
    pub fn is_valid(&self) -> bool {
        let values = self.as_array();
        values.iter().all(|v| v.is_finite()) && values.windows(2).all(|w| w[0] >= w[1])
    }

    /// Map a score onto a quality band. Total over all finite inputs.
    pub fn categorize(&self, score: f64) -> Quality {
        if score.is_nan() {
            return Quality::Unknown;
        }
        if score >= self.excellent {
            Quality::Excellent
        } else if score >= self.good {
            Quality::Good
        } else if score >= self.fair {
            Quality::Fair
        } else if score >= self.poor {
            Quality::Poor
        } else if score >= self.bad {
            Quality::Bad
        } else {
            Quality::Horrible
        }
    }
}

/// Quality for `score` under the fixed cutoffs
pub fn categorize(score: f64) -> Quality {
    QualityCutoffs::default().categorize(score)
}

/// History needed for the partial history point
const PARTIAL_HISTORY_HOURS: usize = 72;

/// Inputs to the confidence tag
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceSignals {
    pub history_hours: usize,
    pub lookback_hours: usize,
    pub sufficient_history: bool,
    pub reliable_snow_depth: bool,
    pub has_wind: bool,
    pub neural: bool,
}

/// Reliability tag from data completeness and scorer source
pub fn derive_confidence(signals: &ConfidenceSignals) -> Confidence {
    if !signals.sufficient_history {
        return Confidence::VeryLow;
    }

    let mut points = 0;
    if signals.history_hours >= signals.lookback_hours {
        points += 2;
    } else if signals.history_hours >= PARTIAL_HISTORY_HOURS {
        points += 1;
    }
    if signals.reliable_snow_depth {
        points += 1;
    }
    if signals.has_wind {
        points += 1;
    }
    if signals.neural {
        points += 1;
    }

    match points {
        p if p >= 5 => Confidence::VeryHigh,
        4 => Confidence::High,
        3 => Confidence::Medium,
        2 => Confidence::Low,
        _ => Confidence::VeryLow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(categorize(6.0), Quality::Excellent);
        assert_eq!(categorize(5.5), Quality::Excellent);
        assert_eq!(categorize(5.49), Quality::Good);
        assert_eq!(categorize(4.5), Quality::Good);
        assert_eq!(categorize(3.5), Quality::Fair);
        assert_eq!(categorize(2.5), Quality::Poor);
        assert_eq!(categorize(1.5), Quality::Bad);
        assert_eq!(categorize(1.49), Quality::Horrible);
        assert_eq!(categorize(1.0), Quality::Horrible);
    }

    #[test]
    fn test_monotonic_over_full_range() {
        let mut prev = categorize(1.0).rank();
        for step in 0..=5000 {
            let score = 1.0 + step as f64 * 0.001;
            let rank = categorize(score).rank();
            assert!(rank >= prev, "rank dropped at {score}");
            assert_ne!(categorize(score), Quality::Unknown);
            prev = rank;
        }
    }

    #[test]
    fn test_cutoff_validation() {
        assert!(QualityCutoffs::default().is_valid());
        let swapped = QualityCutoffs {
            good: 5.8,
            ..QualityCutoffs::default()
        };
        assert!(!swapped.is_valid());
        let nan = QualityCutoffs {
            fair: f64::NAN,
            ..QualityCutoffs::default()
        };
        assert!(!nan.is_valid());
    }

    fn signals() -> ConfidenceSignals {
        ConfidenceSignals {
            history_hours: 400,
            lookback_hours: 336,
            sufficient_history: true,
            reliable_snow_depth: true,
            has_wind: true,
            neural: true,
        }
    }

    #[test]
    fn test_confidence_points() {
        assert_eq!(derive_confidence(&signals()), Confidence::VeryHigh);

        let heuristic = ConfidenceSignals {
            neural: false,
            ..signals()
        };
        assert_eq!(derive_confidence(&heuristic), Confidence::High);

        let short = ConfidenceSignals {
            history_hours: 80,
            has_wind: false,
            ..heuristic
        };
        assert_eq!(derive_confidence(&short), Confidence::Low);

        let bare = ConfidenceSignals {
            history_hours: 50,
            reliable_snow_depth: false,
            ..short
        };
        assert_eq!(derive_confidence(&bare), Confidence::VeryLow);
    }

    #[test]
    fn test_insufficient_history_is_always_very_low() {
        let s = ConfidenceSignals {
            sufficient_history: false,
            ..signals()
        };
        assert_eq!(derive_confidence(&s), Confidence::VeryLow);
    }
}
