//! Assessment orchestrator
//!
//! Composes detection, aggregation, the summary transition, scorer
//! selection, adjustment and categorization into one call. Pure: the
//! caller owns fetching the series and persisting the returned summary.

use crate::features::{self, WeatherAggregates};
use crate::freeze_thaw::{self, FreezeThawConfig};
use crate::models::{
    Confidence, ElevationLevel, HourlySeries, Quality, ScoreResult, ScoreSource, SnowSummary, SummaryKey,
};
use crate::scoring::heuristic::snow_depth_reliable;
use crate::scoring::{
    adjust, categorize, derive_confidence, AdjustInput, ConfidenceSignals, HeuristicInput, HeuristicScorer,
    NeuralScorer, ScorerOutcome, INSUFFICIENT_HISTORY_SCORE,
};
use crate::summary::{self, CycleObservation, Transition};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Result of one assessment
#[derive(Debug, Clone)]
pub struct Assessment {
    pub result: ScoreResult,
    /// Summary to persist for the next cycle
    pub summary: SnowSummary,
    pub transition: Transition,
    /// False when the summary must not be written (no-op or insufficient history)
    pub persist: bool,
}

/// Serializable view of an assessment for CLI output
#[derive(Debug, Serialize)]
pub struct AssessmentReport<'a> {
    pub location_id: &'a str,
    pub elevation: ElevationLevel,
    pub result: &'a ScoreResult,
    pub summary: &'a SnowSummary,
    pub transition: Transition,
}

impl Assessment {
    pub fn report<'a>(&'a self, key: &'a SummaryKey) -> AssessmentReport<'a> {
        AssessmentReport {
            location_id: &key.location_id,
            elevation: key.elevation,
            result: &self.result,
            summary: &self.summary,
            transition: self.transition,
        }
    }
}

/// Holds the scorers and detector configuration shared across assessments
#[derive(Debug, Clone, Default)]
pub struct Assessor {
    neural: NeuralScorer,
    heuristic: HeuristicScorer,
    detector: FreezeThawConfig,
}

impl Assessor {
    pub fn new(neural: NeuralScorer, detector: FreezeThawConfig) -> Self {
        Self {
            neural,
            heuristic: HeuristicScorer::default(),
            detector,
        }
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicScorer) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn neural(&self) -> &NeuralScorer {
        &self.neural
    }

    pub fn detector(&self) -> &FreezeThawConfig {
        &self.detector
    }

    /// Score `series` for `key` at `now`, given the previously persisted summary.
    ///
    /// Never fails: insufficient history yields the neutral `Unknown` result
    /// and leaves the summary untouched.
    pub fn assess(
        &self,
        key: &SummaryKey,
        series: &HourlySeries,
        persisted: &SnowSummary,
        elevation_m: f64,
        now: DateTime<Utc>,
    ) -> Assessment {
        let Some(target) = series.target_index(now) else {
            debug!("{}: series starts after {}, no assessment", key, now);
            return insufficient(persisted);
        };

        let scan = freeze_thaw::detect(series.temperature_c(), target, &self.detector);
        if !scan.sufficient_history {
            debug!("{}: {} hours of history, need {}", key, target, self.detector.min_history_hours);
            return insufficient(persisted);
        }

        let agg = WeatherAggregates::compute(series, target, &scan);

        let cycle = CycleObservation {
            event_time: scan.event.map(|e| series.times()[e.end_index]),
            fresh_accumulation_cm: agg.snow_since_freeze_cm,
            snowfall_24h_cm: agg.snowfall_24h_cm,
        };
        let update = summary::advance(persisted, &cycle, now, self.detector.lookback_hours);
        debug!("{}: summary transition {}", key, update.transition);

        // Best available accumulation: the series' own sum, or the summary's
        // when it carries more than the series can see
        let snow_since_freeze = agg.snow_since_freeze_cm.max(update.summary.snowfall_since_freeze_cm);

        let vector = features::extract(&agg, &scan, snow_since_freeze, elevation_m);
        let (raw, source) = match self.neural.score(&vector) {
            ScorerOutcome::Scored(score) => (score, ScoreSource::Neural),
            outcome => {
                debug!("{}: neural scorer {:?}, using heuristic", key, outcome);
                let observation_age_hours = (now - series.times()[target]).num_minutes().max(0) as f64 / 60.0;
                let breakdown = self.heuristic.score(&HeuristicInput {
                    aggregates: &agg,
                    snow_since_freeze_cm: Some(snow_since_freeze),
                    observation_age_hours,
                });
                (breakdown.score, ScoreSource::Heuristic)
            }
        };

        let adjusted = adjust(
            raw,
            &AdjustInput::from_aggregates(&agg, snow_since_freeze, self.detector.lookback_hours),
        );

        let confidence = derive_confidence(&ConfidenceSignals {
            history_hours: agg.history_hours,
            lookback_hours: self.detector.lookback_hours,
            sufficient_history: true,
            reliable_snow_depth: snow_depth_reliable(&agg),
            has_wind: agg.has_wind(),
            neural: source == ScoreSource::Neural,
        });

        let result = ScoreResult {
            raw_score: adjusted,
            quality: categorize(adjusted),
            confidence,
            fresh_snow_estimate_cm: snow_since_freeze,
            source,
        };
        debug!(
            "{}: {:.2} ({}) via {:?}, raw {:.2}",
            key, result.raw_score, result.quality, source, raw
        );

        Assessment {
            persist: update.transition.should_persist(),
            transition: update.transition,
            summary: update.summary,
            result,
        }
    }
}

fn insufficient(persisted: &SnowSummary) -> Assessment {
    Assessment {
        result: ScoreResult {
            raw_score: INSUFFICIENT_HISTORY_SCORE,
            quality: Quality::Unknown,
            confidence: Confidence::VeryLow,
            fresh_snow_estimate_cm: persisted.snowfall_since_freeze_cm,
            source: ScoreSource::Fallback,
        },
        summary: persisted.clone(),
        transition: Transition::NoOp,
        persist: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::neural::tests::artifact_json;
    use crate::scoring::EnsembleModel;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn key() -> SummaryKey {
        SummaryKey::new("test", ElevationLevel::Top)
    }

    fn series(hours: usize, temp: f64) -> HourlySeries {
        HourlySeries::from_hourly(start(), vec![temp; hours], vec![0.0; hours]).unwrap()
    }

    fn last_hour(series: &HourlySeries) -> DateTime<Utc> {
        *series.times().last().unwrap()
    }

    #[test]
    fn test_short_series_is_unknown() {
        let s = series(30, -5.0);
        let prev = SnowSummary::new(start());
        let a = Assessor::default().assess(&key(), &s, &prev, 2_000.0, last_hour(&s));
        assert_eq!(a.result.quality, Quality::Unknown);
        assert_eq!(a.result.raw_score, 3.5);
        assert_eq!(a.result.confidence, Confidence::VeryLow);
        assert!(!a.persist);
        assert_eq!(a.summary, prev);
    }

    #[test]
    fn test_now_before_series_is_unknown() {
        let s = series(100, -5.0);
        let a = Assessor::default().assess(
            &key(),
            &s,
            &SnowSummary::new(start()),
            2_000.0,
            start() - Duration::hours(1),
        );
        assert_eq!(a.result.source, ScoreSource::Fallback);
    }

    #[test]
    fn test_forecast_hours_are_ignored() {
        let mut temps = vec![-6.0; 120];
        for t in &mut temps[100..] {
            *t = 25.0;
        }
        let s = HourlySeries::from_hourly(start(), temps, vec![0.0; 120]).unwrap();
        let now = start() + Duration::hours(99);
        let a = Assessor::default().assess(&key(), &s, &SnowSummary::new(start()), 2_000.0, now);
        assert!(a.result.raw_score > 1.5);
    }

    #[test]
    fn test_heuristic_used_without_model() {
        let s = series(100, -5.0);
        let a = Assessor::default().assess(&key(), &s, &SnowSummary::new(start()), 2_000.0, last_hour(&s));
        assert_eq!(a.result.source, ScoreSource::Heuristic);
        assert!((1.0..=6.0).contains(&a.result.raw_score));
    }

    #[test]
    fn test_neural_used_when_model_fits() {
        let model = EnsembleModel::from_json(&artifact_json(features::FEATURE_COUNT, 8, 2)).unwrap();
        let assessor = Assessor::new(NeuralScorer::new(Arc::new(model)), FreezeThawConfig::default());
        let s = series(100, -5.0);
        let a = assessor.assess(&key(), &s, &SnowSummary::new(start()), 2_000.0, last_hour(&s));
        assert_eq!(a.result.source, ScoreSource::Neural);
        assert!((1.0..=6.0).contains(&a.result.raw_score));
    }

    #[test]
    fn test_mismatched_model_falls_back() {
        let model = EnsembleModel::from_json(&artifact_json(10, 4, 1)).unwrap();
        let assessor = Assessor::new(NeuralScorer::new(Arc::new(model)), FreezeThawConfig::default());
        let s = series(100, -5.0);
        let a = assessor.assess(&key(), &s, &SnowSummary::new(start()), 2_000.0, last_hour(&s));
        assert_eq!(a.result.source, ScoreSource::Heuristic);
    }
}
