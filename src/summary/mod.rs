//! Snow summary state machine
//!
//! One transition per processing cycle, chosen from this cycle's freeze
//! event and the previously persisted summary:
//!
//! ```text
//! event newer than last_freeze_date      -> NewFreezeEvent
//! last freeze inside the horizon         -> WithinHorizon   (max of fresh and persisted)
//! last freeze outside horizon / unknown  -> DeltaTracking   (24h snowfall delta)
//!                                           NoOp when the delta is zero
//! ```
//!
//! Season reset is separate and manual; see [`reset_season`].

pub mod store;

pub use store::{MemorySummaryStore, RedbSummaryStore, StoreError, SummaryStore};

use crate::models::SnowSummary;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

/// What this cycle observed
#[derive(Debug, Clone, Copy)]
pub struct CycleObservation {
    /// Timestamp of the detected freeze event's last warm hour
    pub event_time: Option<DateTime<Utc>>,
    /// Snowfall after the detected event, as computed from this cycle's series
    pub fresh_accumulation_cm: f64,
    pub snowfall_24h_cm: f64,
}

/// Transition taken by [`advance`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    NewFreezeEvent,
    WithinHorizon,
    DeltaTracking { delta_cm: f64 },
    NoOp,
}

impl Transition {
    pub fn should_persist(&self) -> bool {
        !matches!(self, Transition::NoOp)
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::NewFreezeEvent => f.write_str("new freeze event"),
            Transition::WithinHorizon => f.write_str("within horizon"),
            Transition::DeltaTracking { delta_cm } => write!(f, "delta tracking (+{:.2} cm)", delta_cm),
            Transition::NoOp => f.write_str("no-op"),
        }
    }
}

/// Next summary and how it was reached
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryUpdate {
    pub summary: SnowSummary,
    pub transition: Transition,
}

/// Compute the next summary from the previous one and this cycle's observation.
///
/// `horizon_hours` is the detector lookback; a recorded freeze older than
/// that can no longer be confirmed by the series.
pub fn advance(
    prev: &SnowSummary,
    cycle: &CycleObservation,
    now: DateTime<Utc>,
    horizon_hours: usize,
) -> SummaryUpdate {
    let fresh = cycle.fresh_accumulation_cm.max(0.0);
    let sf24 = cycle.snowfall_24h_cm.max(0.0);

    let is_new_event = match (cycle.event_time, prev.last_freeze_date) {
        (Some(event), Some(last)) => event > last,
        (Some(_), None) => true,
        (None, _) => false,
    };

    if is_new_event {
        let summary = SnowSummary {
            last_freeze_date: cycle.event_time,
            snowfall_since_freeze_cm: fresh,
            total_season_snowfall_cm: prev.total_season_snowfall_cm + sf24,
            season_start_date: prev.season_start_date,
            last_snowfall_24h_cm: sf24,
            last_updated: now,
        };
        debug!("Summary transition: new freeze event at {:?}", cycle.event_time);
        return SummaryUpdate {
            summary,
            transition: Transition::NewFreezeEvent,
        };
    }

    let horizon = Duration::hours(horizon_hours as i64);
    let within_horizon = prev
        .last_freeze_date
        .is_some_and(|last| now - last < horizon);

    if within_horizon {
        // Upstream can transiently undercount; never let accumulation shrink
        let since_freeze = fresh.max(prev.snowfall_since_freeze_cm);
        let gained = since_freeze - prev.snowfall_since_freeze_cm;
        let summary = SnowSummary {
            snowfall_since_freeze_cm: since_freeze,
            total_season_snowfall_cm: prev.total_season_snowfall_cm + gained,
            last_snowfall_24h_cm: sf24,
            last_updated: now,
            ..prev.clone()
        };
        return SummaryUpdate {
            summary,
            transition: Transition::WithinHorizon,
        };
    }

    let delta = (sf24 - prev.last_snowfall_24h_cm).max(0.0);
    if delta == 0.0 {
        return SummaryUpdate {
            summary: prev.clone(),
            transition: Transition::NoOp,
        };
    }

    let summary = SnowSummary {
        snowfall_since_freeze_cm: prev.snowfall_since_freeze_cm + delta,
        total_season_snowfall_cm: prev.total_season_snowfall_cm + delta,
        last_snowfall_24h_cm: sf24,
        last_updated: now,
        ..prev.clone()
    };
    SummaryUpdate {
        summary,
        transition: Transition::DeltaTracking { delta_cm: delta },
    }
}

/// Manual season boundary: zero the accumulators and start a new season at `now`.
/// The last freeze date is kept so the next cycle does not mistake an old
/// event for a new one.
pub fn reset_season(prev: &SnowSummary, now: DateTime<Utc>) -> SnowSummary {
    SnowSummary {
        last_freeze_date: prev.last_freeze_date,
        snowfall_since_freeze_cm: 0.0,
        total_season_snowfall_cm: 0.0,
        season_start_date: now,
        last_snowfall_24h_cm: 0.0,
        last_updated: now,
    }
}
