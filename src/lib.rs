//! Snowcast - snow condition scoring
//!
//! Turns hourly weather into a ski snow-quality rating per location and
//! elevation band. A freeze-thaw detector marks when the surface last
//! refroze; snowfall after that event is the fresh layer. A neural ensemble
//! scores the engineered features, with a rule-based heuristic as fallback,
//! and a persisted summary carries accumulation across runs.

pub mod assess;
pub mod batch;
pub mod config;
pub mod features;
pub mod freeze_thaw;
pub mod models;
pub mod scoring;
pub mod summary;
pub mod weather;

pub use assess::{Assessment, Assessor};
pub use batch::{BatchReport, BatchRunner, BatchUnit, UnitOutcome};
pub use config::SnowcastConfig;
pub use models::{Confidence, ElevationLevel, HourlySeries, Location, Quality, ScoreResult, SnowSummary, SummaryKey};
