//! Snow quality scoring
//!
//! Neural ensemble first, heuristic fallback second. Both produce a score
//! on the same 1.0-6.0 scale, which then goes through the adjusters and the
//! category mapper.

pub mod adjust;
pub mod category;
pub mod heuristic;
pub mod neural;

pub use adjust::{adjust, AdjustInput};
pub use category::{categorize, derive_confidence, ConfidenceSignals, QualityCutoffs};
pub use heuristic::{HeuristicBreakdown, HeuristicInput, HeuristicScorer, HeuristicWeights};
pub use neural::{EnsembleModel, ModelError, ModelHandle, NeuralScorer, ScorerOutcome};

/// Neutral score reported when there is not enough history to judge
pub const INSUFFICIENT_HISTORY_SCORE: f64 = 3.5;
