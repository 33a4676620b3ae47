//! Ensemble MLP scorer
//!
//! Each member is a 2-layer MLP:
//! Input → normalize → Linear(hidden) → ReLU → Linear(1) → sigmoid × 5 + 1
//!
//! Ensemble score is the arithmetic mean across members. Weights come from a
//! JSON artifact that is loaded once and never mutated afterwards.

use super::category::QualityCutoffs;
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Pre-activation clamp so `exp` never overflows
const LOGIT_CLAMP: f64 = 500.0;

/// Errors raised while loading a model artifact
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model artifact not found at {0}")]
    NotFound(String),

    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("malformed model artifact: {0}")]
    Malformed(String),
}

/// One trained member of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSet {
    /// First layer weights [input_size x hidden_size]
    #[serde(rename = "W1")]
    pub w1: Vec<Vec<f64>>,
    /// First layer bias [hidden_size]
    pub b1: Vec<f64>,
    /// Second layer weights [hidden_size x 1]
    #[serde(rename = "W2")]
    pub w2: OutputWeights,
    /// Second layer bias [1]
    pub b2: OutputBias,
}

/// `W2` may be exported as a column matrix or a flat vector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputWeights {
    Column(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

impl OutputWeights {
    fn to_flat(&self) -> Result<Vec<f64>, String> {
        match self {
            OutputWeights::Flat(v) => Ok(v.clone()),
            OutputWeights::Column(rows) => rows
                .iter()
                .map(|row| match row.as_slice() {
                    [w] => Ok(*w),
                    other => Err(format!("W2 rows must have one column, found {}", other.len())),
                })
                .collect(),
        }
    }
}

/// `b2` may be exported as `[x]` or `x`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputBias {
    Vector(Vec<f64>),
    Scalar(f64),
}

impl OutputBias {
    fn to_scalar(&self) -> Result<f64, String> {
        match self {
            OutputBias::Scalar(b) => Ok(*b),
            OutputBias::Vector(v) => match v.as_slice() {
                [b] => Ok(*b),
                other => Err(format!("b2 must hold one value, found {}", other.len())),
            },
        }
    }
}

/// Either a single weight set or a list of them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnsembleWeights {
    Ensemble(Vec<WeightSet>),
    Single(WeightSet),
}

impl EnsembleWeights {
    fn into_vec(self) -> Vec<WeightSet> {
        match self {
            EnsembleWeights::Ensemble(sets) => sets,
            EnsembleWeights::Single(set) => vec![set],
        }
    }
}

/// Input normalization statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Serialized model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default)]
    pub version: Option<String>,
    pub input_size: usize,
    pub hidden_size: usize,
    pub weights: EnsembleWeights,
    pub normalization: Normalization,
    pub quality_thresholds: QualityCutoffs,
}

/// A validated member, flattened for inference
#[derive(Debug, Clone)]
struct Member {
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

/// Validated, immutable model ready for inference
#[derive(Debug)]
pub struct EnsembleModel {
    version: Option<String>,
    input_size: usize,
    hidden_size: usize,
    members: Vec<Member>,
    mean: Vec<f64>,
    std: Vec<f64>,
    quality_thresholds: QualityCutoffs,
}

/// Shared handle to a loaded model
pub type ModelHandle = Arc<EnsembleModel>;

impl EnsembleModel {
    /// Load and validate an artifact from disk
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json(&content)?;
        debug!(
            "Loaded model {} ({} members, {}→{})",
            model.version.as_deref().unwrap_or("unversioned"),
            model.members.len(),
            model.input_size,
            model.hidden_size
        );
        Ok(model)
    }

    /// Parse and validate an artifact from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_str(json)?;
        Self::from_artifact(artifact)
    }

    /// Validate a parsed artifact
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let ModelArtifact {
            version,
            input_size,
            hidden_size,
            weights,
            normalization,
            quality_thresholds,
        } = artifact;

        let malformed = |msg: String| ModelError::Malformed(msg);

        if input_size == 0 || hidden_size == 0 {
            return Err(malformed("input_size and hidden_size must be non-zero".into()));
        }
        if normalization.mean.len() != input_size || normalization.std.len() != input_size {
            return Err(malformed(format!(
                "normalization has {}/{} entries, expected {}",
                normalization.mean.len(),
                normalization.std.len(),
                input_size
            )));
        }
        if !all_finite(&normalization.mean) || !all_finite(&normalization.std) {
            return Err(malformed("normalization contains non-finite values".into()));
        }
        if !quality_thresholds.is_valid() {
            return Err(malformed("quality thresholds must be finite and non-increasing".into()));
        }

        let sets = weights.into_vec();
        if sets.is_empty() {
            return Err(malformed("weights list is empty".into()));
        }

        let mut members = Vec::with_capacity(sets.len());
        for (i, set) in sets.into_iter().enumerate() {
            let w2 = set.w2.to_flat().map_err(|e| malformed(format!("member {i}: {e}")))?;
            let b2 = set.b2.to_scalar().map_err(|e| malformed(format!("member {i}: {e}")))?;

            if set.w1.len() != input_size || set.w1.iter().any(|row| row.len() != hidden_size) {
                return Err(malformed(format!(
                    "member {i}: W1 must be {input_size}x{hidden_size}"
                )));
            }
            if set.b1.len() != hidden_size || w2.len() != hidden_size {
                return Err(malformed(format!(
                    "member {i}: b1 and W2 must have {hidden_size} entries"
                )));
            }
            if set.w1.iter().any(|row| !all_finite(row))
                || !all_finite(&set.b1)
                || !all_finite(&w2)
                || !b2.is_finite()
            {
                return Err(malformed(format!("member {i}: non-finite weight")));
            }

            members.push(Member {
                w1: set.w1,
                b1: set.b1,
                w2,
                b2,
            });
        }

        // Zero spread would divide by zero; treat it as unit spread
        let std = normalization
            .std
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            version,
            input_size,
            hidden_size,
            members,
            mean: normalization.mean,
            std,
            quality_thresholds,
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn quality_thresholds(&self) -> &QualityCutoffs {
        &self.quality_thresholds
    }

    /// Score one normalized input through one member
    fn forward(&self, member: &Member, x: &[f64]) -> f64 {
        // Layer 1: W1ᵗ·x + b1, ReLU
        let mut hidden = member.b1.clone();
        for (xi, row) in x.iter().zip(&member.w1) {
            for (h, w) in hidden.iter_mut().zip(row) {
                *h += w * xi;
            }
        }
        for h in hidden.iter_mut() {
            *h = h.max(0.0);
        }

        // Layer 2: W2ᵗ·hidden + b2
        let raw: f64 = member.b2 + hidden.iter().zip(&member.w2).map(|(h, w)| h * w).sum::<f64>();
        let raw = raw.clamp(-LOGIT_CLAMP, LOGIT_CLAMP);

        sigmoid(raw) * 5.0 + 1.0
    }

    /// Ensemble score in [1.0, 6.0], or `None` if the input is unusable
    pub fn predict(&self, features: &FeatureVector) -> Option<f64> {
        if features.len() != self.input_size || !features.is_finite() {
            return None;
        }

        let x: Vec<f64> = features
            .values
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| (v - m) / s)
            .collect();

        let total: f64 = self.members.iter().map(|m| self.forward(m, &x)).sum();
        let score = total / self.members.len() as f64;

        // NaN can only come from inf - inf in an extreme input; refuse it
        score.is_finite().then(|| score.clamp(1.0, 6.0))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Result of asking the neural scorer for a score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScorerOutcome {
    /// No model is loaded
    ModelUnavailable,
    /// The feature vector does not fit the model's input contract
    InsufficientFeatures,
    Scored(f64),
}

/// Neural scorer wrapping an optional model handle
#[derive(Debug, Clone, Default)]
pub struct NeuralScorer {
    model: Option<ModelHandle>,
}

impl NeuralScorer {
    pub fn new(model: ModelHandle) -> Self {
        Self { model: Some(model) }
    }

    /// Scorer that always reports [`ScorerOutcome::ModelUnavailable`]
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    /// Load from an optional path. Missing or broken artifacts degrade to
    /// an unavailable scorer with a warning.
    pub fn from_path(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            debug!("No model path configured, heuristic scoring only");
            return Self::unavailable();
        };
        match EnsembleModel::load(path) {
            Ok(model) => {
                let defaults = QualityCutoffs::default();
                if model.quality_thresholds() != &defaults {
                    warn!(
                        "Model {} ships quality thresholds that differ from the fixed cutoffs; using fixed cutoffs",
                        path.display()
                    );
                }
                Self::new(Arc::new(model))
            }
            Err(e) => {
                warn!("Model unavailable, falling back to heuristic scoring: {}", e);
                Self::unavailable()
            }
        }
    }

    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn score(&self, features: &FeatureVector) -> ScorerOutcome {
        let Some(model) = &self.model else {
            return ScorerOutcome::ModelUnavailable;
        };
        match model.predict(features) {
            Some(score) => ScorerOutcome::Scored(score),
            None => ScorerOutcome::InsufficientFeatures,
        }
    }
}
