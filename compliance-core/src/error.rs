use crate::tokenizer::Axis;

/// Configuration problems, reported before any program line is examined.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown controller dialect: {0}")]
    UnknownDialect(String),
    #[error("unknown failure class: {0}")]
    UnknownFailureClass(String),
    #[error("axis {axis} has inverted travel bounds (min {min} > max {max})")]
    InvertedAxisBounds { axis: Axis, min: f64, max: f64 },
    #[error("axis {axis} has non-finite travel bounds")]
    NonFiniteAxisBounds { axis: Axis },
    #[error("linear axis {axis} cannot have continuous travel")]
    ContinuousLinearAxis { axis: Axis },
    #[error("invalid controller profile: {0}")]
    InvalidProfile(String),
    #[error("invalid recovery context: {0}")]
    InvalidRecoveryContext(String),
    #[error("invalid validator limits: {0}")]
    InvalidLimits(String),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
