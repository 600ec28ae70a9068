// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Webcam not available")]
    WebcamUnavailable,

    #[error("Failed to start webcam stream: {0}")]
    StreamFailed(String),

    #[error("Failed to load classifier model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Invalid classifier model: {0}")]
    InvalidModel(String),

    #[error("Classifier model has no examples")]
    EmptyModel,

    #[error("No hand detected, nothing to classify")]
    EmptyPose,

    #[error("Pose has {actual} values but the model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("A round is already in progress")]
    RoundInProgress,
}

pub type GameResult<T> = std::result::Result<T, GameError>;
