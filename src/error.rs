//! Error types for the Fitts drag-and-drop engine

use thiserror::Error;

/// Errors that can occur while configuring or running an experiment block
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("Invalid experiment configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse value list: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Non-monotonic timestamp: {current} ms arrived after {previous} ms")]
    NonMonotonicTimestamp { previous: u64, current: u64 },

    #[error("Insufficient trials for throughput computation: {0}")]
    InsufficientTrials(usize),

    #[error("Degenerate sequence: {0}")]
    DegenerateSequence(String),

    #[error("Block still in progress: {completed} of {total} conditions completed")]
    BlockInProgress { completed: usize, total: usize },

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
