//! Fitts DnD - Trial/sequence engine for Fitts' law drag-and-drop experiments
//!
//! Drives an ISO 9241-9 / 9241-411 drag-and-drop task from a stream of touch
//! events: target layout → drag acquisition and drop → per-trial records →
//! per-sequence throughput analysis with outlier restarts → block summary.
//!
//! ## Modules
//!
//! - **Geometry**: 1D and 2D target layouts and hit testing
//! - **Experiment**: the touch-driven state machine for one block
//! - **Throughput**: effective amplitude, effective width and throughput per sequence
//! - **Encoder**: NDJSON envelopes for trial, sequence and block records

pub mod config;
pub mod encoder;
pub mod error;
pub mod experiment;
pub mod geometry;
pub mod sequence;
pub mod throughput;
pub mod types;

pub use config::{parse_values, ExperimentConfig, ExperimentParams};
pub use encoder::{RecordEncoder, RecordPayload};
pub use error::ExperimentError;
pub use experiment::{ExperimentPhase, ExperimentStateMachine, RestartReason};
pub use geometry::{layout, Target, TargetSet, TargetStatus};
pub use throughput::{ThroughputAnalyzer, ThroughputSummary, TrialSample};
pub use types::{
    BlockSummary, Condition, ResponseType, SequenceRecord, TaskDimension, TouchEvent,
    TouchPhase, TrialRecord,
};

/// Engine version embedded in all record envelopes
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for record envelopes
pub const PRODUCER_NAME: &str = "fitts-dnd";
