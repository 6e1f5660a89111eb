//! Core data types
//!
//! This module defines the touch input consumed by the engine and the trial and
//! sequence records it hands back to the rendering and persistence layers.

use serde::{Deserialize, Serialize};

use crate::throughput::ThroughputSummary;

/// A point in display coordinates (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Phase of a touch event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPhase {
    Down,
    Move,
    Up,
}

/// A raw touch sample fed into the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub x: f64,
    pub y: f64,
    /// Event time in milliseconds from the event source's clock
    pub timestamp_ms: u64,
}

impl TouchEvent {
    pub fn down(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            phase: TouchPhase::Down,
            x,
            y,
            timestamp_ms,
        }
    }

    pub fn moved(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            phase: TouchPhase::Move,
            x,
            y,
            timestamp_ms,
        }
    }

    pub fn up(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            phase: TouchPhase::Up,
            x,
            y,
            timestamp_ms,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Task dimensionality (ISO 9241-411 one- or two-dimensional task)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskDimension {
    #[serde(rename = "1d", alias = "1D")]
    OneD,
    #[serde(rename = "2d", alias = "2D")]
    TwoD,
}

impl TaskDimension {
    /// Mode code used in identifiers ("1D" or "2D")
    pub fn code(&self) -> &'static str {
        match self {
            TaskDimension::OneD => "1D",
            TaskDimension::TwoD => "2D",
        }
    }
}

/// How trials in a sequence relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Each movement starts where the previous selection ended (serial tapping)
    #[default]
    Serial,
    /// Each movement starts from the nominal from-target center
    Discrete,
}

/// One amplitude/width task condition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Target amplitude (center-to-center distance, or layout circle diameter)
    pub amplitude: f64,
    /// Target width
    pub width: f64,
}

impl Condition {
    pub const fn new(amplitude: f64, width: f64) -> Self {
        Self { amplitude, width }
    }
}

/// A single point of a drag path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    /// Milliseconds since the start of the trial
    pub t_ms: u64,
    pub x: f64,
    pub y: f64,
}

/// Opaque identifiers passed through to every output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCodes {
    pub participant: String,
    pub session: String,
    pub block: String,
    pub group: String,
    pub condition: String,
}

impl Default for SessionCodes {
    fn default() -> Self {
        Self {
            participant: "P99".to_string(),
            session: "S99".to_string(),
            block: "B01".to_string(),
            group: "G99".to_string(),
            condition: "C99".to_string(),
        }
    }
}

/// Record emitted for every finalized trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Pass-through identifiers
    pub codes: SessionCodes,
    /// Mode code ("1D" or "2D")
    pub mode: String,
    /// One-based sequence number within the block
    pub sequence: usize,
    /// One-based trial number within the sequence
    pub trial: usize,
    /// One-based attempt at this sequence; above one after outlier restarts
    pub attempt: u32,
    pub amplitude: f64,
    pub width: f64,
    /// Center of the target the drag started from
    pub from: Point,
    /// Center of the target to drop on
    pub to: Point,
    /// Finger-down point that acquired the drag object
    pub finger_down: Point,
    /// Finger-up point (the selection)
    pub select: Point,
    /// Signed endpoint deviation along the task axis (positive = overshoot)
    pub x_delta: f64,
    /// Distance between finger-down and finger-up points
    pub finger_down_up_delta: f64,
    /// Time between finger-down and finger-up
    pub finger_down_up_time_ms: u64,
    /// Distance from the selection point to the to-target center
    pub distance_from_target_center: f64,
    /// Failed drag-object acquisitions during this trial
    pub pickup_misses: u32,
    /// True if the selection fell outside the to target
    pub error: bool,
    /// Movement time, measured from the previous finger-up
    pub movement_time_ms: u64,
    /// Drag path for this trial
    pub trace: Vec<TraceSample>,
}

/// Record emitted for every completed (non-outlier) sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Pass-through identifiers
    pub codes: SessionCodes,
    /// Mode code ("1D" or "2D")
    pub mode: String,
    /// One-based sequence number within the block
    pub sequence: usize,
    /// Number of sequences in the block
    pub sequences_in_block: usize,
    /// Trials in the sequence
    pub trials: usize,
    /// Throughput statistics for the sequence
    pub throughput: ThroughputSummary,
    /// Pickup misses accumulated over the whole sequence (restarts included)
    pub pickup_misses: u32,
    /// Number of outlier restarts before this sequence completed
    pub sequence_repeat_count: u32,
    /// Trial records of the attempt that completed, written out separately
    #[serde(skip)]
    pub trial_records: Vec<TrialRecord>,
}

impl SequenceRecord {
    /// Human-readable results shown between sequences
    pub fn summary_lines(&self) -> Vec<String> {
        let t = &self.throughput;
        let block = &self.codes.block;
        let block_label = block
            .trim_start_matches(|c: char| !c.is_ascii_digit())
            .parse::<u32>()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| block.clone());

        vec![
            format!("Block {block_label}"),
            format!("Sequence {} of {}", self.sequence, self.sequences_in_block),
            format!("Number of trials = {}", self.trials),
            format!("A = {} px (nominal)", t.amplitude.round()),
            format!("W = {} px", t.width.round()),
            format!("ID = {:.2} bits", t.index_of_difficulty),
            "-----".to_string(),
            format!("Ae = {:.1} px", t.effective_amplitude),
            format!("We = {:.1} px", t.effective_width),
            format!("IDe = {:.2} bits", t.effective_index_of_difficulty),
            format!("Pickup misses = {}", self.pickup_misses),
            format!("MT = {} ms (per trial)", t.movement_time_ms.round()),
            format!("Drop errors = {}", t.misses),
            format!("Throughput = {:.2} bps", t.throughput_bps),
        ]
    }
}

/// Notice lines shown when a sequence is discarded as an outlier
pub fn outlier_notice_lines() -> Vec<String> {
    vec![
        "Oops! Outlier sequence!".to_string(),
        String::new(),
        "Possible causes...".to_string(),
        "- missed tap".to_string(),
        "- double tap".to_string(),
        String::new(),
        "Tap to try again".to_string(),
    ]
}

/// Totals reported when a block is finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub codes: SessionCodes,
    pub mode: String,
    /// Non-outlier sequences completed (one per condition)
    pub sequences_completed: usize,
    /// Outlier restarts across the whole block
    pub outlier_restarts: u32,
    /// Pickup misses across the whole block
    pub pickup_misses: u32,
    /// Mean throughput over the completed sequences
    pub mean_throughput_bps: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_phase_serialization() {
        let json = serde_json::to_string(&TouchPhase::Move).unwrap();
        assert_eq!(json, "\"move\"");

        let parsed: TouchPhase = serde_json::from_str("\"up\"").unwrap();
        assert_eq!(parsed, TouchPhase::Up);
    }

    #[test]
    fn test_task_dimension_accepts_both_cases() {
        let lower: TaskDimension = serde_json::from_str("\"1d\"").unwrap();
        let upper: TaskDimension = serde_json::from_str("\"2D\"").unwrap();
        assert_eq!(lower, TaskDimension::OneD);
        assert_eq!(upper, TaskDimension::TwoD);
        assert_eq!(upper.code(), "2D");
    }

    #[test]
    fn test_touch_event_deserialization() {
        let json = r#"{"phase": "down", "x": 120.5, "y": 300.0, "timestamp_ms": 1500}"#;
        let event: TouchEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.phase, TouchPhase::Down);
        assert_eq!(event.point(), Point::new(120.5, 300.0));
        assert_eq!(event.timestamp_ms, 1500);
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    fn sample_sequence(block: &str) -> SequenceRecord {
        SequenceRecord {
            codes: SessionCodes {
                block: block.to_string(),
                ..SessionCodes::default()
            },
            mode: "2D".to_string(),
            sequence: 3,
            sequences_in_block: 6,
            trials: 15,
            throughput: ThroughputSummary {
                amplitude: 239.6,
                width: 50.4,
                task: TaskDimension::TwoD,
                response: ResponseType::Serial,
                trials: 15,
                index_of_difficulty: 2.536,
                effective_amplitude: 236.27,
                effective_width: 41.33,
                effective_index_of_difficulty: 2.744,
                movement_time_ms: 812.6,
                misses: 1,
                error_rate_pct: 6.67,
                throughput_bps: 3.1749,
            },
            pickup_misses: 2,
            sequence_repeat_count: 0,
            trial_records: Vec::new(),
        }
    }

    #[test]
    fn test_summary_lines() {
        let lines = sample_sequence("B02").summary_lines();
        assert_eq!(lines[0], "Block 2");
        assert_eq!(lines[1], "Sequence 3 of 6");
        assert_eq!(lines[2], "Number of trials = 15");
        assert_eq!(lines[3], "A = 240 px (nominal)");
        assert_eq!(lines[4], "W = 50 px");
        assert_eq!(lines[5], "ID = 2.54 bits");
        assert_eq!(lines[7], "Ae = 236.3 px");
        assert_eq!(lines[10], "Pickup misses = 2");
        assert_eq!(lines[11], "MT = 813 ms (per trial)");
        assert_eq!(lines[12], "Drop errors = 1");
        assert_eq!(lines.last().map(String::as_str), Some("Throughput = 3.17 bps"));
    }

    #[test]
    fn test_summary_keeps_non_numeric_block_code() {
        let lines = sample_sequence("Practice").summary_lines();
        assert_eq!(lines[0], "Block Practice");
    }

    #[test]
    fn test_outlier_notice() {
        let lines = outlier_notice_lines();
        assert_eq!(lines.first().map(String::as_str), Some("Oops! Outlier sequence!"));
        assert_eq!(lines.last().map(String::as_str), Some("Tap to try again"));
    }

    #[test]
    fn test_default_codes() {
        let codes = SessionCodes::default();
        assert_eq!(codes.participant, "P99");
        assert_eq!(codes.block, "B01");
    }
}
