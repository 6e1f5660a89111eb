//! Record encoder
//!
//! Wraps trial and sequence records in a self-describing envelope for the
//! persistence layer. One envelope per line gives an NDJSON stream.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExperimentError;
use crate::types::{BlockSummary, SequenceRecord, TrialRecord};
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Current record schema version
pub const RECORD_SCHEMA_VERSION: &str = "fitts.record.v1";

/// Producer metadata attached to every envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Payload of an envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Trial(TrialRecord),
    Sequence(SequenceRecord),
    Block(BlockSummary),
}

/// A record ready to be written out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEnvelope {
    pub schema_version: String,
    pub producer: RecordProducer,
    /// When the envelope was produced (RFC 3339)
    pub computed_at_utc: String,
    #[serde(flatten)]
    pub payload: RecordPayload,
}

/// Encoder for experiment records
pub struct RecordEncoder {
    instance_id: String,
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn envelope(&self, payload: RecordPayload) -> RecordEnvelope {
        RecordEnvelope {
            schema_version: RECORD_SCHEMA_VERSION.to_string(),
            producer: RecordProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            payload,
        }
    }

    /// Encode to pretty-printed JSON
    pub fn encode_to_json(&self, payload: RecordPayload) -> Result<String, ExperimentError> {
        serde_json::to_string_pretty(&self.envelope(payload)).map_err(ExperimentError::JsonError)
    }

    /// Encode to a single NDJSON line (newline included)
    pub fn encode_ndjson_line(&self, payload: RecordPayload) -> Result<String, ExperimentError> {
        let mut line = serde_json::to_string(&self.envelope(payload))
            .map_err(|e| ExperimentError::EncodingError(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    pub fn encode_trial(&self, record: &TrialRecord) -> Result<String, ExperimentError> {
        self.encode_ndjson_line(RecordPayload::Trial(record.clone()))
    }

    pub fn encode_sequence(&self, record: &SequenceRecord) -> Result<String, ExperimentError> {
        self.encode_ndjson_line(RecordPayload::Sequence(record.clone()))
    }

    pub fn encode_block(&self, summary: &BlockSummary) -> Result<String, ExperimentError> {
        self.encode_ndjson_line(RecordPayload::Block(summary.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionCodes;

    fn sample_block() -> BlockSummary {
        BlockSummary {
            codes: SessionCodes::default(),
            mode: "2D".to_string(),
            sequences_completed: 6,
            outlier_restarts: 1,
            pickup_misses: 4,
            mean_throughput_bps: 4.25,
        }
    }

    #[test]
    fn test_envelope_metadata() {
        let encoder = RecordEncoder::with_instance_id("fixed-id".to_string());
        let json = encoder
            .encode_to_json(RecordPayload::Block(sample_block()))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["schema_version"], RECORD_SCHEMA_VERSION);
        assert_eq!(value["producer"]["name"], "fitts-dnd");
        assert_eq!(value["producer"]["instance_id"], "fixed-id");
        assert_eq!(value["kind"], "block");
        assert_eq!(value["sequences_completed"], 6);
        assert!(value["computed_at_utc"].is_string());
    }

    #[test]
    fn test_ndjson_line_is_single_line() {
        let encoder = RecordEncoder::new();
        let line = encoder.encode_block(&sample_block()).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let parsed: RecordEnvelope = serde_json::from_str(line.trim_end()).unwrap();
        match parsed.payload {
            RecordPayload::Block(block) => assert_eq!(block.outlier_restarts, 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = RecordEncoder::new();
        let b = RecordEncoder::new();
        assert_ne!(a.instance_id(), b.instance_id());
    }
}
