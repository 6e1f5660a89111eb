//! Experiment state machine
//!
//! Drives one block of drag-and-drop trials. The machine consumes touch events
//! one at a time, tracks the from/to targets of the current sequence, restarts
//! outlier sequences, and hands finished trials and sequences to the caller.
//!
//! ```text
//! AwaitStart --start region tapped--> InSequence --last trial--> SequenceComplete
//!     ^                                   |                             |
//!     +----------- outlier trial ---------+                             |
//!     +------------------ next condition (boundary taken) --------------+
//!                                                                       v
//!                                                             BlockComplete
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ExperimentParams;
use crate::error::ExperimentError;
use crate::geometry::{layout, TargetSet, TargetStatus};
use crate::sequence::{SequenceAccumulator, TrialOutcome};
use crate::throughput::{trial_effective_amplitude, ThroughputAnalyzer};
use crate::types::{
    BlockSummary, Condition, Point, SequenceRecord, TouchEvent, TouchPhase, TrialRecord,
};

/// Lifecycle of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentPhase {
    /// Waiting for the participant to tap the start region
    AwaitStart,
    /// Trials in progress
    InSequence,
    /// Sequence analyzed; waiting for the caller to take the record
    SequenceComplete,
    /// Every condition has a completed sequence
    BlockComplete,
}

/// Why the last sequence ended without a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartReason {
    /// A trial moved less than half the nominal amplitude
    Outlier,
    /// The sequence statistics could not be computed
    Degenerate,
}

/// State machine for one block of testing
pub struct ExperimentStateMachine {
    params: ExperimentParams,
    conditions: Vec<Condition>,
    condition_index: usize,
    phase: ExperimentPhase,

    targets: Option<TargetSet>,
    from_index: usize,
    to_index: usize,
    drag_object: Point,
    drag_in_progress: bool,

    sequence_started: bool,
    sequence_start_ms: u64,
    selection_count: usize,
    trial: TrialOutcome,
    accumulator: SequenceAccumulator,

    last_timestamp_ms: Option<u64>,
    last_restart: Option<RestartReason>,
    pending: Option<SequenceRecord>,

    sequences_completed: usize,
    total_outlier_restarts: u32,
    total_pickup_misses: u32,
    throughput_sum: f64,
}

impl ExperimentStateMachine {
    /// Start a block over the given (already shuffled) conditions.
    pub fn begin_block(
        conditions: Vec<Condition>,
        params: ExperimentParams,
    ) -> Result<Self, ExperimentError> {
        if conditions.is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "condition list is empty".to_string(),
            ));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if let Some(bad) = conditions
            .iter()
            .find(|c| !(positive(c.amplitude) && positive(c.width)))
        {
            return Err(ExperimentError::InvalidConfig(format!(
                "condition amplitude and width must be positive, got A={} W={}",
                bad.amplitude, bad.width
            )));
        }
        params.validate()?;

        info!(
            participant = %params.codes.participant,
            block = %params.codes.block,
            mode = params.dimension.code(),
            conditions = conditions.len(),
            trials_per_sequence = params.trials_per_sequence,
            "Block started"
        );

        Ok(Self {
            params,
            conditions,
            condition_index: 0,
            phase: ExperimentPhase::AwaitStart,
            targets: None,
            from_index: 0,
            to_index: 0,
            drag_object: Point::default(),
            drag_in_progress: false,
            sequence_started: false,
            sequence_start_ms: 0,
            selection_count: 0,
            trial: TrialOutcome::default(),
            accumulator: SequenceAccumulator::new(),
            last_timestamp_ms: None,
            last_restart: None,
            pending: None,
            sequences_completed: 0,
            total_outlier_restarts: 0,
            total_pickup_misses: 0,
            throughput_sum: 0.0,
        })
    }

    pub fn phase(&self) -> ExperimentPhase {
        self.phase
    }

    pub fn params(&self) -> &ExperimentParams {
        &self.params
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Condition of the current (or next) sequence
    pub fn current_condition(&self) -> Option<Condition> {
        self.conditions.get(self.condition_index).copied()
    }

    /// Targets of the current sequence, if one has been laid out
    pub fn targets(&self) -> Option<&TargetSet> {
        self.targets.as_ref()
    }

    pub fn from_index(&self) -> usize {
        self.from_index
    }

    pub fn to_index(&self) -> usize {
        self.to_index
    }

    /// Display status of a target; only the current to target is `Target`
    pub fn target_status(&self, index: usize) -> TargetStatus {
        if self.phase == ExperimentPhase::InSequence && index == self.to_index {
            TargetStatus::Target
        } else {
            TargetStatus::Normal
        }
    }

    /// Where the drag object should be drawn
    pub fn drag_object(&self) -> Point {
        self.drag_object
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_in_progress
    }

    pub fn sequence_started(&self) -> bool {
        self.sequence_started
    }

    /// Timestamp of the first correct selection of the current sequence
    pub fn sequence_start_ms(&self) -> Option<u64> {
        self.sequence_started.then_some(self.sequence_start_ms)
    }

    /// Trials finalized in the current sequence
    pub fn selection_count(&self) -> usize {
        self.selection_count
    }

    /// Pickup misses of the trial in progress
    pub fn trial_pickup_misses(&self) -> u32 {
        self.trial.pickup_misses
    }

    /// Pickup misses of the sequence in progress
    pub fn sequence_pickup_misses(&self) -> u32 {
        self.accumulator.pickup_misses
    }

    /// Outlier restarts of the current condition
    pub fn outlier_restarts(&self) -> u32 {
        self.accumulator.outlier_restarts
    }

    /// Reason the most recent sequence was restarted, cleared when read
    pub fn take_restart_notice(&mut self) -> Option<RestartReason> {
        self.last_restart.take()
    }

    /// Non-outlier sequences completed so far in this block
    pub fn sequences_completed(&self) -> usize {
        self.sequences_completed
    }

    pub fn is_block_complete(&self) -> bool {
        self.phase == ExperimentPhase::BlockComplete
    }

    /// Feed one touch event into the machine.
    ///
    /// Returns the trial record when the event finalizes a trial. The record is
    /// provisional: an outlier or degenerate sequence discards it, and only the
    /// records carried by the completed `SequenceRecord` are committed. A timestamp
    /// earlier than the previous event is rejected and leaves the state untouched.
    pub fn on_touch_event(
        &mut self,
        event: TouchEvent,
    ) -> Result<Option<TrialRecord>, ExperimentError> {
        if let Some(previous) = self.last_timestamp_ms {
            if event.timestamp_ms < previous {
                warn!(previous, current = event.timestamp_ms, "Rejected out-of-order touch event");
                return Err(ExperimentError::NonMonotonicTimestamp {
                    previous,
                    current: event.timestamp_ms,
                });
            }
        }
        self.last_timestamp_ms = Some(event.timestamp_ms);

        let point = event.point();
        let now = event.timestamp_ms;

        match (self.phase, event.phase) {
            (ExperimentPhase::AwaitStart, TouchPhase::Up) => {
                if self.params.start_region.contains(point) {
                    self.start_sequence();
                }
                Ok(None)
            }
            (ExperimentPhase::InSequence, TouchPhase::Down) => {
                self.drag_begin(point, now);
                Ok(None)
            }
            (ExperimentPhase::InSequence, TouchPhase::Move) => {
                if self.drag_in_progress {
                    self.drag_object = point;
                    if self.sequence_started {
                        self.trial.push_trace(point, now);
                    }
                }
                Ok(None)
            }
            (ExperimentPhase::InSequence, TouchPhase::Up) if self.drag_in_progress => {
                self.target_selected(point, now)
            }
            (ExperimentPhase::SequenceComplete, _) => {
                debug!("Touch event ignored until the sequence record is taken");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Take the record of a just-completed sequence and move on to the next
    /// condition, or to `BlockComplete` after the last one.
    pub fn on_sequence_boundary(&mut self) -> Option<SequenceRecord> {
        let record = self.pending.take()?;

        self.condition_index += 1;
        if self.condition_index >= self.conditions.len() {
            self.phase = ExperimentPhase::BlockComplete;
            info!(
                sequences = self.sequences_completed,
                outlier_restarts = self.total_outlier_restarts,
                "Block complete"
            );
        } else {
            self.phase = ExperimentPhase::AwaitStart;
        }
        Some(record)
    }

    /// Close the block and report its totals. Only legal once the block is complete.
    pub fn finish(self) -> Result<BlockSummary, ExperimentError> {
        if !self.is_block_complete() {
            return Err(ExperimentError::BlockInProgress {
                completed: self.sequences_completed,
                total: self.conditions.len(),
            });
        }

        let mean_throughput_bps = if self.sequences_completed > 0 {
            self.throughput_sum / self.sequences_completed as f64
        } else {
            0.0
        };

        Ok(BlockSummary {
            mode: self.params.dimension.code().to_string(),
            codes: self.params.codes,
            sequences_completed: self.sequences_completed,
            outlier_restarts: self.total_outlier_restarts,
            pickup_misses: self.total_pickup_misses,
            mean_throughput_bps,
        })
    }

    fn start_sequence(&mut self) {
        let Some(condition) = self.current_condition() else {
            return;
        };

        let targets = layout(
            condition,
            self.params.target_count,
            self.params.dimension,
            self.params.screen_center,
            self.params.one_d_target_height,
        );
        self.to_index = 0;
        self.from_index = targets.initial_from_index();
        self.drag_object = targets
            .get(self.from_index)
            .map(|t| t.center)
            .unwrap_or(self.params.screen_center);
        self.targets = Some(targets);

        self.selection_count = 0;
        self.sequence_started = false;
        self.drag_in_progress = false;
        self.phase = ExperimentPhase::InSequence;

        info!(
            sequence = self.condition_index + 1,
            of = self.conditions.len(),
            amplitude = condition.amplitude,
            width = condition.width,
            "Sequence ready"
        );
    }

    fn from_center(&self) -> Point {
        self.center_of(self.from_index)
    }

    fn to_center(&self) -> Point {
        self.center_of(self.to_index)
    }

    fn center_of(&self, index: usize) -> Point {
        self.targets
            .as_ref()
            .and_then(|t| t.get(index))
            .map(|t| t.center)
            .unwrap_or(self.params.screen_center)
    }

    fn drag_begin(&mut self, point: Point, now: u64) {
        let acquired = self
            .targets
            .as_ref()
            .and_then(|t| t.get(self.from_index))
            .is_some_and(|t| t.contains(point));

        if acquired {
            self.drag_in_progress = true;
            self.drag_object = point;
            if self.sequence_started {
                self.trial.record_finger_down(point, now);
            } else {
                self.trial.finger_down = point;
                self.trial.finger_down_ms = now;
            }
        } else if self.sequence_started {
            self.trial.pickup_misses += 1;
            self.accumulator.pickup_misses += 1;
            debug!(
                trial_misses = self.trial.pickup_misses,
                sequence_misses = self.accumulator.pickup_misses,
                "Pickup miss"
            );
        }
    }

    fn target_selected(
        &mut self,
        select: Point,
        now: u64,
    ) -> Result<Option<TrialRecord>, ExperimentError> {
        self.drag_in_progress = false;

        let Some(condition) = self.current_condition() else {
            return Ok(None);
        };
        let hit = self
            .targets
            .as_ref()
            .and_then(|t| t.get(self.to_index))
            .is_some_and(|t| t.contains(select));

        // The clock starts on the first correct selection; nothing is recorded
        // before that.
        if !self.sequence_started {
            if hit {
                self.sequence_started = true;
                self.sequence_start_ms = now;
                self.trial = TrialOutcome::starting_at(select, now);
                self.advance_target();
                debug!(at = now, "Sequence clock started");
            } else {
                self.drag_object = self.from_center();
            }
            return Ok(None);
        }

        let from = self.from_center();
        let to = self.to_center();

        let ae = trial_effective_amplitude(from, to, select);
        if ae < condition.amplitude / 2.0 {
            self.restart_outlier(ae, condition);
            return Ok(None);
        }

        let trial = std::mem::take(&mut self.trial);
        let finalized = self
            .accumulator
            .finalize_trial(trial, from, to, select, hit, now);
        self.selection_count += 1;

        let record = TrialRecord {
            codes: self.params.codes.clone(),
            mode: self.params.dimension.code().to_string(),
            sequence: self.condition_index + 1,
            trial: self.selection_count,
            attempt: self.accumulator.attempt(),
            amplitude: condition.amplitude,
            width: condition.width,
            from: finalized.from,
            to: finalized.to,
            finger_down: finalized.finger_down,
            select: finalized.select,
            x_delta: finalized.x_delta,
            finger_down_up_delta: finalized.finger_down.distance_to(&select),
            finger_down_up_time_ms: finalized.finger_down_up_time_ms,
            distance_from_target_center: select.distance_to(&to),
            pickup_misses: finalized.pickup_misses,
            error: !finalized.hit,
            movement_time_ms: finalized.movement_time_ms,
            trace: finalized.trace,
        };

        self.accumulator.push_record(record.clone());
        self.trial = TrialOutcome::starting_at(select, now);
        self.advance_target();

        if self.selection_count >= self.params.trials_per_sequence {
            self.complete_sequence(condition)?;
        }

        Ok(Some(record))
    }

    /// Move the to target forward; the old to target becomes the from target.
    fn advance_target(&mut self) {
        let Some(targets) = self.targets.as_ref() else {
            return;
        };
        let next = targets.next_index(self.to_index);
        self.from_index = self.to_index;
        self.to_index = next;
        self.drag_object = self.from_center();
    }

    fn restart_outlier(&mut self, ae: f64, condition: Condition) {
        self.accumulator.discard_outlier();
        self.total_outlier_restarts += 1;
        self.trial = TrialOutcome::default();
        self.reset_to_await_start();
        self.last_restart = Some(RestartReason::Outlier);

        info!(
            effective_amplitude = ae,
            amplitude = condition.amplitude,
            restarts = self.accumulator.outlier_restarts,
            "Outlier trial, sequence restarted"
        );
    }

    fn complete_sequence(&mut self, condition: Condition) -> Result<(), ExperimentError> {
        let analysis = ThroughputAnalyzer::analyze(
            condition.amplitude,
            condition.width,
            self.params.dimension,
            self.params.response,
            self.accumulator.samples(),
        );

        let summary = match analysis {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Sequence could not be analyzed, restarting");
                self.accumulator.discard();
                self.trial = TrialOutcome::default();
                self.reset_to_await_start();
                self.last_restart = Some(RestartReason::Degenerate);
                return Err(e);
            }
        };

        let pickup_misses = self.accumulator.pickup_misses;
        let sequence_repeat_count = self.accumulator.outlier_restarts;
        let (samples, trial_records) = self.accumulator.take();
        let trials = samples.len();

        self.sequences_completed += 1;
        self.total_pickup_misses += pickup_misses;
        self.throughput_sum += summary.throughput_bps;

        info!(
            sequence = self.condition_index + 1,
            trials,
            throughput_bps = summary.throughput_bps,
            error_rate_pct = summary.error_rate_pct,
            "Sequence complete"
        );

        self.pending = Some(SequenceRecord {
            codes: self.params.codes.clone(),
            mode: self.params.dimension.code().to_string(),
            sequence: self.condition_index + 1,
            sequences_in_block: self.conditions.len(),
            trials,
            throughput: summary,
            pickup_misses,
            sequence_repeat_count,
            trial_records,
        });

        self.trial = TrialOutcome::default();
        self.sequence_started = false;
        self.drag_in_progress = false;
        self.phase = ExperimentPhase::SequenceComplete;
        Ok(())
    }

    fn reset_to_await_start(&mut self) {
        self.sequence_started = false;
        self.drag_in_progress = false;
        self.selection_count = 0;
        self.phase = ExperimentPhase::AwaitStart;
    }
}
