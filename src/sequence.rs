//! Per-trial and per-sequence measurement accumulators
//!
//! A `TrialOutcome` collects the raw measurements of the trial in progress; a
//! `SequenceAccumulator` owns the finalized trial samples of the current sequence
//! together with the counters that survive across trials.

use crate::throughput::{trial_delta_x, TrialSample};
use crate::types::{Point, TraceSample, TrialRecord};

/// Measurements for the trial currently in progress
#[derive(Debug, Clone, Default)]
pub struct TrialOutcome {
    /// Timestamp of the previous finger-up; movement time starts here
    pub start_ms: u64,
    /// Finger-down point that acquired the drag object
    pub finger_down: Point,
    /// Timestamp of that finger-down
    pub finger_down_ms: u64,
    /// Failed acquisitions during this trial
    pub pickup_misses: u32,
    /// Drag path, relative to `start_ms`
    pub trace: Vec<TraceSample>,
}

impl TrialOutcome {
    /// Begin a trial at the given finger-up point and time
    pub fn starting_at(origin: Point, start_ms: u64) -> Self {
        Self {
            start_ms,
            finger_down: origin,
            finger_down_ms: start_ms,
            pickup_misses: 0,
            trace: vec![TraceSample {
                t_ms: 0,
                x: origin.x,
                y: origin.y,
            }],
        }
    }

    pub fn record_finger_down(&mut self, point: Point, now_ms: u64) {
        self.finger_down = point;
        self.finger_down_ms = now_ms;
        self.push_trace(point, now_ms);
    }

    pub fn push_trace(&mut self, point: Point, now_ms: u64) {
        self.trace.push(TraceSample {
            t_ms: now_ms.saturating_sub(self.start_ms),
            x: point.x,
            y: point.y,
        });
    }

    pub fn movement_time_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.start_ms)
    }
}

/// A finalized trial, before it is turned into an output record
#[derive(Debug, Clone)]
pub struct FinalizedTrial {
    pub from: Point,
    pub to: Point,
    pub finger_down: Point,
    pub select: Point,
    pub x_delta: f64,
    pub finger_down_up_time_ms: u64,
    pub pickup_misses: u32,
    pub hit: bool,
    pub movement_time_ms: u64,
    pub trace: Vec<TraceSample>,
}

/// Trials and counters for the sequence in progress
#[derive(Debug, Clone, Default)]
pub struct SequenceAccumulator {
    samples: Vec<TrialSample>,
    /// Records of the attempt in progress, committed with the sequence
    records: Vec<TrialRecord>,
    /// Pickup misses across the sequence, restarts included
    pub pickup_misses: u32,
    /// Outlier restarts of the current condition
    pub outlier_restarts: u32,
}

impl SequenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TrialSample] {
        &self.samples
    }

    /// Close the trial in progress and keep its sample for the throughput analysis
    pub fn finalize_trial(
        &mut self,
        trial: TrialOutcome,
        from: Point,
        to: Point,
        select: Point,
        hit: bool,
        now_ms: u64,
    ) -> FinalizedTrial {
        let movement_time_ms = trial.movement_time_ms(now_ms);
        self.samples.push(TrialSample {
            from,
            to,
            select,
            movement_time_ms: movement_time_ms as f64,
        });

        let mut trace = trial.trace;
        trace.push(TraceSample {
            t_ms: movement_time_ms,
            x: select.x,
            y: select.y,
        });

        FinalizedTrial {
            from,
            to,
            finger_down: trial.finger_down,
            select,
            x_delta: trial_delta_x(from, to, select),
            finger_down_up_time_ms: now_ms.saturating_sub(trial.finger_down_ms),
            pickup_misses: trial.pickup_misses,
            hit,
            movement_time_ms,
            trace,
        }
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Hold a trial record until its sequence completes
    pub fn push_record(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    /// One-based attempt number of the sequence in progress
    pub fn attempt(&self) -> u32 {
        self.outlier_restarts + 1
    }

    /// Drop the trials of an outlier sequence. Pickup misses are kept.
    pub fn discard_outlier(&mut self) {
        self.discard();
        self.outlier_restarts += 1;
    }

    /// Drop the trials without counting an outlier
    pub fn discard(&mut self) {
        self.samples.clear();
        self.records.clear();
    }

    /// Hand over the completed trials and their records, and reset every counter
    pub fn take(&mut self) -> (Vec<TrialSample>, Vec<TrialRecord>) {
        self.pickup_misses = 0;
        self.outlier_restarts = 0;
        (
            std::mem::take(&mut self.samples),
            std::mem::take(&mut self.records),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_trace_is_relative_to_start() {
        let mut trial = TrialOutcome::starting_at(Point::new(10.0, 10.0), 1000);
        trial.record_finger_down(Point::new(12.0, 9.0), 1150);
        trial.push_trace(Point::new(40.0, 9.0), 1200);

        let times: Vec<u64> = trial.trace.iter().map(|s| s.t_ms).collect();
        assert_eq!(times, vec![0, 150, 200]);
        assert_eq!(trial.finger_down_ms, 1150);
    }

    #[test]
    fn test_finalize_trial_measurements() {
        let mut acc = SequenceAccumulator::new();
        let mut trial = TrialOutcome::starting_at(Point::new(0.0, 0.0), 2000);
        trial.pickup_misses = 2;
        trial.record_finger_down(Point::new(3.0, 4.0), 2100);

        let done = acc.finalize_trial(
            trial,
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(105.0, 4.0),
            true,
            2650,
        );

        assert_eq!(done.movement_time_ms, 650);
        assert_eq!(done.finger_down_up_time_ms, 550);
        assert_eq!(done.pickup_misses, 2);
        assert!((done.x_delta - 5.0).abs() < 1e-9);
        assert_eq!(done.trace.last().map(|s| s.t_ms), Some(650));
        assert_eq!(acc.len(), 1);
        assert_eq!(acc.samples()[0].movement_time_ms, 650.0);
    }

    #[test]
    fn test_outlier_keeps_pickup_misses() {
        let mut acc = SequenceAccumulator::new();
        acc.pickup_misses = 3;
        acc.finalize_trial(
            TrialOutcome::starting_at(Point::default(), 0),
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 0.0),
            true,
            500,
        );

        acc.discard_outlier();
        assert!(acc.is_empty());
        assert!(acc.records().is_empty());
        assert_eq!(acc.pickup_misses, 3);
        assert_eq!(acc.outlier_restarts, 1);
        assert_eq!(acc.attempt(), 2);

        let (samples, records) = acc.take();
        assert!(samples.is_empty());
        assert!(records.is_empty());
        assert_eq!(acc.pickup_misses, 0);
        assert_eq!(acc.outlier_restarts, 0);
    }
}
