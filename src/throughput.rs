//! Fitts' law throughput computation
//!
//! Computes the ISO 9241-411 dependent measures for one completed sequence of
//! trials: effective amplitude and width, nominal and effective index of
//! difficulty, movement time, error rate and throughput.
//!
//! Endpoint deviations are projected on the task axis (the line through the
//! from and to target centers), so the same computation serves the 1D and 2D
//! tasks.

use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;
use crate::types::{Point, ResponseType, TaskDimension};

/// Multiplier mapping the endpoint standard deviation to an effective width,
/// `sqrt(2 * pi * e)`. Corresponds to a 96% hit rate for normally distributed
/// endpoints.
pub const EFFECTIVE_WIDTH_FACTOR: f64 = 4.133;

/// Raw measurements for one trial of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialSample {
    /// Center of the from target
    pub from: Point,
    /// Center of the to target
    pub to: Point,
    /// Selection (finger-up) point
    pub select: Point,
    /// Movement time in milliseconds
    pub movement_time_ms: f64,
}

/// Throughput statistics for one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSummary {
    /// Nominal amplitude
    pub amplitude: f64,
    /// Nominal width
    pub width: f64,
    pub task: TaskDimension,
    pub response: ResponseType,
    pub trials: usize,
    /// Nominal index of difficulty (bits)
    pub index_of_difficulty: f64,
    /// Effective amplitude
    pub effective_amplitude: f64,
    /// Effective width
    pub effective_width: f64,
    /// Effective index of difficulty (bits)
    pub effective_index_of_difficulty: f64,
    /// Mean movement time (ms)
    pub movement_time_ms: f64,
    /// Trials whose endpoint fell outside the to target
    pub misses: usize,
    /// Misses as a percentage of trials
    pub error_rate_pct: f64,
    /// Effective throughput (bits/second)
    pub throughput_bps: f64,
}

/// Signed deviation of the selection point from the to-target center, projected
/// on the from→to axis. Positive values are overshoots.
///
/// With `a = |to - from|`, `b = |select - to|` and `c = |select - from|`, the law
/// of cosines gives `dx = (c² - b² - a²) / 2a`.
pub fn trial_delta_x(from: Point, to: Point, select: Point) -> f64 {
    let a = from.distance_to(&to);
    if a == 0.0 {
        return 0.0;
    }
    let b = select.distance_to(&to);
    let c = select.distance_to(&from);
    (c * c - b * b - a * a) / (2.0 * a)
}

/// Effective movement distance of a trial: the scalar projection of
/// `select - from` on the unit vector from `from` to `to`.
pub fn trial_effective_amplitude(from: Point, to: Point, select: Point) -> f64 {
    let a = from.distance_to(&to);
    if a == 0.0 {
        return 0.0;
    }
    ((select.x - from.x) * (to.x - from.x) + (select.y - from.y) * (to.y - from.y)) / a
}

/// Shannon index of difficulty, `log2(A / W + 1)`
pub fn index_of_difficulty(amplitude: f64, width: f64) -> f64 {
    (amplitude / width + 1.0).log2()
}

/// Throughput in bits/second for an index of difficulty and a movement time in ms
pub fn throughput_bps(index_of_difficulty: f64, movement_time_ms: f64) -> f64 {
    index_of_difficulty / (movement_time_ms / 1000.0)
}

/// Effective width from a set of endpoint deviations (sample standard deviation)
pub fn effective_width(deltas: &[f64]) -> f64 {
    EFFECTIVE_WIDTH_FACTOR * sample_std_dev(deltas)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Stateless analyzer for completed sequences
pub struct ThroughputAnalyzer;

impl ThroughputAnalyzer {
    /// Compute the throughput statistics for one sequence.
    ///
    /// Requires at least two trials, a non-zero endpoint spread and a non-zero
    /// mean movement time.
    pub fn analyze(
        amplitude: f64,
        width: f64,
        task: TaskDimension,
        response: ResponseType,
        trials: &[TrialSample],
    ) -> Result<ThroughputSummary, ExperimentError> {
        if trials.len() < 2 {
            return Err(ExperimentError::InsufficientTrials(trials.len()));
        }

        let deltas: Vec<f64> = trials
            .iter()
            .map(|t| trial_delta_x(t.from, t.to, t.select))
            .collect();

        let amplitudes: Vec<f64> = trials
            .iter()
            .zip(&deltas)
            .enumerate()
            .map(|(i, (t, dx))| {
                let ae = t.from.distance_to(&t.to) + dx;
                match response {
                    ResponseType::Serial if i > 0 => ae + deltas[i - 1],
                    _ => ae,
                }
            })
            .collect();

        let misses = trials
            .iter()
            .zip(&deltas)
            .filter(|(t, dx)| match task {
                TaskDimension::OneD => dx.abs() > width / 2.0,
                TaskDimension::TwoD => t.select.distance_to(&t.to) > width / 2.0,
            })
            .count();

        let movement_times: Vec<f64> = trials.iter().map(|t| t.movement_time_ms).collect();

        let effective_amplitude = mean(&amplitudes);
        let effective_width = effective_width(&deltas);
        let movement_time_ms = mean(&movement_times);

        if effective_width <= 0.0 {
            return Err(ExperimentError::DegenerateSequence(
                "endpoint deviations have zero spread".to_string(),
            ));
        }
        if movement_time_ms <= 0.0 {
            return Err(ExperimentError::DegenerateSequence(
                "mean movement time is zero".to_string(),
            ));
        }

        let effective_index_of_difficulty =
            index_of_difficulty(effective_amplitude, effective_width);

        Ok(ThroughputSummary {
            amplitude,
            width,
            task,
            response,
            trials: trials.len(),
            index_of_difficulty: index_of_difficulty(amplitude, width),
            effective_amplitude,
            effective_width,
            effective_index_of_difficulty,
            movement_time_ms,
            misses,
            error_rate_pct: misses as f64 / trials.len() as f64 * 100.0,
            throughput_bps: throughput_bps(effective_index_of_difficulty, movement_time_ms),
        })
    }
}
