//! Experiment configuration
//!
//! Setup parameters for one block of testing, their validation, and the
//! derivation of the engine inputs: scaled amplitude/width conditions in a
//! shuffled order, and the display-dependent layout parameters.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;
use crate::geometry::Target;
use crate::types::{Condition, Point, ResponseType, SessionCodes, TaskDimension};

/// Start circle diameter in density-independent pixels (about 1/3 inch)
const START_CIRCLE_DIAMETER_DP: f64 = 53.0;

/// Drag object width in density-independent pixels (about 1/4 inch)
const DRAG_OBJECT_WIDTH_DP: f64 = 40.0;

/// Margin added to the widest condition when scaling to the display
const SCALING_MARGIN_DP: f64 = 10.0;

/// 1D targets span this fraction of the display height
const ONE_D_HEIGHT_FRACTION: f64 = 0.9;

/// Display the experiment runs on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    /// Width in pixels
    pub width: f64,
    /// Height in pixels
    pub height: f64,
    /// Pixels per density-independent pixel
    #[serde(default = "default_density")]
    pub density: f64,
}

fn default_density() -> f64 {
    1.0
}

impl Default for DisplayGeometry {
    fn default() -> Self {
        Self {
            width: 1080.0,
            height: 1920.0,
            density: 2.625,
        }
    }
}

impl DisplayGeometry {
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn one_d_target_height(&self) -> f64 {
        self.height * ONE_D_HEIGHT_FRACTION
    }

    /// The circle tapped to start each sequence, in the top-left corner
    pub fn start_region(&self) -> Target {
        let d = START_CIRCLE_DIAMETER_DP * self.density;
        Target::circle(Point::new(d, d), d)
    }
}

/// Feedback options. The engine does not act on these; they are passed through
/// to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackOptions {
    pub vibrotactile: bool,
    pub auditory: bool,
    pub speech: bool,
    pub fitts_farm_style: bool,
    pub show_all_targets: bool,
}

impl Default for FeedbackOptions {
    fn default() -> Self {
        Self {
            vibrotactile: false,
            auditory: true,
            speech: false,
            fitts_farm_style: false,
            show_all_targets: true,
        }
    }
}

/// Setup parameters for one block, as chosen in the setup dialog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub codes: SessionCodes,
    pub mode: TaskDimension,
    /// Selections per sequence for the 1D task
    pub number_of_trials: usize,
    /// Targets on the layout circle for the 2D task
    pub number_of_targets: usize,
    /// Unscaled target amplitudes
    pub amplitudes: Vec<f64>,
    /// Unscaled target widths
    pub widths: Vec<f64>,
    pub display: DisplayGeometry,
    pub feedback: FeedbackOptions,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            codes: SessionCodes::default(),
            mode: TaskDimension::TwoD,
            number_of_trials: 14,
            number_of_targets: 15,
            amplitudes: vec![120.0, 240.0, 480.0],
            widths: vec![50.0, 100.0],
            display: DisplayGeometry::default(),
            feedback: FeedbackOptions::default(),
        }
    }
}

/// Parse a comma- or space-separated value list such as `"120, 240, 480"`
pub fn parse_values(values: &str) -> Result<Vec<f64>, ExperimentError> {
    values
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|e| ExperimentError::ParseError(format!("'{token}': {e}")))
        })
        .collect()
}

fn validate_dimensions(label: &str, values: &[f64]) -> Result<(), ExperimentError> {
    if values.is_empty() {
        return Err(ExperimentError::InvalidConfig(format!(
            "{label} list is empty"
        )));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v <= 0.0) {
        return Err(ExperimentError::InvalidConfig(format!(
            "{label} values must be positive, got {bad}"
        )));
    }
    Ok(())
}

impl ExperimentConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ExperimentError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the preconditions the engine relies on
    pub fn validate(&self) -> Result<(), ExperimentError> {
        validate_dimensions("amplitude", &self.amplitudes)?;
        validate_dimensions("width", &self.widths)?;

        match self.mode {
            TaskDimension::OneD if self.number_of_trials < 2 => {
                return Err(ExperimentError::InvalidConfig(format!(
                    "1D task needs at least 2 trials per sequence, got {}",
                    self.number_of_trials
                )));
            }
            TaskDimension::TwoD
                if self.number_of_targets < 3 || self.number_of_targets % 2 == 0 =>
            {
                return Err(ExperimentError::InvalidConfig(format!(
                    "2D task needs an odd number of targets (at least 3), got {}",
                    self.number_of_targets
                )));
            }
            _ => {}
        }

        let d = &self.display;
        if !(d.width > 0.0 && d.height > 0.0 && d.density > 0.0) {
            return Err(ExperimentError::InvalidConfig(format!(
                "display geometry must be positive, got {}x{} @ {}",
                d.width, d.height, d.density
            )));
        }
        Ok(())
    }

    /// Targets per layout (two for the 1D task)
    pub fn target_count(&self) -> usize {
        match self.mode {
            TaskDimension::OneD => 2,
            TaskDimension::TwoD => self.number_of_targets,
        }
    }

    /// Selections per sequence. The 2D task makes one selection per target.
    pub fn trials_per_sequence(&self) -> usize {
        match self.mode {
            TaskDimension::OneD => self.number_of_trials,
            TaskDimension::TwoD => self.number_of_targets,
        }
    }

    /// Factor that makes the largest amplitude plus the largest width span the
    /// shorter display dimension, less a small margin
    pub fn scale_factor(&self) -> f64 {
        let largest_amplitude = self.amplitudes.iter().copied().fold(0.0, f64::max);
        let largest_width = self.widths.iter().copied().fold(0.0, f64::max);
        let d = &self.display;
        d.width.min(d.height)
            / (largest_amplitude + largest_width + SCALING_MARGIN_DP * d.density)
    }

    /// Amplitude × width cross product in display pixels, amplitude-major
    pub fn scaled_conditions(&self) -> Vec<Condition> {
        let scale = self.scale_factor();
        self.amplitudes
            .iter()
            .flat_map(|a| {
                self.widths
                    .iter()
                    .map(move |w| Condition::new(a * scale, w * scale))
            })
            .collect()
    }

    /// Scaled conditions in a random order
    pub fn conditions_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Condition> {
        let mut conditions = self.scaled_conditions();
        conditions.shuffle(rng);
        conditions
    }

    /// Scaled conditions shuffled with the thread-local generator
    pub fn conditions(&self) -> Vec<Condition> {
        self.conditions_with_rng(&mut rand::rng())
    }

    /// Width of the drag object: a quarter inch, or the smallest target if narrower
    pub fn drag_object_width(&self) -> f64 {
        let scale = self.scale_factor();
        let smallest = self
            .widths
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
            * scale;
        smallest.min(DRAG_OBJECT_WIDTH_DP * self.display.density)
    }

    /// Engine parameters for this configuration
    pub fn params(&self) -> ExperimentParams {
        ExperimentParams {
            codes: self.codes.clone(),
            dimension: self.mode,
            trials_per_sequence: self.trials_per_sequence(),
            target_count: self.target_count(),
            response: ResponseType::Serial,
            screen_center: self.display.center(),
            one_d_target_height: self.display.one_d_target_height(),
            start_region: self.display.start_region(),
            feedback: self.feedback,
        }
    }
}

/// Parameters the state machine runs a block with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentParams {
    pub codes: SessionCodes,
    pub dimension: TaskDimension,
    pub trials_per_sequence: usize,
    pub target_count: usize,
    pub response: ResponseType,
    pub screen_center: Point,
    pub one_d_target_height: f64,
    /// Finger-up inside this region starts the next sequence
    pub start_region: Target,
    pub feedback: FeedbackOptions,
}

impl ExperimentParams {
    /// Check the engine preconditions for these parameters
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.trials_per_sequence < 2 {
            return Err(ExperimentError::InvalidConfig(format!(
                "at least 2 trials per sequence are required, got {}",
                self.trials_per_sequence
            )));
        }
        if !(self.screen_center.x.is_finite() && self.screen_center.y.is_finite()) {
            return Err(ExperimentError::InvalidConfig(format!(
                "screen center must be finite, got ({}, {})",
                self.screen_center.x, self.screen_center.y
            )));
        }
        if !(self.one_d_target_height.is_finite() && self.one_d_target_height > 0.0) {
            return Err(ExperimentError::InvalidConfig(format!(
                "1D target height must be positive, got {}",
                self.one_d_target_height
            )));
        }
        match self.dimension {
            TaskDimension::OneD if self.target_count != 2 => {
                Err(ExperimentError::InvalidConfig(format!(
                    "1D task uses exactly 2 targets, got {}",
                    self.target_count
                )))
            }
            TaskDimension::TwoD if self.target_count < 3 || self.target_count % 2 == 0 => {
                Err(ExperimentError::InvalidConfig(format!(
                    "2D task needs an odd number of targets (at least 3), got {}",
                    self.target_count
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square_display() -> DisplayGeometry {
        DisplayGeometry {
            width: 1000.0,
            height: 1000.0,
            density: 2.0,
        }
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_values("120, 240, 480").unwrap(), vec![120.0, 240.0, 480.0]);
        assert_eq!(parse_values("25").unwrap(), vec![25.0]);
        assert_eq!(parse_values(" 50,100 ").unwrap(), vec![50.0, 100.0]);
        assert!(parse_values("50, wide").is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trials_per_sequence(), 15);
        assert_eq!(config.target_count(), 15);
    }

    #[test]
    fn test_one_d_uses_trial_count() {
        let config = ExperimentConfig {
            mode: TaskDimension::OneD,
            number_of_trials: 10,
            ..Default::default()
        };
        assert_eq!(config.trials_per_sequence(), 10);
        assert_eq!(config.target_count(), 2);
        assert_eq!(config.params().target_count, 2);
    }

    #[test]
    fn test_rejects_malformed_configs() {
        let empty = ExperimentConfig {
            widths: vec![],
            ..Default::default()
        };
        assert!(matches!(empty.validate(), Err(ExperimentError::InvalidConfig(_))));

        let zero = ExperimentConfig {
            amplitudes: vec![120.0, 0.0],
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let even = ExperimentConfig {
            number_of_targets: 8,
            ..Default::default()
        };
        assert!(even.validate().is_err());

        let one_trial = ExperimentConfig {
            mode: TaskDimension::OneD,
            number_of_trials: 1,
            ..Default::default()
        };
        assert!(one_trial.validate().is_err());
    }

    #[test]
    fn test_scaling_fills_display() {
        let config = ExperimentConfig {
            amplitudes: vec![120.0, 240.0, 480.0],
            widths: vec![50.0, 100.0],
            display: square_display(),
            ..Default::default()
        };
        // 1000 / (480 + 100 + 20)
        let scale = config.scale_factor();
        assert!((scale - 1000.0 / 600.0).abs() < 1e-12);

        let conditions = config.scaled_conditions();
        assert_eq!(conditions.len(), 6);
        assert!((conditions[0].amplitude - 200.0).abs() < 1e-9);
        assert!((conditions[1].width - 1000.0 / 6.0).abs() < 1e-9);
        assert!((conditions[5].amplitude - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let config = ExperimentConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = config.conditions_with_rng(&mut rng);

        let key = |c: &Condition| (c.amplitude.to_bits(), c.width.to_bits());
        let mut a: Vec<_> = shuffled.iter().map(key).collect();
        let mut b: Vec<_> = config.scaled_conditions().iter().map(key).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let config = ExperimentConfig::default();
        let first = config.conditions_with_rng(&mut StdRng::seed_from_u64(42));
        let second = config.conditions_with_rng(&mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_drag_object_width() {
        let config = ExperimentConfig {
            widths: vec![10.0, 100.0],
            amplitudes: vec![480.0],
            display: square_display(),
            ..Default::default()
        };
        // smallest scaled width 10 * 1000/600 ≈ 16.7 < 40 * 2
        assert!((config.drag_object_width() - 10.0 * 1000.0 / 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_from_json_with_defaults() {
        let json = r#"{
            "codes": {"participant": "P03", "session": "S01", "block": "B02", "group": "G01", "condition": "C01"},
            "mode": "1D",
            "number_of_trials": 8,
            "amplitudes": [240, 480],
            "widths": [25],
            "display": {"width": 800, "height": 1280}
        }"#;
        let config = ExperimentConfig::from_json(json).unwrap();
        assert_eq!(config.codes.participant, "P03");
        assert_eq!(config.mode, TaskDimension::OneD);
        assert_eq!(config.display.density, 1.0);
        assert_eq!(config.number_of_targets, 15);
        assert!(config.feedback.show_all_targets);
    }

    #[test]
    fn test_start_region_in_corner() {
        let display = square_display();
        let start = display.start_region();
        assert!((start.center.x - 106.0).abs() < 1e-9);
        assert!(start.contains(Point::new(106.0, 106.0)));
        assert!(!start.contains(Point::new(500.0, 500.0)));
    }

    #[test]
    fn test_params_reject_degenerate_display() {
        let config = ExperimentConfig {
            mode: TaskDimension::OneD,
            ..Default::default()
        };
        assert!(config.params().validate().is_ok());

        let mut flat = config.params();
        flat.one_d_target_height = 0.0;
        assert!(matches!(flat.validate(), Err(ExperimentError::InvalidConfig(_))));

        let mut lost = config.params();
        lost.screen_center = Point::new(f64::NAN, 100.0);
        assert!(matches!(lost.validate(), Err(ExperimentError::InvalidConfig(_))));
    }
}
