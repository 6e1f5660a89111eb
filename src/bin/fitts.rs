//! Fitts CLI - Command-line interface for the Fitts drag-and-drop engine
//!
//! Commands:
//! - replay: Drive a block with recorded touch events and emit NDJSON records
//! - analyze: Compute sequence throughput from recorded trial samples
//! - conditions: Print the scaled, shuffled condition list for a setup

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use fitts_dnd::types::outlier_notice_lines;
use fitts_dnd::{
    parse_values, Condition, ExperimentConfig, ExperimentError, ExperimentPhase,
    ExperimentStateMachine, RecordEncoder, ResponseType, RestartReason, TaskDimension,
    ThroughputAnalyzer, TouchEvent, TrialSample, ENGINE_VERSION,
};

/// Fitts - Trial/sequence engine for Fitts' law drag-and-drop experiments
#[derive(Parser)]
#[command(name = "fitts")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Run and analyze ISO 9241-411 drag-and-drop blocks", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded touch events through one block
    Replay {
        /// Experiment configuration (JSON); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Touch events, one JSON object per line (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Seed for the condition shuffle
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Compute throughput for one sequence of trial samples
    Analyze {
        /// JSON array of trial samples (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Nominal amplitude in pixels
        #[arg(long)]
        amplitude: f64,

        /// Nominal target width in pixels
        #[arg(long)]
        width: f64,

        /// Task dimensionality
        #[arg(long, default_value = "2d")]
        mode: ModeArg,

        /// Response type
        #[arg(long, default_value = "serial")]
        response: ResponseArg,
    },

    /// Print the condition list for a setup
    Conditions {
        /// Amplitudes, e.g. "120, 240, 480"
        #[arg(long, default_value = "120, 240, 480")]
        amplitudes: String,

        /// Widths, e.g. "50, 100"
        #[arg(long, default_value = "50, 100")]
        widths: String,

        /// Seed for the shuffle
        #[arg(long)]
        seed: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum ModeArg {
    #[value(name = "1d")]
    OneD,
    #[value(name = "2d")]
    TwoD,
}

impl From<ModeArg> for TaskDimension {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::OneD => TaskDimension::OneD,
            ModeArg::TwoD => TaskDimension::TwoD,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum ResponseArg {
    Serial,
    Discrete,
}

impl From<ResponseArg> for ResponseType {
    fn from(response: ResponseArg) -> Self {
        match response {
            ResponseArg::Serial => ResponseType::Serial,
            ResponseArg::Discrete => ResponseType::Discrete,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), FittsCliError> {
    match cli.command {
        Commands::Replay {
            config,
            input,
            output,
            seed,
        } => cmd_replay(config.as_deref(), &input, &output, seed),

        Commands::Analyze {
            input,
            amplitude,
            width,
            mode,
            response,
        } => cmd_analyze(&input, amplitude, width, mode.into(), response.into()),

        Commands::Conditions {
            amplitudes,
            widths,
            seed,
            json,
        } => cmd_conditions(&amplitudes, &widths, seed, json),
    }
}

fn cmd_replay(
    config: Option<&Path>,
    input: &Path,
    output: &Path,
    seed: Option<u64>,
) -> Result<(), FittsCliError> {
    let config = match config {
        Some(path) => ExperimentConfig::from_json(&fs::read_to_string(path)?)?,
        None => {
            let config = ExperimentConfig::default();
            config.validate()?;
            config
        }
    };

    let conditions = shuffled_conditions(&config, seed);
    let mut machine = ExperimentStateMachine::begin_block(conditions, config.params())?;
    let encoder = RecordEncoder::new();

    let reader: Box<dyn BufRead> = if is_stdin(input) {
        if atty::is(atty::Stream::Stdin) {
            info!("Reading touch events from the terminal, end with Ctrl-D");
        }
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(input)?))
    };

    let mut out: Box<dyn Write> = if is_stdin(output) {
        Box::new(io::stdout())
    } else {
        Box::new(fs::File::create(output)?)
    };

    let mut events = 0usize;
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: TouchEvent = serde_json::from_str(trimmed).map_err(|e| {
            FittsCliError::ParseError(format!("line {}: {}", line_number + 1, e))
        })?;
        events += 1;

        match machine.on_touch_event(event) {
            Ok(Some(trial)) => debug!(
                sequence = trial.sequence,
                trial = trial.trial,
                attempt = trial.attempt,
                "Trial finalized"
            ),
            Ok(None) => {}
            Err(
                e @ (ExperimentError::DegenerateSequence(_)
                | ExperimentError::InsufficientTrials(_)),
            ) => warn!(error = %e, "Sequence discarded"),
            Err(e) => return Err(e.into()),
        }

        if machine.take_restart_notice() == Some(RestartReason::Outlier) {
            for notice in outlier_notice_lines().iter().filter(|l| !l.is_empty()) {
                debug!("{notice}");
            }
        }

        if machine.phase() == ExperimentPhase::SequenceComplete {
            if let Some(record) = machine.on_sequence_boundary() {
                for summary in record.summary_lines() {
                    debug!("{summary}");
                }
                for trial in &record.trial_records {
                    write!(out, "{}", encoder.encode_trial(trial)?)?;
                }
                write!(out, "{}", encoder.encode_sequence(&record)?)?;
            }
        }
    }

    if machine.is_block_complete() {
        let summary = machine.finish()?;
        write!(out, "{}", encoder.encode_block(&summary)?)?;
        info!(
            events,
            sequences = summary.sequences_completed,
            mean_throughput_bps = summary.mean_throughput_bps,
            "Replay finished"
        );
    } else {
        warn!(
            events,
            completed = machine.sequences_completed(),
            total = machine.conditions().len(),
            "Input ended before the block was complete"
        );
    }

    out.flush()?;
    Ok(())
}

fn cmd_analyze(
    input: &Path,
    amplitude: f64,
    width: f64,
    mode: TaskDimension,
    response: ResponseType,
) -> Result<(), FittsCliError> {
    let input_data = if is_stdin(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let samples: Vec<TrialSample> = serde_json::from_str(&input_data)?;
    if samples.is_empty() {
        return Err(FittsCliError::NoSamples);
    }

    let summary = ThroughputAnalyzer::analyze(amplitude, width, mode, response, &samples)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_conditions(
    amplitudes: &str,
    widths: &str,
    seed: Option<u64>,
    json: bool,
) -> Result<(), FittsCliError> {
    let config = ExperimentConfig {
        amplitudes: parse_values(amplitudes)?,
        widths: parse_values(widths)?,
        ..ExperimentConfig::default()
    };
    config.validate()?;

    let conditions = shuffled_conditions(&config, seed);
    let report = ConditionsReport {
        scale_factor: config.scale_factor(),
        drag_object_width: config.drag_object_width(),
        conditions,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Conditions");
        println!("==========");
        println!("Scale factor:      {:.3}", report.scale_factor);
        println!("Drag object width: {:.1} px", report.drag_object_width);
        println!();
        for (i, c) in report.conditions.iter().enumerate() {
            println!("  {:>2}. A = {:>6.1} px  W = {:>5.1} px", i + 1, c.amplitude, c.width);
        }
    }

    Ok(())
}

// Helper functions

fn shuffled_conditions(config: &ExperimentConfig, seed: Option<u64>) -> Vec<Condition> {
    match seed {
        Some(seed) => config.conditions_with_rng(&mut StdRng::seed_from_u64(seed)),
        None => config.conditions(),
    }
}

fn is_stdin(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

// Error types

#[derive(Debug)]
enum FittsCliError {
    Io(io::Error),
    Experiment(ExperimentError),
    Json(serde_json::Error),
    ParseError(String),
    NoSamples,
}

impl From<io::Error> for FittsCliError {
    fn from(e: io::Error) -> Self {
        FittsCliError::Io(e)
    }
}

impl From<ExperimentError> for FittsCliError {
    fn from(e: ExperimentError) -> Self {
        FittsCliError::Experiment(e)
    }
}

impl From<serde_json::Error> for FittsCliError {
    fn from(e: serde_json::Error) -> Self {
        FittsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FittsCliError> for CliError {
    fn from(e: FittsCliError) -> Self {
        match e {
            FittsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FittsCliError::Experiment(e) => {
                let hint = match &e {
                    ExperimentError::InvalidConfig(_) | ExperimentError::ParseError(_) => {
                        "Check the experiment setup values"
                    }
                    ExperimentError::NonMonotonicTimestamp { .. } => {
                        "Touch events must be sorted by timestamp"
                    }
                    _ => "Run with --verbose for details",
                };
                CliError {
                    code: "EXPERIMENT_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FittsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FittsCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Expected one touch event per line: {\"phase\":\"down\",\"x\":..,\"y\":..,\"timestamp_ms\":..}".to_string()),
            },
            FittsCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No trial samples found in input".to_string(),
                hint: Some("Ensure input is a non-empty JSON array".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ConditionsReport {
    scale_factor: f64,
    drag_object_width: f64,
    conditions: Vec<Condition>,
}
