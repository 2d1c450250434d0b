//! Behavior CLI - Command-line interface for Synheart Behavior
//!
//! Commands:
//! - replay: Replay an NDJSON primitive stream through the engine
//! - validate: Check primitives against the normalizer's contract
//! - config: Print the default engine configuration
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use synheart_behavior::baseline::BaselineStore;
use synheart_behavior::clock::{Clock, ManualClock};
use synheart_behavior::encoder::encode_event;
use synheart_behavior::logging::init_logging;
use synheart_behavior::normalizer::{parse_primitive, EventNormalizer};
use synheart_behavior::{BehaviorError, EngineConfig, InteractionEngine, PRODUCER_NAME, VERSION};

/// Behavior - On-device interaction classification and behavioral features
#[derive(Parser)]
#[command(name = "behavior")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Classify interaction primitives into behavior events and features", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an NDJSON primitive stream, printing one wire event per line
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print a feature snapshot of this window after the stream ends
        #[arg(long)]
        snapshot: Option<String>,

        /// Load baselines from file
        #[arg(long)]
        load_baselines: Option<PathBuf>,

        /// Save baselines to file after processing
        #[arg(long)]
        save_baselines: Option<PathBuf>,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate an NDJSON primitive stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default engine configuration
    Config,

    /// Diagnose configuration and environment
    Doctor {
        /// Check an engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a baselines file
        #[arg(long)]
        baselines: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BehaviorCliError> {
    match cli.command {
        Commands::Replay {
            input,
            config,
            snapshot,
            load_baselines,
            save_baselines,
            flush,
        } => cmd_replay(
            &input,
            config.as_deref(),
            snapshot.as_deref(),
            load_baselines.as_deref(),
            save_baselines.as_deref(),
            flush,
        ),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Config => cmd_config(),

        Commands::Doctor {
            config,
            baselines,
            json,
        } => cmd_doctor(config.as_deref(), baselines.as_deref(), json),
    }
}

fn open_input(input: &Path) -> Result<Box<dyn BufRead>, BehaviorCliError> {
    if input.to_string_lossy() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(fs::File::open(input)?)))
    }
}

fn cmd_replay(
    input: &Path,
    config: Option<&Path>,
    snapshot: Option<&str>,
    load_baselines: Option<&Path>,
    save_baselines: Option<&Path>,
    flush: bool,
) -> Result<(), BehaviorCliError> {
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    init_logging(&config.log);

    // Replayed time follows the primitives, not the wall clock
    let clock = ManualClock::new(0);
    let mut engine = InteractionEngine::with_clock(config, Arc::new(clock.clone()))?;

    if let Some(window_kind) = snapshot {
        engine.reader().snapshot(window_kind)?;
    }

    if let Some(baselines_path) = load_baselines {
        let baselines_json = fs::read_to_string(baselines_path)?;
        engine.load_baselines(&baselines_json)?;
    }

    let mut stdout = io::stdout();
    let mut seen = 0usize;

    for line in open_input(input)?.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        seen += 1;

        // Rejected primitives are logged by the engine; the stream continues
        let Ok(raw) = parse_primitive(trimmed) else {
            tracing::warn!(line = seen, "skipping unparseable line");
            continue;
        };
        if raw.timestamp_ms > clock.now_ms() {
            clock.set(raw.timestamp_ms);
        }

        let mut emitted = engine.tick();
        if let Ok(events) = engine.ingest(&raw) {
            emitted.extend(events);
        }

        for event in &emitted {
            writeln!(stdout, "{}", encode_event(event)?)?;
        }
        if flush && !emitted.is_empty() {
            stdout.flush()?;
        }
    }

    if seen == 0 {
        return Err(BehaviorCliError::NoEvents);
    }

    for event in &engine.end_session() {
        writeln!(stdout, "{}", encode_event(event)?)?;
    }

    if let Some(window_kind) = snapshot {
        writeln!(stdout, "{}", engine.snapshot_json(window_kind)?)?;
    }
    stdout.flush()?;

    let stats = engine.stats();
    tracing::info!(
        accepted = stats.accepted,
        rejected = stats.rejected,
        emitted = stats.emitted,
        "replay finished"
    );

    if let Some(baselines_path) = save_baselines {
        let baselines_json = engine.save_baselines()?;
        fs::write(baselines_path, baselines_json)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), BehaviorCliError> {
    let mut normalizer = EventNormalizer::new();
    let mut report = ValidationReport {
        total_primitives: 0,
        valid_primitives: 0,
        invalid_primitives: 0,
        errors: Vec::new(),
    };

    for (index, line) in open_input(input)?.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        report.total_primitives += 1;

        let result = parse_primitive(trimmed).and_then(|raw| normalizer.normalize(&raw).map(|_| raw));
        match result {
            Ok(_) => report.valid_primitives += 1,
            Err(e) => {
                report.invalid_primitives += 1;
                report.errors.push(ValidationErrorDetail {
                    line: index + 1,
                    error: e.to_string(),
                });
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total primitives:   {}", report.total_primitives);
        println!("Valid primitives:   {}", report.valid_primitives);
        println!("Invalid primitives: {}", report.invalid_primitives);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_primitives > 0 {
        Err(BehaviorCliError::ValidationFailed(report.invalid_primitives))
    } else {
        Ok(())
    }
}

fn cmd_config() -> Result<(), BehaviorCliError> {
    println!("{}", serde_json::to_string_pretty(&EngineConfig::default())?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, baselines: Option<&Path>, json: bool) -> Result<(), BehaviorCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Behavior version {}", VERSION),
    });

    if let Some(config_path) = config {
        let check = match EngineConfig::load(config_path) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!("Config valid ({} windows)", config.windows.len()),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        };
        checks.push(check);
    }

    if let Some(baselines_path) = baselines {
        let check = if !baselines_path.exists() {
            DoctorCheck {
                name: "baselines".to_string(),
                status: CheckStatus::Warning,
                message: "Baselines file does not exist".to_string(),
            }
        } else {
            match fs::read_to_string(baselines_path)
                .map_err(BehaviorError::from)
                .and_then(|content| BaselineStore::from_json(&content).map_err(BehaviorError::from))
            {
                Ok(store) => DoctorCheck {
                    name: "baselines".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Baselines file valid (window size {})", store.window_size()),
                },
                Err(e) => DoctorCheck {
                    name: "baselines".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid baselines file: {}", e),
                },
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Behavior Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(BehaviorCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum BehaviorCliError {
    Io(io::Error),
    Engine(BehaviorError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for BehaviorCliError {
    fn from(e: io::Error) -> Self {
        BehaviorCliError::Io(e)
    }
}

impl From<BehaviorError> for BehaviorCliError {
    fn from(e: BehaviorError) -> Self {
        BehaviorCliError::Engine(e)
    }
}

impl From<serde_json::Error> for BehaviorCliError {
    fn from(e: serde_json::Error) -> Self {
        BehaviorCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BehaviorCliError> for CliError {
    fn from(e: BehaviorCliError) -> Self {
        match e {
            BehaviorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BehaviorCliError::Engine(e @ BehaviorError::ConfigError(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'behavior config' for a valid starting point".to_string()),
            },
            BehaviorCliError::Engine(e @ BehaviorError::UnknownWindow(_)) => CliError {
                code: "UNKNOWN_WINDOW".to_string(),
                message: e.to_string(),
                hint: Some("Use a window kind listed in the configuration".to_string()),
            },
            BehaviorCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            BehaviorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BehaviorCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No primitives found in input".to_string(),
                hint: Some("Ensure input is not empty".to_string()),
            },
            BehaviorCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} primitives failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            BehaviorCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_primitives: usize,
    valid_primitives: usize,
    invalid_primitives: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
