//! Drift Sentinel - drift analysis and rupture detection CLI
//!
//! The main entry point for ds-core, handling:
//! - Engine runs over forecast/actual CSV series (`analyze`)
//! - Epistemic diagnostics over engine output tables (`enrich`)
//! - Synthetic demo data generation (`demo`)
//! - Input contract validation (`check`)
//!
//! stdout carries the command payload (CSV or JSON); logs and errors go
//! to stderr so pipelines stay parseable.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use ds_common::table::{format_timestamp, DriftTable, RawFrame};
use ds_common::{format_error_human, Error, OutputFormat, StructuredError, SCHEMA_VERSION};
use ds_config::{
    BaselineMode, ColumnMap, EngineConfig, EngineOverrides, EpistemicConfig, StrategyKind,
    ValidationError,
};
use ds_core::backend::BackendRegistry;
use ds_core::engine::Engine;
use ds_core::exit_codes::ExitCode;
use ds_core::logging::{generate_run_id, init_logging, LogConfig};
use ds_core::models::ModelRegistry;
use ds_core::prep::rows_from_frame;
use ds_core::report::Report;
use ds_core::synth;

/// Drift Sentinel - rupture detection over forecast/actual series
#[derive(Parser)]
#[command(name = "ds-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit log events as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the drift engine over an input CSV
    Analyze(AnalyzeArgs),

    /// Compute epistemic diagnostics over an engine output table
    Enrich(EnrichArgs),

    /// Generate a synthetic input CSV
    Demo(DemoArgs),

    /// Validate an input CSV against the input contract
    Check(CheckArgs),
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Input CSV path
    #[arg(long)]
    input: PathBuf,

    /// Engine config JSON (sparse; flags override individual fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Segment column name
    #[arg(long)]
    segment_col: Option<String>,

    /// Boolean policy column name
    #[arg(long)]
    policy_col: Option<String>,

    /// Threshold strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Custom threshold model name (with --strategy custom)
    #[arg(long)]
    model: Option<String>,

    /// Custom model parameters as a JSON object
    #[arg(long)]
    params: Option<String>,

    /// Couple segment thresholds through the pressure graph
    #[arg(long)]
    coupled: bool,

    /// Write the output table here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the run report JSON here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Base threshold level
    #[arg(long)]
    base: Option<f64>,

    /// Memory-to-threshold coupling coefficient
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Fraction of drift absorbed into memory per calm step
    #[arg(long)]
    memory_gain: Option<f64>,

    /// Threshold noise scale (0 disables the draw)
    #[arg(long)]
    noise_sigma: Option<f64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// EWMA smoothing factor
    #[arg(long)]
    ewma_alpha: Option<f64>,

    /// EWMA band width in standard deviations
    #[arg(long)]
    ewma_k: Option<f64>,
}

#[derive(Args, Debug)]
struct EnrichArgs {
    /// Engine output CSV path
    #[arg(long)]
    input: PathBuf,

    /// Diagnostics config JSON (sparse; flags override individual fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// External baseline CSV with a drift column
    #[arg(long)]
    baseline_file: Option<PathBuf>,

    /// Baseline window length in window mode
    #[arg(long)]
    baseline_window: Option<usize>,

    /// Recent slice length (default: baseline length)
    #[arg(long)]
    recent_window: Option<usize>,

    /// Segment column for the by-group breakdown
    #[arg(long)]
    group_col: Option<String>,

    /// Boolean policy column for the policy split
    #[arg(long)]
    policy_col: Option<String>,

    /// Evaluation date for the expiry estimate (YYYY-MM-DD, default today)
    #[arg(long)]
    as_of: Option<chrono::NaiveDate>,

    /// Write the diagnostics report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Days to generate
    #[arg(long, default_value_t = synth::DEFAULT_DEMO_DAYS)]
    days: usize,

    /// Random seed
    #[arg(long, default_value_t = synth::DEFAULT_DEMO_SEED)]
    seed: u64,

    /// Comma-separated segment names; one stream per segment
    #[arg(long, value_delimiter = ',')]
    segments: Vec<String>,

    /// Write the CSV here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Input CSV path
    #[arg(long)]
    input: PathBuf,

    /// Segment column name
    #[arg(long)]
    segment_col: Option<String>,

    /// Boolean policy column name
    #[arg(long)]
    policy_col: Option<String>,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let log_config =
        LogConfig::from_flags(cli.global.verbose, cli.global.quiet, cli.global.log_json);
    init_logging(&log_config);

    let run_id = generate_run_id();
    let span = tracing::info_span!("cli", run_id = %run_id);
    let _guard = span.enter();

    let exit_code = match cli.command {
        Commands::Analyze(args) => run_analyze(&cli.global, &args),
        Commands::Enrich(args) => run_enrich(&cli.global, &args),
        Commands::Demo(args) => run_demo(&cli.global, &args),
        Commands::Check(args) => run_check(&cli.global, &args),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_analyze(global: &GlobalOpts, args: &AnalyzeArgs) -> ExitCode {
    // Semantic argument rules clap cannot express.
    if args.strategy == Some(StrategyKind::Custom) && args.model.is_none() {
        return fail_args(global, "--strategy custom requires --model");
    }
    if args.coupled && args.segment_col.is_none() {
        return fail_args(global, "--coupled requires --segment-col");
    }

    let base = match load_json_config::<EngineConfig>(global, args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(code) => return code,
    };
    let overrides = match analyze_overrides(args) {
        Ok(overrides) => overrides,
        Err(message) => return fail_args(global, &message),
    };
    let config = overrides.apply(base);

    let backends = if args.coupled {
        BackendRegistry::none().with_pressure_graph()
    } else {
        BackendRegistry::none()
    };
    let engine = match Engine::with_backends(config, ModelRegistry::default(), backends) {
        Ok(engine) => engine,
        Err(e) => return fail_config(global, &e),
    };

    info!(input = %args.input.display(), "analyze started");
    let frame = match read_frame(global, &args.input) {
        Ok(frame) => frame,
        Err(code) => return code,
    };
    let (table, report) = match engine.analyze(&frame) {
        Ok(pair) => pair,
        Err(e) => return fail(global, &e),
    };

    let csv = table.to_csv();
    match &args.out {
        Some(path) => {
            if let Err(e) = fs::write(path, &csv) {
                return fail(global, &Error::Io(e));
            }
        }
        None => print!("{csv}"),
    }

    emit_report(global, &report, args.report.as_deref(), args.out.is_some())
}

fn run_enrich(global: &GlobalOpts, args: &EnrichArgs) -> ExitCode {
    let base = match load_json_config::<EpistemicConfig>(global, args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(code) => return code,
    };
    let cfg = apply_enrich_flags(base, args);
    if let Err(e) = cfg.validate() {
        return fail_config(global, &e);
    }

    info!(input = %args.input.display(), "enrich started");
    let text = match fs::read_to_string(&args.input) {
        Ok(text) => text,
        Err(e) => return fail(global, &Error::Io(e)),
    };
    let table =
        match DriftTable::from_csv(&text, cfg.group_col.as_deref(), cfg.policy_col.as_deref()) {
            Ok(table) => table,
            Err(e) => return fail(global, &e),
        };
    let report = match ds_epistemic::enrich(&table, &cfg) {
        Ok(report) => report,
        Err(e) => return fail(global, &e),
    };

    match &args.out {
        Some(path) => {
            let json = match report.to_json_pretty() {
                Ok(json) => json,
                Err(e) => return fail(global, &Error::Json(e)),
            };
            if let Err(e) = fs::write(path, json) {
                return fail(global, &Error::Io(e));
            }
        }
        None => match global.format {
            OutputFormat::Json => match report.to_json_pretty() {
                Ok(json) => println!("{json}"),
                Err(e) => return fail(global, &Error::Json(e)),
            },
            OutputFormat::Summary => println!("{}", report.render_summary()),
        },
    }
    ExitCode::Success
}

fn run_demo(global: &GlobalOpts, args: &DemoArgs) -> ExitCode {
    let segments = (!args.segments.is_empty()).then(|| args.segments.clone());
    let csv = synth::demo_csv(args.days, args.seed, segments.as_deref());
    match &args.out {
        Some(path) => {
            if let Err(e) = fs::write(path, &csv) {
                return fail(global, &Error::Io(e));
            }
        }
        None => print!("{csv}"),
    }
    ExitCode::Success
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> ExitCode {
    let frame = match read_frame(global, &args.input) {
        Ok(frame) => frame,
        Err(code) => return code,
    };
    let columns = ColumnMap {
        segment: args.segment_col.clone(),
        policy: args.policy_col.clone(),
        ..ColumnMap::default()
    };
    let rows = match rows_from_frame(&frame, &columns) {
        Ok(rows) => rows,
        Err(e) => return fail(global, &e),
    };

    let segments: BTreeSet<&str> = rows.iter().filter_map(|r| r.segment.as_deref()).collect();
    let start = rows.first().map(|r| format_timestamp(r.timestamp));
    let end = rows.last().map(|r| format_timestamp(r.timestamp));

    match global.format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "ok": true,
                "rows": rows.len(),
                "segments": segments.len(),
                "start": start,
                "end": end,
            });
            println!("{}", serde_json::to_string_pretty(&payload).unwrap());
        }
        OutputFormat::Summary => {
            println!("ok: {} rows, {} segments", rows.len(), segments.len());
            if let (Some(start), Some(end)) = (&start, &end) {
                println!("span: {start} .. {end}");
            }
        }
    }
    ExitCode::Success
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Load a sparse JSON config file, or the default when no path is given.
fn load_json_config<T: serde::de::DeserializeOwned + Default>(
    global: &GlobalOpts,
    path: Option<&Path>,
) -> Result<T, ExitCode> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path).map_err(|e| fail(global, &Error::Io(e)))?;
    serde_json::from_str(&text)
        .map_err(|e| fail_args(global, &format!("config file {}: {e}", path.display())))
}

fn analyze_overrides(args: &AnalyzeArgs) -> Result<EngineOverrides, String> {
    let custom_params = match &args.params {
        Some(text) => Some(
            serde_json::from_str(text).map_err(|e| format!("--params is not valid JSON: {e}"))?,
        ),
        None => None,
    };
    Ok(EngineOverrides {
        strategy: args.strategy,
        base_threshold: args.base,
        sensitivity: args.sensitivity,
        memory_gain: args.memory_gain,
        noise_sigma: args.noise_sigma,
        seed: args.seed,
        ewma_alpha: args.ewma_alpha,
        ewma_k: args.ewma_k,
        prob_slope: None,
        prob_midpoint: None,
        custom_model: args.model.clone(),
        custom_params,
        coupled: args.coupled.then_some(true),
        segment_col: args.segment_col.clone(),
        policy_col: args.policy_col.clone(),
    })
}

fn apply_enrich_flags(mut cfg: EpistemicConfig, args: &EnrichArgs) -> EpistemicConfig {
    if let Some(path) = &args.baseline_file {
        cfg.baseline_mode = BaselineMode::File;
        cfg.baseline_file = Some(path.clone());
    }
    if let Some(n) = args.baseline_window {
        cfg.baseline_window = n;
    }
    if let Some(n) = args.recent_window {
        cfg.recent_window = Some(n);
    }
    if let Some(col) = &args.group_col {
        cfg.group_col = Some(col.clone());
    }
    if let Some(col) = &args.policy_col {
        cfg.policy_col = Some(col.clone());
    }
    if let Some(date) = args.as_of {
        cfg.as_of = Some(date);
    }
    cfg
}

/// Write the run report: to the requested file, else to stdout when the
/// table went to a file, else to stderr so stdout stays a clean CSV.
fn emit_report(
    global: &GlobalOpts,
    report: &Report,
    path: Option<&Path>,
    stdout_free: bool,
) -> ExitCode {
    if let Some(path) = path {
        let json = match report.to_json_pretty() {
            Ok(json) => json,
            Err(e) => return fail(global, &Error::Json(e)),
        };
        if let Err(e) = fs::write(path, json) {
            return fail(global, &Error::Io(e));
        }
        return ExitCode::Success;
    }

    let rendered = match global.format {
        OutputFormat::Json => match report.to_json_pretty() {
            Ok(json) => json,
            Err(e) => return fail(global, &Error::Json(e)),
        },
        OutputFormat::Summary => report.render_summary(),
    };
    if stdout_free {
        println!("{rendered}");
    } else {
        eprintln!("{rendered}");
    }
    ExitCode::Success
}

fn read_frame(global: &GlobalOpts, path: &Path) -> Result<RawFrame, ExitCode> {
    let text = fs::read_to_string(path).map_err(|e| fail(global, &Error::Io(e)))?;
    RawFrame::parse_csv(&text).map_err(|e| fail(global, &e))
}

/// Report a fatal error in the requested format; returns its exit code.
fn fail(global: &GlobalOpts, err: &Error) -> ExitCode {
    error!(code = err.code(), category = %err.category(), "{err}");
    match global.format {
        OutputFormat::Json => eprintln!("{}", StructuredError::from(err).to_json()),
        OutputFormat::Summary => eprintln!("{}", format_error_human(err)),
    }
    ExitCode::from(err)
}

/// Report a semantic argument error (exit 10).
fn fail_args(global: &GlobalOpts, message: &str) -> ExitCode {
    error!("{message}");
    match global.format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "code": ExitCode::ArgsError.as_i32(),
                "category": "args",
                "message": message,
            });
            eprintln!("{payload}");
        }
        OutputFormat::Summary => eprintln!("✗ {message}"),
    }
    ExitCode::ArgsError
}

/// Report a config validation failure (exit 10).
fn fail_config(global: &GlobalOpts, err: &ValidationError) -> ExitCode {
    fail_args(global, &format!("invalid configuration: {err}"))
}
