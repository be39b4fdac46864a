mod config;

use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn, LevelFilter};
use rusty_scpi::agilent4156::{
    Agilent4156, AnalyzerMode, ConfigurationDocument, MeasuredData, SamplingPeriod, Timing,
};
use rusty_scpi::{plot_columns, ScpiError, TcpAdapter};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::config::{load_config, AppConfig};

/// I-V sweeps on an Agilent 4155/4156 parameter analyzer
#[derive(Parser, Debug)]
#[command(name = "iv-sweep")]
#[command(about = "Configure, run and export a parameter analyzer measurement", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the output directory for measured data
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.console.verbosity.clone());
    initialize_logging(&log_level)?;
    log_startup_info(&config, args.config.as_ref());

    let document = ConfigurationDocument::from_path(&config.measurement.channel_config)?;
    let mut analyzer = connect(&config)?;

    let output_dir = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.measurement.output_dir));

    match run(&mut analyzer, &config, &document, output_dir) {
        Ok(data) => {
            info!("✓ Measurement complete: {} rows", data.n_rows());
            if config.measurement.plot {
                plot_columns(&data, None, None)?;
            }
            Ok(())
        }
        Err(e) => {
            error!("✗ Measurement failed: {}", e);
            if let Err(stop_err) = analyzer.stop() {
                warn!("Could not stop the analyzer: {}", stop_err);
            }
            Err(e.into())
        }
    }
}

// Helper Functions

/// Log startup information
fn log_startup_info(config: &AppConfig, config_path: Option<&PathBuf>) {
    info!("=== IV Sweep ===");
    match config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: defaults"),
    }
    info!(
        "Analyzer: {}:{}",
        config.connection.host, config.connection.port
    );
    info!(
        "Channel setup: {}",
        config.measurement.channel_config.display()
    );
}

/// Open the connection and identify the instrument
fn connect(config: &AppConfig) -> Result<Agilent4156<TcpAdapter>, ScpiError> {
    let connection = &config.connection;
    let adapter = TcpAdapter::builder()
        .address(&connection.host)
        .port(connection.port)
        .connect_timeout(Duration::from_millis(connection.connect_timeout_ms))
        .read_timeout(Duration::from_millis(connection.read_timeout_ms))
        .write_timeout(Duration::from_millis(connection.write_timeout_ms))
        .read_termination(connection.read_termination_byte())
        .write_termination(&connection.write_termination)
        .build()?;

    let timing = Timing {
        settle_delay: Duration::from_millis(config.analyzer.settle_delay_ms),
        fetch_delay: Duration::from_millis(config.analyzer.fetch_delay_ms),
    };
    let mut analyzer = Agilent4156::with_timing(adapter, timing);
    let id = analyzer.instrument().id()?;
    info!("Connected to {}", id);
    Ok(analyzer)
}

/// Configure, measure and export
fn run(
    analyzer: &mut Agilent4156<TcpAdapter>,
    config: &AppConfig,
    document: &ConfigurationDocument,
    output_dir: PathBuf,
) -> Result<MeasuredData, ScpiError> {
    let settings = &config.analyzer;
    analyzer.set_analyzer_mode(settings.mode)?;
    analyzer.set_integration_time(settings.integration_time)?;
    if let Some(delay) = settings.delay_time_s {
        analyzer.set_delay_time(delay)?;
    }
    if let Some(hold) = settings.hold_time_s {
        analyzer.set_hold_time(hold)?;
    }
    info!(
        "Mode {}, integration time {}",
        settings.mode, settings.integration_time
    );

    analyzer.configure(document)?;

    let measurement = &config.measurement;
    analyzer.save_display_variables(measurement.display_variables.clone())?;
    if !measurement.extra_variables.is_empty() {
        analyzer.save_extra_variables(measurement.extra_variables.clone())?;
    }

    let period = measurement
        .sampling_period_s
        .map_or(SamplingPeriod::Infinite, SamplingPeriod::Seconds);
    if settings.mode == AnalyzerMode::Sampling && period == SamplingPeriod::Infinite {
        warn!("Sampling with an infinite period blocks until the run is stopped on the instrument");
    }
    info!("Starting measurement...");
    analyzer.measure_with(period, measurement.sampling_points)?;

    let path = create_data_file_path(&output_dir)?;
    analyzer.get_measured_data(Some(&path))
}

/// Initialize logging with configurable level
fn initialize_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();

    Ok(())
}

fn create_data_file_path(output_dir: &Path) -> Result<PathBuf, ScpiError> {
    fs::create_dir_all(output_dir).map_err(ScpiError::io(format!(
        "creating output directory {}",
        output_dir.display()
    )))?;

    let filename = format!("iv_sweep_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok(output_dir.join(filename))
}
