//! rcsum - checksum files on the host or on an attached Android device.
//!
//! Prints `<checksum>  <path>` per hashed file, or JSON with `--json`.
//! `compare` exits with status 1 when any device copy is stale.

#![forbid(unsafe_code)]

mod commands;

use clap::{Parser, Subcommand};
use rcsum_common::config::Sourced;
use rcsum_common::{ChecksumConfig, ChecksumError, LogConfig, init_logging};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "rcsum")]
#[command(author, version, about = "Compute MD5 checksums on the host or an Android device")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Build output directory holding md5sum_bin_host and md5sum_dist
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Config file (default: ./rcsum.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash paths on this machine
    Host {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail if any path produced no checksum
        #[arg(long)]
        strict: bool,
    },

    /// Hash paths on an attached device
    Device {
        #[arg(required = true)]
        paths: Vec<String>,

        /// adb serial of the target device
        #[arg(short, long)]
        serial: Option<String>,

        /// Fail if any path produced no checksum
        #[arg(long)]
        strict: bool,
    },

    /// List host files whose device copy is missing or different
    Compare {
        /// HOST_PATH:DEVICE_PATH, repeatable
        #[arg(long = "pair", required = true, value_parser = parse_pair)]
        pairs: Vec<(String, String)>,

        /// adb serial of the target device
        #[arg(short, long)]
        serial: Option<String>,
    },

    /// Show the effective configuration and where each value came from
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => return report_error(&ChecksumError::from(err).into()),
    };

    let mut log_config = LogConfig::from_config(&config).with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => guards,
        Err(err) => {
            eprintln!("rcsum: failed to initialize logging: {err}");
            return ExitCode::from(2);
        }
    };
    debug!(config_file = ?config.config_file, "Starting rcsum");

    match run(cli, config).await {
        Ok(code) => code,
        Err(err) => report_error(&err),
    }
}

async fn run(cli: Cli, mut config: ChecksumConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Host { paths, strict } => commands::host(paths, strict, &config, cli.json).await,
        Commands::Device {
            paths,
            serial,
            strict,
        } => {
            apply_serial(&mut config, serial);
            commands::device(paths, strict, &config, cli.json).await
        }
        Commands::Compare { pairs, serial } => {
            apply_serial(&mut config, serial);
            commands::compare(&pairs, &config, cli.json).await
        }
        Commands::Config => commands::show_config(&config, cli.json),
    }
}

fn load_config(cli: &Cli) -> Result<ChecksumConfig, rcsum_common::config::ConfigError> {
    let mut config = ChecksumConfig::load(cli.config.as_deref())?;
    if let Some(out_dir) = &cli.out_dir {
        config.out_dir = Sourced::from_cli(out_dir.clone());
    }
    Ok(config)
}

fn apply_serial(config: &mut ChecksumConfig, serial: Option<String>) {
    if let Some(serial) = serial {
        config.device_serial = Sourced::from_cli(Some(serial));
    }
}

/// Print an error, with catalog remediation when it is one of ours.
fn report_error(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<ChecksumError>() {
        Some(checksum_err) => {
            eprintln!("rcsum: {checksum_err}");
            eprint!("{}", checksum_err.code().entry().format_full());
        }
        None => eprintln!("rcsum: {err:#}"),
    }
    ExitCode::from(2)
}

fn parse_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once(':') {
        Some((host, device)) if !host.is_empty() && !device.is_empty() => {
            Ok((host.to_string(), device.to_string()))
        }
        _ => Err(format!("expected HOST_PATH:DEVICE_PATH, got '{value}'")),
    }
}
