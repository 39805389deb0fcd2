//! Tracing subscriber setup shared by the rcsum binaries.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{ChecksumConfig, EnvParser};

/// Where and how log events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `rcsum_common=debug`.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
    /// Write to stderr (stdout is reserved for checksum output).
    pub stderr: bool,
    /// Also append to this file.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Read `RCSUM_LOG_LEVEL`, `RCSUM_LOG_JSON` and `RCSUM_LOG_FILE`.
    ///
    /// Invalid values fall back to the defaults; configuration loading is
    /// where they get reported.
    pub fn from_env(default_level: &str) -> Self {
        let mut parser = EnvParser::new();
        let level = parser.get_log_level("LOG_LEVEL", default_level).value;
        let json = parser.get_bool("LOG_JSON", false).value;
        let file = parser
            .get_optional_string("LOG_FILE")
            .value
            .map(PathBuf::from);
        Self {
            level,
            json,
            stderr: false,
            file,
        }
    }

    /// Take level and format from a loaded configuration.
    pub fn from_config(config: &ChecksumConfig) -> Self {
        Self {
            level: config.log_level.value.clone(),
            json: config.log_json.value,
            stderr: false,
            file: LogConfig::from_env("info").file,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stderr: true,
            file: None,
        }
    }
}

/// Keeps the non-blocking file writer alive; drop it last.
#[must_use = "dropping the guards stops file logging"]
#[derive(Default)]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> std::io::Result<LoggingGuards> {
    let mut guards = LoggingGuards::default();

    let console_layer = config.stderr.then(|| {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        if config.json {
            layer.json().boxed()
        } else {
            layer.compact().boxed()
        }
    });

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            guards._file = Some(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed(),
            )
        }
        None => None,
    };

    // A subscriber may already be installed (tests, embedding binaries).
    let _ = tracing_subscriber::registry()
        .with(config.filter())
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(guards)
}
