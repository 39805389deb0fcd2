//! Effective configuration for the hashers and the adb collaborator.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::env::{EnvError, EnvParser, expand_home};
use super::source::Sourced;
use crate::errors::ErrorCode;

/// Default build output directory holding the md5sum artifacts.
pub const DEFAULT_OUT_DIR: &str = "out/Release";
/// Default adb executable, resolved through PATH.
pub const DEFAULT_ADB_PATH: &str = "adb";
/// Default per-invocation adb timeout.
pub const DEFAULT_ADB_TIMEOUT: Duration = Duration::from_secs(60);
/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "rcsum.toml";

const HOST_BINARY_NAME: &str = "md5sum_bin_host";
const DIST_DIR_NAME: &str = "md5sum_dist";
const RUN_PIE_NAME: &str = "run_pie";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key} in {path}: {value}")]
    InvalidValue {
        path: PathBuf,
        key: &'static str,
        value: String,
    },

    #[error("Invalid environment: {}", join_errors(.0))]
    Env(Vec<EnvError>),
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } | Self::InvalidValue { .. } => ErrorCode::ConfigParseError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
        }
    }
}

/// On-disk shape of `rcsum.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub out_dir: Option<String>,
    pub adb_path: Option<String>,
    pub device_serial: Option<String>,
    /// humantime syntax, e.g. "90s".
    pub adb_timeout: Option<String>,
    pub log_level: Option<String>,
    pub log_json: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Effective configuration with per-value provenance.
#[derive(Debug, Clone, Serialize)]
pub struct ChecksumConfig {
    /// Build output directory containing `md5sum_bin_host`, `md5sum_dist` and `run_pie`.
    pub out_dir: Sourced<PathBuf>,
    pub adb_path: Sourced<String>,
    /// `adb -s` serial; `None` lets adb pick the only attached device.
    pub device_serial: Sourced<Option<String>>,
    pub adb_timeout: Sourced<Duration>,
    pub log_level: Sourced<String>,
    pub log_json: Sourced<bool>,
    /// Config file that contributed values, if any.
    pub config_file: Option<PathBuf>,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            out_dir: Sourced::default_value(PathBuf::from(DEFAULT_OUT_DIR)),
            adb_path: Sourced::default_value(DEFAULT_ADB_PATH.to_string()),
            device_serial: Sourced::default_value(None),
            adb_timeout: Sourced::default_value(DEFAULT_ADB_TIMEOUT),
            log_level: Sourced::default_value("info".to_string()),
            log_json: Sourced::default_value(false),
            config_file: None,
        }
    }
}

impl ChecksumConfig {
    /// Configuration rooted at `out_dir`, everything else default.
    pub fn with_out_dir(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: Sourced::from_cli(out_dir.into()),
            ..Self::default()
        }
    }

    /// Load defaults, then the config file, then the environment.
    ///
    /// The file is `explicit` if given, else `RCSUM_CONFIG`, else
    /// `./rcsum.toml`, else `<config dir>/rcsum/config.toml`. A missing
    /// implicit file is fine; a missing explicit one is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let mut parser = EnvParser::new();
        let env_file = parser.get_optional_string("CONFIG").value;

        let file = match (explicit, env_file) {
            (Some(path), _) => Some(path.to_path_buf()),
            (None, Some(path)) => Some(expand_home(&path)),
            (None, None) => discover_config_file(),
        };

        if let Some(path) = file {
            let file_config = FileConfig::load(&path)?;
            config.apply_file(&file_config, &path)?;
            config.config_file = Some(path);
        }

        config.apply_env(&mut parser);
        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }

        debug!(
            out_dir = %config.out_dir.value.display(),
            adb = %config.adb_path.value,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn apply_file(&mut self, file: &FileConfig, path: &Path) -> Result<(), ConfigError> {
        if let Some(out_dir) = &file.out_dir {
            self.out_dir = Sourced::from_file(expand_home(out_dir), path);
        }
        if let Some(adb_path) = &file.adb_path {
            self.adb_path = Sourced::from_file(adb_path.clone(), path);
        }
        if let Some(serial) = &file.device_serial {
            self.device_serial = Sourced::from_file(Some(serial.clone()), path);
        }
        if let Some(timeout) = &file.adb_timeout {
            let parsed =
                humantime::parse_duration(timeout).map_err(|_| ConfigError::InvalidValue {
                    path: path.to_path_buf(),
                    key: "adb_timeout",
                    value: timeout.clone(),
                })?;
            self.adb_timeout = Sourced::from_file(parsed, path);
        }
        if let Some(level) = &file.log_level {
            self.log_level = Sourced::from_file(level.to_lowercase(), path);
        }
        if let Some(json) = file.log_json {
            self.log_json = Sourced::from_file(json, path);
        }
        Ok(())
    }

    fn apply_env(&mut self, parser: &mut EnvParser) {
        self.out_dir
            .override_with(parser.get_path("OUT_DIR", DEFAULT_OUT_DIR));
        self.adb_path
            .override_with(parser.get_string("ADB_PATH", DEFAULT_ADB_PATH));
        self.device_serial
            .override_with(parser.get_optional_string("DEVICE_SERIAL"));
        self.adb_timeout
            .override_with(parser.get_duration("ADB_TIMEOUT", DEFAULT_ADB_TIMEOUT));
        self.log_level
            .override_with(parser.get_log_level("LOG_LEVEL", "info"));
        self.log_json.override_with(parser.get_bool("LOG_JSON", false));
    }

    /// Host checksum executable.
    pub fn host_binary(&self) -> PathBuf {
        self.out_dir.value.join(HOST_BINARY_NAME)
    }

    /// Device bundle (binary plus shared libraries) pushed on first use.
    pub fn dist_dir(&self) -> PathBuf {
        self.out_dir.value.join(DIST_DIR_NAME)
    }

    /// Host copy of the PIE launcher for pre-Jelly Bean devices.
    pub fn run_pie_path(&self) -> PathBuf {
        self.out_dir.value.join(RUN_PIE_NAME)
    }
}

fn join_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("rcsum").join("config.toml");
    user.is_file().then_some(user)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;
    use crate::config::source::ConfigSource;
    use std::env;

    const VARS: &[&str] = &[
        "RCSUM_CONFIG",
        "RCSUM_OUT_DIR",
        "RCSUM_ADB_PATH",
        "RCSUM_DEVICE_SERIAL",
        "RCSUM_ADB_TIMEOUT",
        "RCSUM_LOG_LEVEL",
        "RCSUM_LOG_JSON",
    ];

    fn cleanup_env() {
        for var in VARS {
            // SAFETY: Tests are serialized via env_test_lock
            unsafe { env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: Tests are serialized via env_test_lock
        unsafe { env::set_var(key, value) };
    }

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("rcsum.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_derived_paths() {
        let config = ChecksumConfig::with_out_dir("/src/out/Debug");
        assert_eq!(
            config.host_binary(),
            PathBuf::from("/src/out/Debug/md5sum_bin_host")
        );
        assert_eq!(config.dist_dir(), PathBuf::from("/src/out/Debug/md5sum_dist"));
        assert_eq!(config.run_pie_path(), PathBuf::from("/src/out/Debug/run_pie"));
        assert_eq!(config.out_dir.source, ConfigSource::CommandLine);
    }

    #[test]
    fn test_load_file_then_env() {
        let _guard = env_test_lock();
        cleanup_env();

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
out_dir = "/build/out/Debug"
device_serial = "0123456789ABCDEF"
adb_timeout = "90s"
"#,
        );
        set_env("RCSUM_DEVICE_SERIAL", "emulator-5554");

        let config = ChecksumConfig::load(Some(&path)).unwrap();
        assert_eq!(config.out_dir.value, PathBuf::from("/build/out/Debug"));
        assert_eq!(config.out_dir.source, ConfigSource::File(path.clone()));
        assert_eq!(config.adb_timeout.value, Duration::from_secs(90));
        assert_eq!(
            config.device_serial.value.as_deref(),
            Some("emulator-5554")
        );
        assert_eq!(config.device_serial.source, ConfigSource::Environment);
        assert_eq!(config.adb_path.value, DEFAULT_ADB_PATH);
        assert_eq!(config.config_file.as_deref(), Some(path.as_path()));

        cleanup_env();
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let _guard = env_test_lock();
        cleanup_env();

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "outdir = \"typo\"\n");
        let err = ChecksumConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
    }

    #[test]
    fn test_load_rejects_bad_timeout_in_file() {
        let _guard = env_test_lock();
        cleanup_env();

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "adb_timeout = \"whenever\"\n");
        let err = ChecksumConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "adb_timeout",
                ..
            }
        ));
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let _guard = env_test_lock();
        cleanup_env();

        let err = ChecksumConfig::load(Some(Path::new("/nonexistent/rcsum.toml"))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigReadError);
    }

    #[test]
    fn test_load_collects_env_errors() {
        let _guard = env_test_lock();
        cleanup_env();

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");
        set_env("RCSUM_ADB_TIMEOUT", "never");
        set_env("RCSUM_LOG_LEVEL", "chatty");

        let err = ChecksumConfig::load(Some(&path)).unwrap_err();
        match err {
            ConfigError::Env(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }

        cleanup_env();
    }

    #[test]
    fn test_config_env_var_selects_file() {
        let _guard = env_test_lock();
        cleanup_env();

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "adb_path = \"/opt/sdk/platform-tools/adb\"\n");
        set_env("RCSUM_CONFIG", path.to_str().unwrap());

        let config = ChecksumConfig::load(None).unwrap();
        assert_eq!(config.adb_path.value, "/opt/sdk/platform-tools/adb");

        cleanup_env();
    }
}
