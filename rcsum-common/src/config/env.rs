//! `RCSUM_*` environment variables.
//!
//! Each getter returns a [`Sourced`] value so callers can tell an explicit
//! setting from a default. Malformed values fall back to the default and are
//! remembered, so one bad variable does not hide the next.

use super::source::Sourced;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const PREFIX: &str = "RCSUM_";
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("{var}='{value}' is not a valid {expected}")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("{var}='{value}' is not a duration (try '30s' or '2m')")]
    InvalidDuration { var: String, value: String },

    #[error("{var}='{value}' is not a log level ({})", LOG_LEVELS.join(", "))]
    InvalidLogLevel { var: String, value: String },
}

/// Reads prefixed variables and accumulates parse failures.
#[derive(Debug, Default)]
pub struct EnvParser {
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// `(full variable name, value)` if the variable is set.
    fn read(name: &str) -> Option<(String, String)> {
        let var = format!("{PREFIX}{name}");
        env::var(&var).ok().map(|value| (var, value))
    }

    /// Parse a set variable with `parse`, recording the error and keeping
    /// `default` when it fails.
    fn parse_or_record<T>(
        &mut self,
        name: &str,
        default: T,
        parse: impl FnOnce(&str) -> Option<T>,
        error: impl FnOnce(String, String) -> EnvError,
    ) -> Sourced<T> {
        let Some((var, raw)) = Self::read(name) else {
            return Sourced::default_value(default);
        };
        match parse(&raw) {
            Some(value) => Sourced::from_env(value, var),
            None => {
                self.errors.push(error(var.clone(), raw));
                Sourced::from_env(default, var)
            }
        }
    }

    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        match Self::read(name) {
            Some((var, value)) => Sourced::from_env(value, var),
            None => Sourced::default_value(default.to_string()),
        }
    }

    /// `1/true/yes/on` and `0/false/no/off/""`, case-insensitive.
    pub fn get_bool(&mut self, name: &str, default: bool) -> Sourced<bool> {
        self.parse_or_record(name, default, parse_bool, |var, value| {
            EnvError::InvalidValue {
                var,
                expected: "boolean".to_string(),
                value,
            }
        })
    }

    /// Humantime syntax: `30s`, `2m`, `1h 30m`.
    pub fn get_duration(&mut self, name: &str, default: Duration) -> Sourced<Duration> {
        self.parse_or_record(
            name,
            default,
            |raw| humantime::parse_duration(raw.trim()).ok(),
            |var, value| EnvError::InvalidDuration { var, value },
        )
    }

    /// A path, with a leading `~/` expanded.
    pub fn get_path(&mut self, name: &str, default: &str) -> Sourced<PathBuf> {
        match Self::read(name) {
            Some((var, value)) => Sourced::from_env(expand_home(&value), var),
            None => Sourced::default_value(expand_home(default)),
        }
    }

    /// One of `trace`..`error` or `off`, normalised to lowercase.
    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        self.parse_or_record(
            name,
            default.to_string(),
            |raw| {
                let level = raw.to_lowercase();
                LOG_LEVELS.contains(&level.as_str()).then_some(level)
            },
            |var, value| EnvError::InvalidLogLevel { var, value },
        )
    }

    /// `None` when unset or empty.
    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        match Self::read(name) {
            Some((var, value)) => Sourced::from_env(Some(value).filter(|v| !v.is_empty()), var),
            None => Sourced::default_value(None),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}
