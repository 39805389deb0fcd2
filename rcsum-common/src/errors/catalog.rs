//! Error Catalog for rcsum
//!
//! Every failure the tool can report has a stable code (RCSUM-E001 and up),
//! a message, and remediation steps.
//!
//! Codes are grouped by hundreds:
//!
//! | Range      | Category     | Description                              |
//! |------------|--------------|------------------------------------------|
//! | E001-E099  | Config       | Configuration file and environment       |
//! | E100-E199  | Execution    | Host binary and adb command execution    |
//! | E200-E299  | Transfer     | Pushing files and device temp files      |
//! | E300-E399  | Verification | Checksum results and comparisons         |

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

/// Error code enumeration covering all rcsum error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Config, E001-E099
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML syntax
    ConfigParseError,
    /// Environment variable has invalid value
    ConfigEnvError,

    // Execution, E100-E199
    /// Checksum binary or adb executable not found
    ExecutableNotFound,
    /// Command could not be started
    CommandSpawnFailed,
    /// Command exited unsuccessfully
    CommandFailed,
    /// Command exceeded its timeout
    CommandTimeout,

    // Transfer, E200-E299
    /// adb push failed
    PushFailed,
    /// Device temp file could not be allocated
    DeviceTempFileFailed,
    /// Local filesystem error
    HostIoError,

    // Verification, E300-E399
    /// Value is not a 32-character hex digest
    InvalidChecksum,
    /// Strict mode found paths without checksums
    StrictPathsMissing,
    /// Device files differ from host files
    StaleFiles,
}

impl ErrorCode {
    /// Bare number, e.g. `103` for `RCSUM-E103`.
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigReadError => 1,
            Self::ConfigParseError => 2,
            Self::ConfigEnvError => 3,

            Self::ExecutableNotFound => 100,
            Self::CommandSpawnFailed => 101,
            Self::CommandFailed => 102,
            Self::CommandTimeout => 103,

            Self::PushFailed => 200,
            Self::DeviceTempFileFailed => 201,
            Self::HostIoError => 202,

            Self::InvalidChecksum => 300,
            Self::StrictPathsMissing => 301,
            Self::StaleFiles => 302,
        }
    }

    /// Returns the formatted error code string (e.g., "RCSUM-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("RCSUM-E{:03}", self.code_number())
    }

    /// Category implied by the hundreds digit of the code.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::for_number(self.code_number())
    }

    /// Owned, serializable view of this code.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        let remediation = self.remediation().iter().copied().map(String::from);
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().into(),
            remediation: remediation.collect(),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML syntax",
            Self::ConfigEnvError => "Environment variable has invalid value",
            Self::ExecutableNotFound => "Required executable not found",
            Self::CommandSpawnFailed => "Failed to start command",
            Self::CommandFailed => "Command exited unsuccessfully",
            Self::CommandTimeout => "Command timed out",
            Self::PushFailed => "Failed to push file to device",
            Self::DeviceTempFileFailed => "Failed to allocate device temp file",
            Self::HostIoError => "Local filesystem error",
            Self::InvalidChecksum => "Value is not a valid MD5 checksum",
            Self::StrictPathsMissing => "Some requested paths produced no checksum",
            Self::StaleFiles => "Device files differ from host files",
        }
    }

    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigReadError => &[
                "Check that the file named by RCSUM_CONFIG or --config exists",
                "Check file permissions",
            ],
            Self::ConfigParseError => &[
                "Validate the TOML syntax of rcsum.toml",
                "Run `rcsum config` to see the effective configuration",
            ],
            Self::ConfigEnvError => &[
                "Check RCSUM_* environment variables for typos",
                "Durations use humantime syntax, e.g. 30s or 2m",
            ],
            Self::ExecutableNotFound => &[
                "Build the md5sum targets so md5sum_bin_host and md5sum_dist exist in the out dir",
                "Point RCSUM_OUT_DIR or --out-dir at the build output directory",
                "Make sure adb is on PATH or set RCSUM_ADB_PATH",
            ],
            Self::CommandSpawnFailed => &[
                "Check that the executable has execute permission",
                "Re-run with --verbose to see the full command line",
            ],
            Self::CommandFailed => &[
                "Inspect the stderr included in the error message",
                "Check that the device is online: adb devices",
            ],
            Self::CommandTimeout => &[
                "Increase RCSUM_ADB_TIMEOUT",
                "Check whether the device is responsive",
            ],
            Self::PushFailed => &[
                "Check free space under /data/local/tmp on the device",
                "Check that the device is authorized: adb devices",
            ],
            Self::DeviceTempFileFailed => &[
                "Clean up stale files under /data/local/tmp on the device",
            ],
            Self::HostIoError => &["Check free space and permissions in the temp directory"],
            Self::InvalidChecksum => &["Checksums must be exactly 32 hexadecimal characters"],
            Self::StrictPathsMissing => &[
                "Verify the listed paths exist",
                "Check read permissions for unhashed paths",
            ],
            Self::StaleFiles => &["Push the listed host files to the device"],
        }
    }

    /// Returns all error codes (for documentation and tests).
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigEnvError,
            Self::ExecutableNotFound,
            Self::CommandSpawnFailed,
            Self::CommandFailed,
            Self::CommandTimeout,
            Self::PushFailed,
            Self::DeviceTempFileFailed,
            Self::HostIoError,
            Self::InvalidChecksum,
            Self::StrictPathsMissing,
            Self::StaleFiles,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Broad area an error code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration and environment errors (E001-E099)
    Config,
    /// Host binary and adb execution errors (E100-E199)
    Execution,
    /// Push and device temp file errors (E200-E299)
    Transfer,
    /// Checksum result errors (E300-E399)
    Verification,
}

impl ErrorCategory {
    const fn for_number(number: u16) -> Self {
        match number / 100 {
            0 => Self::Config,
            1 => Self::Execution,
            2 => Self::Transfer,
            _ => Self::Verification,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Execution => "Execution",
            Self::Transfer => "Transfer",
            Self::Verification => "Verification",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Owned catalog record, suitable for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "RCSUM-E001")
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    /// Ordered things to try
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Headline plus a numbered list of remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut out = format!("{self}\n\n");
        if self.remediation.is_empty() {
            return out;
        }
        out.push_str("Remediation steps:\n");
        for (n, step) in (1..).zip(&self.remediation) {
            let _ = writeln!(out, "  {n}. {step}");
        }
        out
    }

    #[must_use]
    pub fn format_brief(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::all() {
            assert!(
                seen.insert(code.code_number()),
                "Duplicate code number for {:?}",
                code
            );
        }
    }

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigReadError.code_string(), "RCSUM-E001");
        assert_eq!(ErrorCode::CommandTimeout.code_string(), "RCSUM-E103");
        assert_eq!(ErrorCode::StaleFiles.code_string(), "RCSUM-E302");
    }

    #[test]
    fn test_all_errors_have_message_and_remediation() {
        for code in ErrorCode::all() {
            assert!(!code.message().is_empty(), "{:?} has empty message", code);
            assert!(
                !code.remediation().is_empty(),
                "{:?} has no remediation steps",
                code
            );
        }
    }

    #[test]
    fn test_category_follows_hundreds_digit() {
        let expected = [
            ErrorCategory::Config,
            ErrorCategory::Execution,
            ErrorCategory::Transfer,
            ErrorCategory::Verification,
        ];
        for code in ErrorCode::all() {
            let bucket = usize::from(code.code_number() / 100);
            assert_eq!(code.category(), expected[bucket], "{code:?}");
        }
    }

    #[test]
    fn test_error_entry_serialization() {
        let entry = ErrorCode::PushFailed.entry();
        let json = serde_json::to_string(&entry).expect("serialization failed");
        assert!(json.contains("RCSUM-E200"));
        assert!(json.contains("transfer"));

        let parsed: ErrorEntry = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::StrictPathsMissing).unwrap();
        assert_eq!(json, "\"STRICT_PATHS_MISSING\"");
    }

    #[test]
    fn test_format_full_and_brief() {
        let entry = ErrorCode::CommandTimeout.entry();
        let full = entry.format_full();
        assert!(full.contains("[RCSUM-E103] Command timed out"));
        assert!(full.contains("Remediation steps:"));
        assert!(full.contains("RCSUM_ADB_TIMEOUT"));

        assert_eq!(entry.format_brief(), "[RCSUM-E103] Command timed out");
        assert_eq!(format!("{}", ErrorCategory::Execution), "Execution");
    }
}
