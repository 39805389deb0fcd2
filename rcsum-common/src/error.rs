//! Error type for checksum computation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::errors::ErrorCode;

pub type Result<T> = std::result::Result<T, ChecksumError>;

/// Failures surfaced by the host and device hashers.
///
/// A path that does not exist is never an error; it is just absent from the
/// result. Everything here fails the whole batch.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// A command could not be started at all.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A command ran but reported failure.
    #[error("{program} exited with {status}: {stderr}")]
    Execution {
        program: String,
        status: String,
        stderr: String,
    },

    /// A command was cut off by the collaborator's timeout.
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// Moving data to the device failed.
    #[error("Transfer of {local} to {remote} failed: {reason}")]
    Transport {
        local: PathBuf,
        remote: String,
        reason: String,
    },

    /// No unused device temp file name could be found.
    #[error("Could not allocate a device temp file under {dir} after {attempts} attempts")]
    TempFileExhausted { dir: String, attempts: u32 },

    /// A value that is not a fixed-width hex digest was offered as a checksum.
    #[error("Invalid checksum '{value}': expected 32 hexadecimal characters")]
    InvalidChecksum { value: String },

    /// Strict mode: some requested paths produced no checksum.
    #[error("{} path(s) missing, {} path(s) unhashed", .missing.len(), .unhashed.len())]
    MissingPaths {
        missing: Vec<String>,
        unhashed: Vec<String>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChecksumError {
    /// Catalog code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorCode::ExecutableNotFound
            }
            Self::Spawn { .. } => ErrorCode::CommandSpawnFailed,
            Self::Execution { .. } => ErrorCode::CommandFailed,
            Self::Timeout { .. } => ErrorCode::CommandTimeout,
            Self::Transport { .. } => ErrorCode::PushFailed,
            Self::TempFileExhausted { .. } => ErrorCode::DeviceTempFileFailed,
            Self::InvalidChecksum { .. } => ErrorCode::InvalidChecksum,
            Self::MissingPaths { .. } => ErrorCode::StrictPathsMissing,
            Self::Config(err) => err.code(),
            Self::Io(_) => ErrorCode::HostIoError,
        }
    }

    pub(crate) fn execution(
        program: impl Into<String>,
        status: std::process::ExitStatus,
        stderr: &[u8],
    ) -> Self {
        Self::Execution {
            program: program.into(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ChecksumError::Timeout {
            program: "adb".to_string(),
            timeout: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "adb timed out after 90s");
    }

    #[test]
    fn test_missing_paths_display() {
        let err = ChecksumError::MissingPaths {
            missing: vec!["/a".to_string(), "/b".to_string()],
            unhashed: vec!["/c".to_string()],
        };
        assert_eq!(err.to_string(), "2 path(s) missing, 1 path(s) unhashed");
        assert_eq!(err.code(), ErrorCode::StrictPathsMissing);
    }

    #[test]
    fn test_spawn_not_found_maps_to_missing_executable() {
        let err = ChecksumError::Spawn {
            program: "out/Release/md5sum_bin_host".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.code(), ErrorCode::ExecutableNotFound);

        let err = ChecksumError::Spawn {
            program: "adb".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.code(), ErrorCode::CommandSpawnFailed);
    }

    #[test]
    fn test_io_converts() {
        let err: ChecksumError = std::io::Error::other("disk gone").into();
        assert_eq!(err.code(), ErrorCode::HostIoError);
        assert_eq!(err.to_string(), "disk gone");
    }
}
