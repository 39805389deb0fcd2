//! Remote device collaborators.
//!
//! The hashers only need four things from a device: an existence check, a
//! way to push files, a shell, and the PIE launcher prefix. [`RemoteDevice`]
//! captures exactly that so tests can script a device without adb.

pub mod adb;
pub mod temp_file;

use std::future::Future;
use std::path::Path;

use crate::error::{ChecksumError, Result};

pub use adb::AdbDevice;
pub use temp_file::{DEVICE_TEMP_DIR, DeviceTempFile};

/// Output of a remote shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Combined output, one entry per line, without line terminators.
    pub lines: Vec<String>,
    /// Remote exit status, when the transport could recover it.
    pub status: Option<i32>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turn a non-zero exit into [`ChecksumError::Execution`].
    pub fn check(self, program: impl Into<String>) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(ChecksumError::Execution {
            program: program.into(),
            status: match self.status {
                Some(code) => format!("exit status: {code}"),
                None => "unknown exit status".to_string(),
            },
            stderr: self.lines.join("\n"),
        })
    }
}

/// A device whose filesystem can be inspected and written over some transport.
///
/// Errors from these methods are transport failures. A remote command that
/// runs and exits non-zero is reported through [`ShellOutput::status`], not
/// as an error.
pub trait RemoteDevice: Send + Sync {
    /// Identifier used in logs.
    fn serial(&self) -> &str;

    fn file_exists(&self, path: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Copy a local file or directory to `remote`.
    fn push(&self, local: &Path, remote: &str) -> impl Future<Output = Result<()>> + Send;

    /// Run `argv` through the device shell. Arguments are quoted for the shell.
    fn run_shell_command(&self, argv: &[&str]) -> impl Future<Output = Result<ShellOutput>> + Send;

    /// Prefix needed to launch PIE executables, or an empty string.
    fn pie_wrapper(&self) -> impl Future<Output = Result<String>> + Send;

    /// Start removing `path` without waiting for the result.
    ///
    /// Called from `Drop` when a future that owned a device temp file was
    /// cancelled, so there is nothing left to await the removal.
    fn remove_detached(&self, path: &str);
}

/// Quote `argv` into a single shell command line.
pub fn shell_join(argv: &[&str]) -> String {
    argv.iter()
        .map(|arg| shell_escape::unix::escape((*arg).into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
