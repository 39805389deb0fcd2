//! [`RemoteDevice`] backed by the `adb` command-line tool.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{RemoteDevice, ShellOutput, shell_join};
use crate::config::ChecksumConfig;
use crate::config::settings::DEFAULT_ADB_TIMEOUT;
use crate::error::{ChecksumError, Result};

/// Appended to every shell command so the exit status survives adb.
const STATUS_MARKER: &str = "RCSUM_EXIT:";

/// Where `run_pie` lives on devices that need it.
pub const DEVICE_RUN_PIE_PATH: &str = "/data/local/tmp/run_pie";

/// First SDK level (Jelly Bean) that executes PIE binaries natively.
const PIE_NATIVE_SDK: u32 = 16;

/// A single device reached through `adb [-s serial]`.
#[derive(Debug)]
pub struct AdbDevice {
    adb: String,
    serial: Option<String>,
    timeout: Duration,
    run_pie_host: PathBuf,
    pie_wrapper: OnceCell<String>,
}

impl AdbDevice {
    pub fn new(adb: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            adb: adb.into(),
            serial,
            timeout: DEFAULT_ADB_TIMEOUT,
            run_pie_host: PathBuf::from("run_pie"),
            pie_wrapper: OnceCell::new(),
        }
    }

    pub fn from_config(config: &ChecksumConfig) -> Self {
        Self::new(
            config.adb_path.value.clone(),
            config.device_serial.value.clone(),
        )
        .with_timeout(config.adb_timeout.value)
        .with_run_pie(config.run_pie_path())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Host path of the `run_pie` helper pushed to pre-Jelly Bean devices.
    pub fn with_run_pie(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_pie_host = path.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run_adb(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = self.command();
        cmd.args(args);
        debug!(serial = self.serial(), ?args, "Running adb");

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(ChecksumError::Spawn {
                program: self.adb.clone(),
                source,
            }),
            Err(_) => Err(ChecksumError::Timeout {
                program: format!("{} {}", self.adb, args.join(" ")),
                timeout: self.timeout,
            }),
        }
    }

    /// `ro.build.version.sdk`, or `None` if the property is unreadable.
    pub async fn sdk_version(&self) -> Result<Option<u32>> {
        let output = self
            .run_shell_command(&["getprop", "ro.build.version.sdk"])
            .await?;
        Ok(output
            .lines
            .first()
            .and_then(|line| line.trim().parse::<u32>().ok()))
    }

    async fn resolve_pie_wrapper(&self) -> Result<String> {
        let Some(sdk) = self.sdk_version().await? else {
            warn!(
                serial = self.serial(),
                "Could not read SDK version; assuming PIE is supported"
            );
            return Ok(String::new());
        };
        if sdk >= PIE_NATIVE_SDK {
            return Ok(String::new());
        }

        if !self.file_exists(DEVICE_RUN_PIE_PATH).await? {
            info!(serial = self.serial(), sdk, "Installing run_pie");
            self.push(&self.run_pie_host, DEVICE_RUN_PIE_PATH).await?;
        }
        Ok(DEVICE_RUN_PIE_PATH.to_string())
    }
}

impl RemoteDevice for AdbDevice {
    fn serial(&self) -> &str {
        self.serial.as_deref().unwrap_or("default")
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let output = self.run_shell_command(&["test", "-e", path]).await?;
        Ok(output.success())
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let local_str = local.to_string_lossy();
        let output = self.run_adb(&["push", &local_str, remote]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let reason = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(ChecksumError::Transport {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                reason,
            });
        }
        Ok(())
    }

    async fn run_shell_command(&self, argv: &[&str]) -> Result<ShellOutput> {
        let script = format!("{}; echo {}$?", shell_join(argv), STATUS_MARKER);
        let output = self.run_adb(&["shell", &script]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        match split_status(&stdout) {
            Some(shell_output) => Ok(shell_output),
            None => Err(ChecksumError::execution(
                format!("{} shell", self.adb),
                output.status,
                &output.stderr,
            )),
        }
    }

    async fn pie_wrapper(&self) -> Result<String> {
        self.pie_wrapper
            .get_or_try_init(|| self.resolve_pie_wrapper())
            .await
            .cloned()
    }

    fn remove_detached(&self, path: &str) {
        let Ok(handle) = Handle::try_current() else {
            warn!(serial = self.serial(), path, "No runtime to remove device temp file");
            return;
        };

        let mut cmd = self.command();
        cmd.args(["shell", &shell_join(&["rm", "-f", path])]);
        // The child must outlive the task waiting on it if the runtime shuts down.
        cmd.kill_on_drop(false);
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(serial = self.serial(), path, "Failed to spawn adb for cleanup: {}", err);
                return;
            }
        };

        let serial = self.serial().to_string();
        let path = path.to_string();
        let timeout = self.timeout;
        handle.spawn(async move {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(Ok(status)) if status.success() => {
                    debug!(%serial, %path, "Removed device temp file after cancellation");
                }
                Ok(Ok(status)) => warn!(%serial, %path, %status, "adb cleanup exited non-zero"),
                Ok(Err(err)) => warn!(%serial, %path, "adb cleanup failed: {}", err),
                Err(_) => {
                    let _ = child.start_kill();
                    warn!(%serial, %path, "adb cleanup timed out");
                }
            }
        });
    }
}

/// Separate the status marker from command output.
///
/// The marker may share a line with output that lacked a trailing newline.
/// Returns `None` when the marker never arrived, which means adb itself failed.
fn split_status(stdout: &str) -> Option<ShellOutput> {
    let mut lines: Vec<String> = stdout.lines().map(str::to_string).collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    let last = lines.pop()?;
    let idx = last.rfind(STATUS_MARKER)?;
    let status = last[idx + STATUS_MARKER.len()..].trim().parse::<i32>().ok();
    let before = &last[..idx];
    if !before.is_empty() {
        lines.push(before.to_string());
    }
    Some(ShellOutput { lines, status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_status_plain() {
        let out = split_status("abc /sdcard/a\nRCSUM_EXIT:0\n").unwrap();
        assert_eq!(out.lines, vec!["abc /sdcard/a"]);
        assert_eq!(out.status, Some(0));
    }

    #[test]
    fn test_split_status_crlf_and_nonzero() {
        let out = split_status("line one\r\nline two\r\nRCSUM_EXIT:1\r\n").unwrap();
        assert_eq!(out.lines, vec!["line one", "line two"]);
        assert_eq!(out.status, Some(1));
    }

    #[test]
    fn test_split_status_marker_on_unterminated_line() {
        let out = split_status("partialRCSUM_EXIT:0\n").unwrap();
        assert_eq!(out.lines, vec!["partial"]);
        assert!(out.success());
    }

    #[test]
    fn test_split_status_missing_marker() {
        assert!(split_status("error: device offline\n").is_none());
        assert!(split_status("").is_none());
    }

    #[test]
    fn test_serial_defaults() {
        assert_eq!(AdbDevice::new("adb", None).serial(), "default");
        assert_eq!(
            AdbDevice::new("adb", Some("emulator-5554".to_string())).serial(),
            "emulator-5554"
        );
    }

    #[test]
    fn test_from_config() {
        let mut config = ChecksumConfig::with_out_dir("/out");
        config.adb_timeout.value = Duration::from_secs(5);
        let device = AdbDevice::from_config(&config);
        assert_eq!(device.timeout, Duration::from_secs(5));
        assert_eq!(device.run_pie_host, PathBuf::from("/out/run_pie"));
        assert_eq!(device.adb, "adb");
    }

    #[tokio::test]
    async fn test_missing_adb_is_spawn_error() {
        let device = AdbDevice::new("/nonexistent/adb-for-rcsum-tests", None);
        let err = device.file_exists("/sdcard").await.unwrap_err();
        assert!(matches!(err, ChecksumError::Spawn { .. }));
    }
}
