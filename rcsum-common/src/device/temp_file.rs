//! Scoped temporary files on the device.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};
use uuid::Uuid;

use super::RemoteDevice;
use crate::error::{ChecksumError, Result};

/// Directory that is world-writable on every Android release we target.
pub const DEVICE_TEMP_DIR: &str = "/data/local/tmp";

const MAX_NAME_ATTEMPTS: u32 = 16;

/// A file under [`DEVICE_TEMP_DIR`] that exists until released.
///
/// Prefer [`DeviceTempFile::scoped`], which releases on every exit path.
/// Dropping an unreleased handle, as happens when the owning future is
/// cancelled, falls back to [`RemoteDevice::remove_detached`].
pub struct DeviceTempFile<'a, D: RemoteDevice> {
    device: &'a D,
    path: String,
    released: bool,
}

impl<'a, D: RemoteDevice> DeviceTempFile<'a, D> {
    /// Create an empty, uniquely named file on the device.
    pub async fn acquire(device: &'a D, prefix: &str, suffix: &str) -> Result<Self> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = format!(
                "{DEVICE_TEMP_DIR}/{prefix}-{}{suffix}",
                Uuid::new_v4().simple()
            );
            if device.file_exists(&path).await? {
                continue;
            }

            device
                .run_shell_command(&["touch", &path])
                .await?
                .check(format!("touch {path}"))?;

            debug!(serial = device.serial(), path = %path, "Acquired device temp file");
            return Ok(Self {
                device,
                path,
                released: false,
            });
        }

        Err(ChecksumError::TempFileExhausted {
            dir: DEVICE_TEMP_DIR.to_string(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Remove the file from the device.
    pub async fn release(mut self) -> Result<()> {
        debug!(serial = self.device.serial(), path = %self.path, "Releasing device temp file");
        let output = self
            .device
            .run_shell_command(&["rm", "-f", &self.path])
            .await;
        self.released = true;
        output?.check(format!("rm -f {}", self.path))?;
        Ok(())
    }

    /// Run `body` with a fresh temp file path, then remove the file.
    ///
    /// Removal happens whether `body` succeeds, fails, or panics. A panic is
    /// resumed once the file is gone. A failed removal is logged and never
    /// replaces the body's own result. If this future is dropped before it
    /// completes, removal is handed to [`RemoteDevice::remove_detached`].
    pub async fn scoped<F, Fut, T>(device: &'a D, prefix: &str, suffix: &str, body: F) -> Result<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let temp = Self::acquire(device, prefix, suffix).await?;
        let path = temp.path().to_string();

        let outcome = AssertUnwindSafe(body(path.clone())).catch_unwind().await;

        if let Err(err) = temp.release().await {
            warn!(
                serial = device.serial(),
                path = %path, "Failed to remove device temp file: {}", err
            );
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl<D: RemoteDevice> Drop for DeviceTempFile<'_, D> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                serial = self.device.serial(),
                path = %self.path,
                "Device temp file dropped without release, removing in background"
            );
            self.device.remove_detached(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    #[tokio::test]
    async fn test_acquire_creates_file_under_tmp() {
        let device = MockDevice::builder().build();
        let temp = DeviceTempFile::acquire(&device, "md5sum_script", ".sh")
            .await
            .unwrap();

        assert!(temp.path().starts_with("/data/local/tmp/md5sum_script-"));
        assert!(temp.path().ends_with(".sh"));
        assert!(device.has_file(temp.path()));

        let path = temp.path().to_string();
        temp.release().await.unwrap();
        assert!(!device.has_file(&path));
    }

    #[tokio::test]
    async fn test_scoped_releases_on_success() {
        let device = MockDevice::builder().build();
        let seen = DeviceTempFile::scoped(&device, "t", "", |path| async move { Ok(path) })
            .await
            .unwrap();

        assert!(!device.has_file(&seen));
        assert_eq!(
            device.shell_commands().last().map(String::as_str),
            Some(format!("rm -f {seen}").as_str())
        );
    }

    #[tokio::test]
    async fn test_scoped_releases_on_error() {
        let device = MockDevice::builder().build();
        let result: Result<()> = DeviceTempFile::scoped(&device, "t", "", |_| async {
            Err(ChecksumError::Execution {
                program: "sh".to_string(),
                status: "exit status: 1".to_string(),
                stderr: String::new(),
            })
        })
        .await;

        assert!(matches!(result, Err(ChecksumError::Execution { .. })));
        assert!(device.files().iter().all(|f| !f.starts_with(DEVICE_TEMP_DIR)));
    }

    async fn exploding_body(_path: String) -> Result<()> {
        panic!("body exploded")
    }

    #[tokio::test]
    async fn test_scoped_releases_on_panic() {
        let device = MockDevice::builder().build();
        let outcome = AssertUnwindSafe(DeviceTempFile::scoped(&device, "t", "", exploding_body))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert!(device.files().iter().all(|f| !f.starts_with(DEVICE_TEMP_DIR)));
        assert!(
            device
                .shell_commands()
                .last()
                .is_some_and(|cmd| cmd.starts_with("rm -f "))
        );
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_result() {
        let device = MockDevice::builder().fail_command("rm").build();
        let value = DeviceTempFile::scoped(&device, "t", "", |_| async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_acquire_failure_skips_body() {
        let device = MockDevice::builder().fail_command("touch").build();
        let mut ran = false;
        let result = DeviceTempFile::scoped(&device, "t", "", |_| {
            ran = true;
            async { Ok(()) }
        })
        .await;
        assert!(matches!(result, Err(ChecksumError::Execution { .. })), "{result:?}");
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_dropped_handle_is_removed() {
        let device = MockDevice::builder().build();
        let temp = DeviceTempFile::acquire(&device, "t", "").await.unwrap();
        let path = temp.path().to_string();

        drop(temp);
        assert!(!device.has_file(&path));
        assert_eq!(device.detached_removals(), vec![path]);
    }

    #[tokio::test]
    async fn test_released_handle_is_not_removed_twice() {
        let device = MockDevice::builder().build();
        let temp = DeviceTempFile::acquire(&device, "t", "").await.unwrap();
        temp.release().await.unwrap();
        assert!(device.detached_removals().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_scope_removes_file() {
        let device = MockDevice::builder().build();
        let scope = DeviceTempFile::scoped(&device, "t", "", |_| std::future::pending::<Result<()>>());

        let outcome = tokio::time::timeout(std::time::Duration::from_millis(20), scope).await;
        assert!(outcome.is_err());
        assert!(device.files().iter().all(|f| !f.starts_with(DEVICE_TEMP_DIR)));
        assert_eq!(device.detached_removals().len(), 1);
    }
}
