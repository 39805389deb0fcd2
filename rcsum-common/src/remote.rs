//! Device-side hashing.
//!
//! The helper binary and its shared libraries are installed once under
//! [`DEVICE_LIB_PATH`]. Each batch is a generated shell script, pushed to a
//! scoped temp file and run with `sh`, so the whole batch costs a single
//! remote shell invocation no matter how many paths it covers.

use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::checksum::ChecksumResult;
use crate::config::ChecksumConfig;
use crate::device::{DeviceTempFile, RemoteDevice, shell_join};
use crate::error::Result;
use crate::parser::parse_checksum_output;
use crate::paths::PathList;

/// Install directory of the device helper and its libraries.
pub const DEVICE_LIB_PATH: &str = "/data/local/tmp/md5sum/";
/// The device helper binary.
pub const DEVICE_BIN_PATH: &str = "/data/local/tmp/md5sum/md5sum_bin";

const SCRIPT_PREFIX: &str = "md5sum_script";
const SCRIPT_SUFFIX: &str = ".sh";

/// Push the helper bundle from `dist_dir` unless the binary is already there.
///
/// Returns `true` when a push happened.
pub async fn ensure_device_binary<D: RemoteDevice>(device: &D, dist_dir: &Path) -> Result<bool> {
    if device.file_exists(DEVICE_BIN_PATH).await? {
        return Ok(false);
    }

    info!(
        serial = device.serial(),
        dist = %dist_dir.display(),
        "Installing md5sum helper on device"
    );
    device.push(dist_dir, DEVICE_LIB_PATH).await?;
    Ok(true)
}

/// One `test ... && md5sum_bin path` clause per path, joined by `; `.
pub fn build_device_script(paths: &PathList, pie_wrapper: &str) -> String {
    paths
        .iter()
        .map(|path| {
            let quoted = shell_join(&[path.as_str()]);
            format!(
                "test -f {quoted} -o -d {quoted} && LD_LIBRARY_PATH={DEVICE_LIB_PATH} {pie_wrapper} {DEVICE_BIN_PATH} {quoted}"
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checksums of `paths` on `device`.
///
/// Paths that do not exist on the device are simply absent from the result.
/// The script's exit status is ignored: the last clause's `test` fails
/// whenever its path is missing.
pub async fn calculate_device_checksums<D: RemoteDevice>(
    paths: impl Into<PathList>,
    device: &D,
    config: &ChecksumConfig,
) -> Result<ChecksumResult> {
    let paths = paths.into();
    if paths.is_empty() {
        return Ok(ChecksumResult::new());
    }

    ensure_device_binary(device, &config.dist_dir()).await?;
    let pie_wrapper = device.pie_wrapper().await?;

    let script = build_device_script(&paths, &pie_wrapper);
    debug!(serial = device.serial(), paths = paths.len(), script = %script, "Device hash script");

    let mut local = tempfile::Builder::new()
        .prefix(SCRIPT_PREFIX)
        .suffix(SCRIPT_SUFFIX)
        .tempfile()?;
    local.write_all(script.as_bytes())?;
    local.flush()?;

    let output = DeviceTempFile::scoped(device, SCRIPT_PREFIX, SCRIPT_SUFFIX, |remote| async move {
        device.push(local.path(), &remote).await?;
        device.run_shell_command(&["sh", &remote]).await
    })
    .await?;

    if !output.success() {
        debug!(
            serial = device.serial(),
            status = ?output.status,
            "Hash script exited non-zero"
        );
    }

    Ok(parse_checksum_output(&output.lines))
}
