//! Host-side hashing with the prebuilt `md5sum_bin_host`.

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::checksum::ChecksumResult;
use crate::config::ChecksumConfig;
use crate::error::{ChecksumError, Result};
use crate::parser::parse_checksum_output;
use crate::paths::PathList;

/// Checksums of `paths` on the host.
///
/// Every path goes to one invocation of the host executable. Paths it cannot
/// hash are absent from the result; a failure of the executable itself fails
/// the whole batch.
pub async fn calculate_host_checksums(
    paths: impl Into<PathList>,
    config: &ChecksumConfig,
) -> Result<ChecksumResult> {
    let paths = paths.into();
    if paths.is_empty() {
        return Ok(ChecksumResult::new());
    }

    let binary = config.host_binary();
    let program = binary.display().to_string();
    debug!(binary = %program, paths = paths.len(), "Hashing on host");

    let output = Command::new(&binary)
        .args(paths.iter())
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ChecksumError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ChecksumError::execution(
            program,
            output.status,
            &output.stderr,
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_checksum_output(stdout.lines()))
}
