//! Strict variants that account for every requested path.
//!
//! The plain hashers drop paths that produced no checksum. These variants
//! report them, split by whether the path exists at all.

use serde::Serialize;

use crate::checksum::ChecksumResult;
use crate::config::ChecksumConfig;
use crate::device::RemoteDevice;
use crate::error::{ChecksumError, Result};
use crate::host::calculate_host_checksums;
use crate::paths::PathList;
use crate::remote::calculate_device_checksums;

/// Checksums plus the requested paths that produced none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChecksumReport {
    pub checksums: ChecksumResult,
    /// Requested paths that do not exist.
    pub missing: Vec<String>,
    /// Requested paths that exist but yielded no checksum line.
    pub unhashed: Vec<String>,
}

impl ChecksumReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unhashed.is_empty()
    }

    /// The checksums, or [`ChecksumError::MissingPaths`] if anything is unaccounted for.
    pub fn into_strict(self) -> Result<ChecksumResult> {
        if self.is_complete() {
            Ok(self.checksums)
        } else {
            Err(ChecksumError::MissingPaths {
                missing: self.missing,
                unhashed: self.unhashed,
            })
        }
    }
}

/// [`calculate_host_checksums`] with missing paths reported.
pub async fn calculate_host_checksums_strict(
    paths: impl Into<PathList>,
    config: &ChecksumConfig,
) -> Result<ChecksumReport> {
    let paths = paths.into();
    let checksums = calculate_host_checksums(paths.clone(), config).await?;

    let mut report = ChecksumReport::default();
    for path in uncovered(&paths, &checksums) {
        if tokio::fs::try_exists(&path).await? {
            report.unhashed.push(path);
        } else {
            report.missing.push(path);
        }
    }
    report.checksums = checksums;
    Ok(report)
}

/// [`calculate_device_checksums`] with missing paths reported.
pub async fn calculate_device_checksums_strict<D: RemoteDevice>(
    paths: impl Into<PathList>,
    device: &D,
    config: &ChecksumConfig,
) -> Result<ChecksumReport> {
    let paths = paths.into();
    let checksums = calculate_device_checksums(paths.clone(), device, config).await?;

    let mut report = ChecksumReport::default();
    for path in uncovered(&paths, &checksums) {
        if device.file_exists(&path).await? {
            report.unhashed.push(path);
        } else {
            report.missing.push(path);
        }
    }
    report.checksums = checksums;
    Ok(report)
}

fn uncovered(paths: &PathList, checksums: &ChecksumResult) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    paths
        .iter()
        .filter(|path| !checksums.covers(path))
        .filter(|path| seen.insert(path.as_str()))
        .cloned()
        .collect()
}
