//! Host/device comparison, used to decide which files need pushing.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::checksum::ChecksumResult;
use crate::config::ChecksumConfig;
use crate::device::RemoteDevice;
use crate::error::Result;
use crate::host::calculate_host_checksums;
use crate::paths::PathList;
use crate::remote::calculate_device_checksums;

/// Why a host/device pair is out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// Nothing was hashed on the host side.
    HostMissing,
    /// The host file has no counterpart on the device.
    DeviceMissing,
    /// Both sides exist with different contents.
    Mismatch,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostMissing => write!(f, "host missing"),
            Self::DeviceMissing => write!(f, "device missing"),
            Self::Mismatch => write!(f, "checksum mismatch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StalePair {
    pub host_path: String,
    pub device_path: String,
    pub reason: StaleReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_checksum: Option<String>,
}

/// Pairs whose device copy is absent or differs from the host copy.
///
/// A host path that names a directory is expanded to every hashed file
/// beneath it, each mapped to the same relative path under the device path.
/// Digests compare case-insensitively.
pub fn compare_checksums(
    pairs: &[(String, String)],
    host: &ChecksumResult,
    device: &ChecksumResult,
) -> Vec<StalePair> {
    let mut stale = Vec::new();

    for (host_path, device_path) in pairs {
        let expanded: Vec<(String, String, &str)> = match host.get(host_path) {
            Some(checksum) => vec![(host_path.clone(), device_path.clone(), checksum)],
            None => host
                .entries_under(host_path)
                .map(|(relative, checksum)| {
                    (
                        join(host_path, relative),
                        join(device_path, relative),
                        checksum,
                    )
                })
                .collect(),
        };

        if expanded.is_empty() {
            stale.push(StalePair {
                host_path: host_path.clone(),
                device_path: device_path.clone(),
                reason: StaleReason::HostMissing,
                host_checksum: None,
                device_checksum: device.get(device_path).map(str::to_string),
            });
            continue;
        }

        for (host_file, device_file, host_checksum) in expanded {
            let device_checksum = device.get(&device_file);
            let reason = match device_checksum {
                None => StaleReason::DeviceMissing,
                Some(remote) if !remote.eq_ignore_ascii_case(host_checksum) => StaleReason::Mismatch,
                Some(_) => continue,
            };
            stale.push(StalePair {
                host_path: host_file,
                device_path: device_file,
                reason,
                host_checksum: Some(host_checksum.to_string()),
                device_checksum: device_checksum.map(str::to_string),
            });
        }
    }

    stale
}

/// Hash both sides of `pairs` and return the stale ones.
pub async fn find_stale_pairs<D: RemoteDevice>(
    pairs: &[(String, String)],
    device: &D,
    config: &ChecksumConfig,
) -> Result<Vec<StalePair>> {
    let host_paths: PathList = pairs.iter().map(|(host, _)| host.as_str()).collect();
    let device_paths: PathList = pairs.iter().map(|(_, remote)| remote.as_str()).collect();

    let host = calculate_host_checksums(host_paths, config).await?;
    let remote = calculate_device_checksums(device_paths, device, config).await?;

    let stale = compare_checksums(pairs, &host, &remote);
    debug!(
        serial = device.serial(),
        pairs = pairs.len(),
        stale = stale.len(),
        "Compared host and device checksums"
    );
    Ok(stale)
}

fn join(dir: &str, relative: &str) -> String {
    format!("{}/{relative}", dir.trim_end_matches('/'))
}
