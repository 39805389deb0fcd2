//! Shared checksum machinery for rcsum.
//!
//! Computes MD5 checksums of files either on the host, by running the
//! prebuilt `md5sum_bin_host` executable, or on an attached Android device,
//! by provisioning `md5sum_bin` once and running a generated shell script
//! through a scoped device temp file. Both paths feed the same output parser.

pub mod checksum;
pub mod compare;
pub mod config;
pub mod device;
pub mod error;
pub mod errors;
pub mod host;
pub mod logging;
pub mod parser;
pub mod paths;
pub mod remote;
pub mod strict;
pub mod testing;

pub use checksum::{CHECKSUM_LEN, ChecksumResult, is_checksum};
pub use compare::{StalePair, StaleReason, compare_checksums, find_stale_pairs};
pub use config::ChecksumConfig;
pub use device::{AdbDevice, DeviceTempFile, RemoteDevice, ShellOutput};
pub use error::{ChecksumError, Result};
pub use host::calculate_host_checksums;
pub use logging::{LogConfig, LoggingGuards, init_logging};
pub use parser::parse_checksum_output;
pub use paths::PathList;
pub use remote::{
    DEVICE_BIN_PATH, DEVICE_LIB_PATH, build_device_script, calculate_device_checksums,
    ensure_device_binary,
};
pub use strict::{
    ChecksumReport, calculate_device_checksums_strict, calculate_host_checksums_strict,
};

/// Compute checksums for `paths` on the host, or on `device` when one is given.
///
/// For callers that decide at runtime where to hash. Code that only ever
/// hashes on the host should call [`calculate_host_checksums`], which needs
/// no device type; passing `None` here still requires naming one, e.g.
/// `None::<&AdbDevice>`.
pub async fn compute_checksums<D: RemoteDevice>(
    paths: impl Into<PathList>,
    device: Option<&D>,
    config: &ChecksumConfig,
) -> Result<ChecksumResult> {
    match device {
        Some(device) => calculate_device_checksums(paths, device, config).await,
        None => calculate_host_checksums(paths, config).await,
    }
}
