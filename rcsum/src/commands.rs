//! Subcommand handlers.

use anyhow::Result;
use rcsum_common::errors::ErrorCode;
use rcsum_common::{
    AdbDevice, ChecksumConfig, ChecksumResult, StalePair, calculate_device_checksums,
    calculate_device_checksums_strict, calculate_host_checksums, calculate_host_checksums_strict,
    find_stale_pairs,
};
use std::process::ExitCode;
use tracing::info;

pub async fn host(
    paths: Vec<String>,
    strict: bool,
    config: &ChecksumConfig,
    json: bool,
) -> Result<ExitCode> {
    let result = if strict {
        calculate_host_checksums_strict(paths, config)
            .await?
            .into_strict()?
    } else {
        calculate_host_checksums(paths, config).await?
    };
    print_checksums(&result, json)?;
    Ok(ExitCode::SUCCESS)
}

pub async fn device(
    paths: Vec<String>,
    strict: bool,
    config: &ChecksumConfig,
    json: bool,
) -> Result<ExitCode> {
    let device = AdbDevice::from_config(config);
    let result = if strict {
        calculate_device_checksums_strict(paths, &device, config)
            .await?
            .into_strict()?
    } else {
        calculate_device_checksums(paths, &device, config).await?
    };
    print_checksums(&result, json)?;
    Ok(ExitCode::SUCCESS)
}

pub async fn compare(
    pairs: &[(String, String)],
    config: &ChecksumConfig,
    json: bool,
) -> Result<ExitCode> {
    let device = AdbDevice::from_config(config);
    let stale = find_stale_pairs(pairs, &device, config).await?;
    info!(pairs = pairs.len(), stale = stale.len(), "Comparison finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&stale)?);
    } else {
        for pair in &stale {
            println!("{}", format_stale(pair));
        }
    }

    if stale.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}", ErrorCode::StaleFiles.entry().format_brief());
        Ok(ExitCode::from(1))
    }
}

pub fn show_config(config: &ChecksumConfig, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(ExitCode::SUCCESS);
    }

    let rows: Vec<(&str, String, String)> = vec![
        (
            "out_dir",
            config.out_dir.value.display().to_string(),
            config.out_dir.source.to_string(),
        ),
        (
            "adb_path",
            config.adb_path.value.clone(),
            config.adb_path.source.to_string(),
        ),
        (
            "device_serial",
            config
                .device_serial
                .value
                .clone()
                .unwrap_or_else(|| "(any)".to_string()),
            config.device_serial.source.to_string(),
        ),
        (
            "adb_timeout",
            humantime::format_duration(config.adb_timeout.value).to_string(),
            config.adb_timeout.source.to_string(),
        ),
        (
            "log_level",
            config.log_level.value.clone(),
            config.log_level.source.to_string(),
        ),
        (
            "log_json",
            config.log_json.value.to_string(),
            config.log_json.source.to_string(),
        ),
    ];
    for (key, value, source) in rows {
        println!("{key:<14} {value:<32} [{source}]");
    }
    if let Some(file) = &config.config_file {
        println!("{:<14} {}", "config_file", file.display());
    }
    println!("{:<14} {}", "host_binary", config.host_binary().display());
    println!("{:<14} {}", "dist_dir", config.dist_dir().display());
    Ok(ExitCode::SUCCESS)
}

fn print_checksums(result: &ChecksumResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        for (path, checksum) in result.iter() {
            println!("{checksum}  {path}");
        }
    }
    Ok(())
}

fn format_stale(pair: &StalePair) -> String {
    format!("{}: {} -> {}", pair.reason, pair.host_path, pair.device_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcsum_common::StaleReason;

    #[test]
    fn test_format_stale() {
        let pair = StalePair {
            host_path: "out/a.apk".to_string(),
            device_path: "/data/app/a.apk".to_string(),
            reason: StaleReason::Mismatch,
            host_checksum: None,
            device_checksum: None,
        };
        assert_eq!(
            format_stale(&pair),
            "checksum mismatch: out/a.apk -> /data/app/a.apk"
        );
    }

    #[test]
    fn test_show_config_succeeds() {
        let config = ChecksumConfig::default();
        assert_eq!(show_config(&config, false).unwrap(), ExitCode::SUCCESS);
        assert_eq!(show_config(&config, true).unwrap(), ExitCode::SUCCESS);
    }
}
