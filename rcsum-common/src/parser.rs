//! Parser for `md5sum`-style output.
//!
//! Both the host binary and the device script print one `<digest> <path>`
//! line per file. Anything else in the stream (shell diagnostics, linker
//! warnings, adb noise) is dropped.

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use crate::checksum::ChecksumResult;

static CHECKSUM_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9a-fA-F]{32})\s+(.*)$").expect("checksum line regex is valid")
});

/// Split a single output line into `(checksum, path)`.
///
/// Returns `None` for noise lines and for digest lines with no path after
/// the separator.
pub fn parse_checksum_line(line: &str) -> Option<(&str, &str)> {
    let caps = CHECKSUM_LINE_RE.captures(line)?;
    let checksum = caps.get(1)?.as_str();
    let path = caps.get(2)?.as_str();
    if path.is_empty() {
        return None;
    }
    Some((checksum, path))
}

/// Build a path → checksum mapping from raw output lines.
///
/// When several lines name the same path the last one wins.
pub fn parse_checksum_output<I, S>(lines: I) -> ChecksumResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = ChecksumResult::new();
    for line in lines {
        let line = line.as_ref();
        if line.is_empty() {
            continue;
        }
        match parse_checksum_line(line) {
            Some((checksum, path)) => result.insert_digest(path, checksum),
            None => trace!(line, "Skipping non-checksum output line"),
        }
    }
    result
}
