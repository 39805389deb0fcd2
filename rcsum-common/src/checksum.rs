//! Checksum result mapping.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::{ChecksumError, Result};

/// Width of an MD5 digest rendered as hex.
pub const CHECKSUM_LEN: usize = 32;

/// Returns true if `value` is exactly [`CHECKSUM_LEN`] hex digits (either case).
pub fn is_checksum(value: &str) -> bool {
    value.len() == CHECKSUM_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Mapping from path to checksum for one environment.
///
/// Only well-formed digests are ever admitted. Paths that were requested but
/// produced no checksum line are simply absent. Deserialization goes through
/// the same digest check as [`ChecksumResult::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct ChecksumResult {
    entries: BTreeMap<String, String>,
}

impl ChecksumResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a checksum, replacing any previous value for `path`.
    pub fn insert(&mut self, path: impl Into<String>, checksum: impl Into<String>) -> Result<()> {
        let checksum = checksum.into();
        if !is_checksum(&checksum) {
            return Err(ChecksumError::InvalidChecksum { value: checksum });
        }
        self.entries.insert(path.into(), checksum);
        Ok(())
    }

    /// Insert a digest the caller has already matched against the digest format.
    pub(crate) fn insert_digest(&mut self, path: &str, checksum: &str) {
        debug_assert!(is_checksum(checksum), "unvalidated digest {checksum:?}");
        self.entries.insert(path.to_string(), checksum.to_string());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(path, checksum)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// True if `path` has an entry, or any entry lives beneath it as a directory.
    pub fn covers(&self, path: &str) -> bool {
        if self.contains(path) {
            return true;
        }
        let dir = path.trim_end_matches('/');
        let prefix = format!("{dir}/");
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    /// Entries strictly beneath directory `dir`, with their path relative to it.
    pub fn entries_under<'a>(&'a self, dir: &str) -> impl Iterator<Item = (&'a str, &'a str)> + use<'a> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let skip = prefix.len();
        self.entries
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(move |(key, checksum)| (&key[skip..], checksum.as_str()))
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.entries
    }
}

impl Serialize for ChecksumResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl TryFrom<BTreeMap<String, String>> for ChecksumResult {
    type Error = ChecksumError;

    fn try_from(entries: BTreeMap<String, String>) -> Result<Self> {
        let mut result = Self::new();
        for (path, checksum) in entries {
            result.insert(path, checksum)?;
        }
        Ok(result)
    }
}

impl IntoIterator for ChecksumResult {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn test_is_checksum() {
        assert!(is_checksum(EMPTY_MD5));
        assert!(is_checksum("D41D8CD98F00B204E9800998ECF8427E"));
        assert!(!is_checksum(&EMPTY_MD5[..31]));
        assert!(!is_checksum(&format!("{EMPTY_MD5}0")));
        assert!(!is_checksum("g41d8cd98f00b204e9800998ecf8427e"));
        assert!(!is_checksum(""));
    }

    #[test]
    fn test_insert_rejects_malformed_digest() {
        let mut result = ChecksumResult::new();
        let err = result.insert("/a", "not-a-digest").unwrap_err();
        assert!(matches!(err, ChecksumError::InvalidChecksum { .. }));
        assert!(result.is_empty());
    }

    #[test]
    fn test_insert_overwrites() {
        let mut result = ChecksumResult::new();
        result.insert("/a", "a".repeat(32)).unwrap();
        result.insert("/a", "b".repeat(32)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("/a"), Some("b".repeat(32).as_str()));
    }

    #[test]
    fn test_covers_directory_entries() {
        let mut result = ChecksumResult::new();
        result.insert("/sdcard/dir/file", EMPTY_MD5).unwrap();
        result.insert("/sdcard/direct", EMPTY_MD5).unwrap();

        assert!(result.covers("/sdcard/dir"));
        assert!(result.covers("/sdcard/dir/"));
        assert!(result.covers("/sdcard/direct"));
        assert!(!result.covers("/sdcard/di"));
        assert!(!result.covers("/sdcard/other"));
    }

    #[test]
    fn test_entries_under() {
        let mut result = ChecksumResult::new();
        result.insert("/sdcard/dir/a", EMPTY_MD5).unwrap();
        result.insert("/sdcard/dir/sub/b", EMPTY_MD5).unwrap();
        result.insert("/sdcard/direct", EMPTY_MD5).unwrap();

        let relative: Vec<&str> = result.entries_under("/sdcard/dir/").map(|(rel, _)| rel).collect();
        assert_eq!(relative, vec!["a", "sub/b"]);
        assert_eq!(result.entries_under("/sdcard/none").count(), 0);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut result = ChecksumResult::new();
        result.insert("file1", EMPTY_MD5).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, format!("{{\"file1\":\"{EMPTY_MD5}\"}}"));
    }

    #[test]
    fn test_deserialize_round_trips_valid_map() {
        let json = format!("{{\"/sdcard/a\":\"{EMPTY_MD5}\"}}");
        let result: ChecksumResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result.get("/sdcard/a"), Some(EMPTY_MD5));
    }

    #[test]
    fn test_deserialize_rejects_malformed_digest() {
        let err = serde_json::from_str::<ChecksumResult>(r#"{"/sdcard/a":"not-a-digest"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("not-a-digest"), "{err}");

        let short = format!("{{\"/a\":\"{}\"}}", &EMPTY_MD5[..31]);
        assert!(serde_json::from_str::<ChecksumResult>(&short).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unvalidated digest")]
    fn test_insert_digest_asserts_format() {
        ChecksumResult::new().insert_digest("/a", "xyz");
    }
}
