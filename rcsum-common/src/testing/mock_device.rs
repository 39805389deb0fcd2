//! Scripted in-memory [`RemoteDevice`].
//!
//! The mock keeps a small filesystem of path → digest and records every call.
//! `sh <script>` is emulated by reading the pushed hash script back and
//! answering each clause from that filesystem, so tests exercise the real
//! script text rather than a canned response.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::device::{RemoteDevice, ShellOutput, shell_join};
use crate::error::{ChecksumError, Result};
use crate::remote::{DEVICE_BIN_PATH, DEVICE_LIB_PATH};

#[derive(Debug, Default)]
struct State {
    /// `None` marks a file that exists but yields no digest.
    files: BTreeMap<String, Option<String>>,
    scripts: Vec<(String, String)>,
    pushes: Vec<(PathBuf, String)>,
    shell_commands: Vec<String>,
    detached_removals: Vec<String>,
    exists_queries: usize,
}

#[derive(Debug)]
pub struct MockDevice {
    serial: String,
    pie_wrapper: String,
    script_output: Option<Vec<String>>,
    noise: Vec<String>,
    fail_push: bool,
    fail_commands: Vec<String>,
    hang_commands: Vec<String>,
    state: Mutex<State>,
}

impl MockDevice {
    pub fn builder() -> MockDeviceBuilder {
        MockDeviceBuilder::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of `file_exists` calls so far.
    pub fn exists_queries(&self) -> usize {
        self.state().exists_queries
    }

    /// `(local, remote)` for every push attempt, failed ones included.
    pub fn pushes(&self) -> Vec<(PathBuf, String)> {
        self.state().pushes.clone()
    }

    /// Every shell command as the device shell would see it.
    pub fn shell_commands(&self) -> Vec<String> {
        self.state().shell_commands.clone()
    }

    /// `(remote, contents)` for each pushed script.
    pub fn pushed_scripts(&self) -> Vec<(String, String)> {
        self.state().scripts.clone()
    }

    /// Paths handed to [`RemoteDevice::remove_detached`].
    pub fn detached_removals(&self) -> Vec<String> {
        self.state().detached_removals.clone()
    }

    /// Paths currently present on the device.
    pub fn files(&self) -> Vec<String> {
        self.state().files.keys().cloned().collect()
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state().files.contains_key(path)
    }

    fn run_script(&self, state: &State, remote: &str) -> ShellOutput {
        let Some((_, body)) = state.scripts.iter().rev().find(|(path, _)| path == remote) else {
            return ShellOutput {
                lines: vec![format!("sh: {remote}: No such file or directory")],
                status: Some(127),
            };
        };

        if let Some(lines) = &self.script_output {
            return ShellOutput {
                lines: lines.clone(),
                status: Some(0),
            };
        }

        let mut lines = self.noise.clone();
        let mut status = Some(0);
        for clause in body.split("; ") {
            let marker = format!("{DEVICE_BIN_PATH} ");
            let Some(idx) = clause.find(&marker) else {
                continue;
            };
            let path = unquote(&clause[idx + marker.len()..]);
            let emitted = digest_lines(&state.files, &path);
            status = Some(if exists(&state.files, &path) { 0 } else { 1 });
            lines.extend(emitted);
        }
        ShellOutput { lines, status }
    }
}

impl RemoteDevice for MockDevice {
    fn serial(&self) -> &str {
        &self.serial
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let mut state = self.state();
        state.exists_queries += 1;
        Ok(exists(&state.files, path))
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let mut state = self.state();
        state.pushes.push((local.to_path_buf(), remote.to_string()));
        if self.fail_push {
            return Err(ChecksumError::Transport {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                reason: "device offline".to_string(),
            });
        }

        if remote == DEVICE_LIB_PATH {
            state.files.insert(DEVICE_BIN_PATH.to_string(), None);
        } else {
            let contents = std::fs::read_to_string(local)?;
            state.scripts.push((remote.to_string(), contents));
            state.files.insert(remote.to_string(), None);
        }
        Ok(())
    }

    async fn run_shell_command(&self, argv: &[&str]) -> Result<ShellOutput> {
        let program = argv.first().copied().unwrap_or_default();
        if self.hang_commands.iter().any(|name| name == program) {
            self.state().shell_commands.push(shell_join(argv));
            return std::future::pending().await;
        }

        let mut state = self.state();
        state.shell_commands.push(shell_join(argv));

        if self.fail_commands.iter().any(|name| name == program) {
            return Ok(ShellOutput {
                lines: vec![format!("{program}: Permission denied")],
                status: Some(1),
            });
        }

        let output = match argv {
            ["touch", path] => {
                state.files.entry((*path).to_string()).or_insert(None);
                ShellOutput {
                    lines: Vec::new(),
                    status: Some(0),
                }
            }
            ["rm", "-f", path] => {
                state.files.remove(*path);
                ShellOutput {
                    lines: Vec::new(),
                    status: Some(0),
                }
            }
            ["test", "-e", path] => ShellOutput {
                lines: Vec::new(),
                status: Some(if exists(&state.files, path) { 0 } else { 1 }),
            },
            ["sh", script] => self.run_script(&state, script),
            _ => ShellOutput {
                lines: Vec::new(),
                status: Some(0),
            },
        };
        Ok(output)
    }

    async fn pie_wrapper(&self) -> Result<String> {
        Ok(self.pie_wrapper.clone())
    }

    fn remove_detached(&self, path: &str) {
        let mut state = self.state();
        state.files.remove(path);
        state.detached_removals.push(path.to_string());
    }
}

#[derive(Debug, Default)]
pub struct MockDeviceBuilder {
    serial: Option<String>,
    pie_wrapper: String,
    script_output: Option<Vec<String>>,
    noise: Vec<String>,
    fail_push: bool,
    fail_commands: Vec<String>,
    hang_commands: Vec<String>,
    files: BTreeMap<String, Option<String>>,
}

impl MockDeviceBuilder {
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Start with the md5sum helper already provisioned.
    pub fn installed(mut self) -> Self {
        self.files.insert(DEVICE_BIN_PATH.to_string(), None);
        self
    }

    /// A file that hashes to `digest`.
    pub fn with_file(mut self, path: impl Into<String>, digest: impl Into<String>) -> Self {
        self.files.insert(path.into(), Some(digest.into()));
        self
    }

    /// A file that exists but never produces a checksum line.
    pub fn with_unreadable_file(mut self, path: impl Into<String>) -> Self {
        self.files.insert(path.into(), None);
        self
    }

    /// Answer every hash script with these lines instead of emulating it.
    pub fn script_output(mut self, lines: Vec<String>) -> Self {
        self.script_output = Some(lines);
        self
    }

    /// Extra non-checksum output emitted before the digests.
    pub fn noise(mut self, line: impl Into<String>) -> Self {
        self.noise.push(line.into());
        self
    }

    pub fn pie_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.pie_wrapper = wrapper.into();
        self
    }

    /// Fail every push with a transport error.
    pub fn fail_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    /// Make shell commands starting with `program` exit with status 1.
    pub fn fail_command(mut self, program: impl Into<String>) -> Self {
        self.fail_commands.push(program.into());
        self
    }

    /// Make shell commands starting with `program` never complete.
    pub fn hang_command(mut self, program: impl Into<String>) -> Self {
        self.hang_commands.push(program.into());
        self
    }

    pub fn build(self) -> MockDevice {
        MockDevice {
            serial: self.serial.unwrap_or_else(|| "mock-device".to_string()),
            pie_wrapper: self.pie_wrapper,
            script_output: self.script_output,
            noise: self.noise,
            fail_push: self.fail_push,
            fail_commands: self.fail_commands,
            hang_commands: self.hang_commands,
            state: Mutex::new(State {
                files: self.files,
                ..State::default()
            }),
        }
    }
}

fn exists(files: &BTreeMap<String, Option<String>>, path: &str) -> bool {
    if files.contains_key(path) {
        return true;
    }
    let prefix = format!("{}/", path.trim_end_matches('/'));
    files.keys().any(|key| key.starts_with(&prefix))
}

fn digest_lines(files: &BTreeMap<String, Option<String>>, path: &str) -> Vec<String> {
    if let Some(entry) = files.get(path) {
        return entry
            .iter()
            .map(|digest| format!("{digest}  {path}"))
            .collect();
    }
    let prefix = format!("{}/", path.trim_end_matches('/'));
    files
        .iter()
        .filter(|(key, _)| key.starts_with(&prefix))
        .filter_map(|(key, digest)| digest.as_ref().map(|d| format!("{d}  {key}")))
        .collect()
}

/// Undo POSIX single-quote escaping for one word.
fn unquote(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars();
    let mut quoted = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\'' => quoted = !quoted,
            '\\' if !quoted => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("/sdcard/a"), "/sdcard/a");
        assert_eq!(unquote("'/sdcard/My File'"), "/sdcard/My File");
        assert_eq!(unquote("'it'\\''s'"), "it's");
    }

    #[tokio::test]
    async fn test_records_calls() {
        let device = MockDevice::builder().serial("emulator-5554").build();
        assert_eq!(device.serial(), "emulator-5554");

        assert!(!device.file_exists("/sdcard/a").await.unwrap());
        device.run_shell_command(&["touch", "/sdcard/a"]).await.unwrap();
        assert!(device.file_exists("/sdcard/a").await.unwrap());
        assert!(device.file_exists("/sdcard").await.unwrap());

        assert_eq!(device.exists_queries(), 3);
        assert_eq!(device.shell_commands(), vec!["touch /sdcard/a"]);
    }

    #[tokio::test]
    async fn test_emulates_hash_script() {
        let device = MockDevice::builder()
            .with_file("/sdcard/My File", MD5)
            .build();
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("s.sh");
        std::fs::write(
            &script,
            format!(
                "test -f '/sdcard/My File' && {DEVICE_BIN_PATH} '/sdcard/My File'; \
                 test -f /sdcard/none && {DEVICE_BIN_PATH} /sdcard/none"
            ),
        )
        .unwrap();

        device.push(&script, "/data/local/tmp/s.sh").await.unwrap();
        let output = device
            .run_shell_command(&["sh", "/data/local/tmp/s.sh"])
            .await
            .unwrap();
        assert_eq!(output.lines, vec![format!("{MD5}  /sdcard/My File")]);
        assert_eq!(output.status, Some(1));
    }

    #[tokio::test]
    async fn test_fail_push() {
        let device = MockDevice::builder().fail_push().build();
        let err = device
            .push(Path::new("/tmp/x"), DEVICE_LIB_PATH)
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::Transport { .. }));
        assert_eq!(device.pushes().len(), 1);
        assert!(!device.has_file(DEVICE_BIN_PATH));
    }
}
