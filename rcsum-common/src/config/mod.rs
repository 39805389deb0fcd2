//! Configuration system for rcsum.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `RCSUM_*` environment variables, then command-line flags. Every value
//! remembers which layer set it.

pub mod env;
pub mod settings;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use settings::{ChecksumConfig, ConfigError, FileConfig};
pub use source::{ConfigSource, Sourced};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
