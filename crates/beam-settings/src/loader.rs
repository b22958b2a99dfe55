//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeamSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `BEAM_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::BeamSettings;

/// Resolve the default settings file path (`~/.beam/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beam").join("settings.json")
}

/// Settings after every layer, plus the env overrides that were rejected.
///
/// Loading runs before logging is configured, so rejections are handed back
/// for the caller to report once a subscriber is installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedSettings {
    /// Final, validated settings.
    pub settings: BeamSettings,
    /// Overrides that kept the file/default value.
    pub ignored: Vec<IgnoredOverride>,
}

/// A `BEAM_*` variable whose value was not applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IgnoredOverride {
    /// Variable name.
    pub key: &'static str,
    /// Raw value as found.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl IgnoredOverride {
    /// Emit the rejection as a warning.
    pub fn log(&self) {
        warn!(key = self.key, value = %self.value, reason = %self.reason, "ignoring env var");
    }
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or an invalid final value is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<LoadedSettings> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Load settings from `path`, resolving overrides through `lookup`.
pub fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<LoadedSettings> {
    let defaults =
        serde_json::to_value(BeamSettings::default()).map_err(|source| SettingsError::Malformed {
            path: PathBuf::from("<defaults>"),
            source,
        })?;
    let malformed = |source: serde_json::Error| SettingsError::Malformed {
        path: path.to_path_buf(),
        source,
    };

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(malformed)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BeamSettings = serde_json::from_value(merged).map_err(malformed)?;
    let ignored = apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(LoadedSettings { settings, ignored })
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `BEAM_*` overrides, reading each key through `lookup`.
///
/// Values that fail to parse or fall outside their range keep the
/// file/default value and are returned.
pub fn apply_overrides(
    settings: &mut BeamSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<IgnoredOverride> {
    let env = Env {
        lookup: &lookup,
        ignored: RefCell::new(Vec::new()),
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("BEAM_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("BEAM_PORT", 0u16, u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("BEAM_MAX_CONNECTIONS", 1usize, 1_000_000) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.parsed("BEAM_HEARTBEAT_INTERVAL_SECS", 1u64, 3600) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = env.parsed("BEAM_HEARTBEAT_TIMEOUT_SECS", 1u64, 86_400) {
        settings.server.heartbeat_timeout_secs = v;
    }

    // ── Relay ───────────────────────────────────────────────────────
    if let Some(v) = env.parsed("BEAM_MAX_FILE_BYTES", 1usize, 1 << 30) {
        settings.relay.max_file_bytes = v;
    }
    if let Some(v) = env.parsed("BEAM_MAX_TEXT_BYTES", 1usize, 1 << 26) {
        settings.relay.max_text_bytes = v;
    }
    if let Some(v) = env.parsed("BEAM_QUEUE_CAPACITY", 1usize, 65_536) {
        settings.relay.queue_capacity = v;
    }
    if let Some(v) = env.parsed("BEAM_SLOW_CLIENT_DROP_LIMIT", 1u64, 1_000_000) {
        settings.relay.slow_client_drop_limit = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("BEAM_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("BEAM_LOG_FORMAT") {
        match v.parse() {
            Ok(format) => settings.logging.format = format,
            Err(reason) => env.ignore("BEAM_LOG_FORMAT", v, reason),
        }
    }

    env.ignored.into_inner()
}

/// Parse `val` as a number within `[min, max]`.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
    ignored: RefCell<Vec<IgnoredOverride>>,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn ignore(&self, key: &'static str, value: String, reason: impl Into<String>) {
        self.ignored.borrow_mut().push(IgnoredOverride {
            key,
            value,
            reason: reason.into(),
        });
    }

    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &'static str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
    {
        let val = (self.lookup)(name)?;
        let result = parse_range(&val, min, max);
        if result.is_none() {
            let reason = format!("expected a number in {min}..={max}");
            self.ignore(name, val, reason);
        }
        result
    }
}
