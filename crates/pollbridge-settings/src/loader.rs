//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BridgeSettings::default()`]
//! 2. If `~/.pollbridge/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `POLLBRIDGE_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::BridgeSettings;

/// Resolve the path to the settings file (`~/.pollbridge/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pollbridge").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BridgeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or the result fails validation, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn load_file(path: &Path) -> Result<BridgeSettings> {
    let defaults = serde_json::to_value(BridgeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply `POLLBRIDGE_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut BridgeSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_overrides_from<F>(settings: &mut BridgeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("POLLBRIDGE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("POLLBRIDGE_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("POLLBRIDGE_STATIC_DIR") {
        settings.server.static_dir = v;
    }
    if let Some(v) = env.string("POLLBRIDGE_GAMES_DIR") {
        settings.server.games_dir = v;
    }

    // ── Remote ──────────────────────────────────────────────────────
    if let Some(v) = env.string("POLLBRIDGE_REMOTE_HOST") {
        settings.remote.host = v;
    }
    if let Some(v) = env.u16("POLLBRIDGE_REMOTE_PORT", 1, 65535) {
        settings.remote.port = v;
    }
    if let Some(v) = env.u64("POLLBRIDGE_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.remote.connect_timeout_ms = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = env.u64("POLLBRIDGE_IDLE_TIMEOUT_MS", 1_000, 86_400_000) {
        settings.session.idle_timeout_ms = v;
    }
    if let Some(v) = env.u64("POLLBRIDGE_WATCHDOG_INTERVAL_MS", 100, 3_600_000) {
        settings.session.watchdog_interval_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("POLLBRIDGE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"remote": {"host": "127.0.0.1", "port": 5000}});
        let source = serde_json::json!({"remote": {"port": 6000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["remote"]["port"], 6000);
        assert_eq!(merged["remote"]["host"], "127.0.0.1");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.remote.port, 5000);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"remote": {"host": "chat.lan"}, "session": {"idleTimeoutMs": 300000}}"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.remote.host, "chat.lan");
        assert_eq!(settings.remote.port, 5000);
        assert_eq!(settings.session.idle_timeout_ms, 300_000);
        assert_eq!(settings.session.watchdog_interval_ms, 5_000);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"session": {"watchdogIntervalMs": 0}}"#).unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = BridgeSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup(&[
                ("POLLBRIDGE_PORT", "9000"),
                ("POLLBRIDGE_REMOTE_HOST", "10.0.0.5"),
                ("POLLBRIDGE_REMOTE_PORT", "5555"),
                ("POLLBRIDGE_IDLE_TIMEOUT_MS", "30000"),
                ("POLLBRIDGE_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.remote.host, "10.0.0.5");
        assert_eq!(settings.remote.port, 5555);
        assert_eq!(settings.session.idle_timeout_ms, 30_000);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn env_invalid_values_ignored() {
        let mut settings = BridgeSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup(&[
                ("POLLBRIDGE_PORT", "not-a-port"),
                ("POLLBRIDGE_REMOTE_PORT", "0"),
                ("POLLBRIDGE_IDLE_TIMEOUT_MS", "5"),
                ("POLLBRIDGE_REMOTE_HOST", ""),
            ]),
        );
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.remote.port, 5000);
        assert_eq!(settings.session.idle_timeout_ms, 120_000);
        assert_eq!(settings.remote.host, "127.0.0.1");
    }

    #[test]
    fn env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"remote": {"port": 6000}}"#).unwrap();

        let mut settings = load_file(&path).unwrap();
        apply_overrides_from(&mut settings, lookup(&[("POLLBRIDGE_REMOTE_PORT", "7000")]));
        assert_eq!(settings.remote.port, 7000);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("8000", 1, 65535), Some(8000));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u16_range("abc", 1, 65535), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("1000", 1000, 2000), Some(1000));
        assert_eq!(parse_u64_range("2001", 1000, 2000), None);
        assert_eq!(parse_u64_range("-1", 0, 10), None);
    }

    #[test]
    fn settings_path_ends_with_file_name() {
        let path = settings_path();
        assert!(path.ends_with(".pollbridge/settings.json"));
    }
}
