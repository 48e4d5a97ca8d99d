//! Chat server endpoint and session timing.

use serde::{Deserialize, Serialize};

/// Chat server endpoint settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteSettings {
    /// Chat server host.
    pub host: String,
    /// Chat server port.
    pub port: u16,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Upper bound on each receiver wait in milliseconds.
    pub read_interval_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            connect_timeout_ms: 5_000,
            read_interval_ms: 1_000,
        }
    }
}

/// Idle watchdog settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Inactivity before the session is closed, in milliseconds.
    pub idle_timeout_ms: u64,
    /// Period between watchdog checks, in milliseconds.
    pub watchdog_interval_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 120_000,
            watchdog_interval_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_defaults() {
        let r = RemoteSettings::default();
        assert_eq!(r.host, "127.0.0.1");
        assert_eq!(r.port, 5000);
        assert_eq!(r.connect_timeout_ms, 5_000);
        assert_eq!(r.read_interval_ms, 1_000);
    }

    #[test]
    fn session_defaults() {
        let s = SessionSettings::default();
        assert_eq!(s.idle_timeout_ms, 120_000);
        assert_eq!(s.watchdog_interval_ms, 5_000);
    }

    #[test]
    fn deserialize_camel_case() {
        let json = r#"{"idleTimeoutMs": 60000, "watchdogIntervalMs": 1000}"#;
        let s: SessionSettings = serde_json::from_str(json).unwrap();
        assert_eq!(s.idle_timeout_ms, 60_000);
        assert_eq!(s.watchdog_interval_ms, 1_000);
    }
}
