//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Each type implements [`Default`] with production values, and
//! `#[serde(default)]` lets a partial file fill in the rest.

mod remote;
mod server;

pub use remote::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// Example `~/.pollbridge/settings.json`:
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "remote": { "host": "chat.lan", "port": 5000 },
///   "session": { "idleTimeoutMs": 300000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// HTTP listener and static assets.
    pub server: ServerSettings,
    /// Chat server endpoint.
    pub remote: RemoteSettings,
    /// Idle watchdog.
    pub session: SessionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl BridgeSettings {
    /// Reject values that would make the bridge unusable.
    pub fn validate(&self) -> Result<()> {
        if self.remote.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue("remote.host is empty".into()));
        }
        if self.remote.port == 0 {
            return Err(SettingsError::InvalidValue("remote.port is 0".into()));
        }
        for (name, value) in [
            ("remote.connectTimeoutMs", self.remote.connect_timeout_ms),
            ("remote.readIntervalMs", self.remote.read_interval_ms),
            ("session.idleTimeoutMs", self.session.idle_timeout_ms),
            ("session.watchdogIntervalMs", self.session.watchdog_interval_ms),
        ] {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}
