//! Server configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP adapter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Directory holding the browser client (`index.html`, `style.css`,
    /// `script.js`). Static routes are only mounted when set.
    pub static_dir: Option<PathBuf>,
    /// Directory served under `/games/`. Only mounted when set.
    pub games_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: None,
            games_dir: None,
        }
    }
}
