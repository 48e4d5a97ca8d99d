//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use pollbridge_core::SessionSnapshot;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Whether the chat connection is open.
    pub connected: bool,
    /// Messages waiting to be polled.
    pub queued_messages: usize,
    /// Seconds since the browser last touched the session.
    pub idle_secs: u64,
}

/// Build a health response from the current session state.
pub fn health_check(start_time: Instant, session: &SessionSnapshot) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connected: session.connected,
        queued_messages: session.queued,
        idle_secs: session.idle_secs,
    }
}
