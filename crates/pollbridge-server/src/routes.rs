//! Bridge endpoints: `/connect`, `/send`, `/poll`, `/disconnect`.
//!
//! Bodies are read as raw bytes and parsed as JSON regardless of the
//! `Content-Type` header, since the browser client posts some requests with
//! `navigator.sendBeacon`. Failures are reported in the JSON body with HTTP
//! 200 so the client can render them.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use pollbridge_core::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::server::AppState;

/// `POST /connect` body.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// Chat username, sent as the handshake.
    pub username: String,
}

/// `POST /send` body.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Raw message text forwarded to the chat server.
    pub message: String,
}

/// Result body for the mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `"ok"` or `"error"`.
    pub status: String,
    /// Human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl StatusResponse {
    /// Success without detail.
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
            msg: None,
        }
    }

    /// Success with a message.
    pub fn ok_with(msg: impl Into<String>) -> Self {
        Self {
            status: "ok".into(),
            msg: Some(msg.into()),
        }
    }

    /// Failure with a message.
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            msg: Some(msg.into()),
        }
    }
}

impl From<&BridgeError> for StatusResponse {
    fn from(err: &BridgeError) -> Self {
        Self::error(err.to_string())
    }
}

fn log_failure(op: &'static str, err: &BridgeError) {
    if err.is_user_visible() {
        info!(op, kind = err.error_kind(), "{err}");
    } else {
        warn!(op, kind = err.error_kind(), error = %err, "Bridge operation failed");
    }
}

/// POST /connect
pub async fn connect(State(state): State<AppState>, body: Bytes) -> Json<StatusResponse> {
    let req: ConnectRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return Json(StatusResponse::error(format!("invalid request body: {e}"))),
    };

    match state.bridge.connect(&req.username).await {
        Ok(()) => Json(StatusResponse::ok_with("Connected")),
        Err(err) => {
            log_failure("connect", &err);
            Json(StatusResponse::from(&err))
        }
    }
}

/// POST /send
pub async fn send(State(state): State<AppState>, body: Bytes) -> Json<StatusResponse> {
    let req: SendRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return Json(StatusResponse::error(format!("invalid request body: {e}"))),
    };

    match state.bridge.send(&req.message).await {
        Ok(()) => Json(StatusResponse::ok()),
        Err(err) => {
            log_failure("send", &err);
            Json(StatusResponse::from(&err))
        }
    }
}

/// GET /poll
pub async fn poll(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.bridge.poll())
}

/// POST /disconnect
pub async fn disconnect(State(state): State<AppState>) -> Json<StatusResponse> {
    state.bridge.disconnect();
    Json(StatusResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_omits_msg() {
        let json = serde_json::to_value(StatusResponse::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok"}));
    }

    #[test]
    fn error_carries_msg() {
        let json = serde_json::to_value(StatusResponse::error("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "msg": "nope"}));
    }

    #[test]
    fn from_bridge_error_uses_display() {
        let resp = StatusResponse::from(&BridgeError::NotConnected);
        assert_eq!(resp.status, "error");
        assert_eq!(resp.msg.as_deref(), Some("not connected"));
    }

    #[test]
    fn requests_deserialize() {
        let c: ConnectRequest = serde_json::from_str(r#"{"username":"alice"}"#).unwrap();
        assert_eq!(c.username, "alice");
        let s: SendRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(s.message, "hi");
        assert!(serde_json::from_str::<SendRequest>("{}").is_err());
    }
}
