//! Bridge error types.

use std::io;
use std::time::Duration;

/// Typed error hierarchy for bridge operations.
///
/// Classifies errors as user-visible (the browser did something the session
/// state does not allow) or transport (the TCP side failed).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // User-visible
    /// `connect` was called while a session is already active.
    #[error("already connected as {0}")]
    AlreadyConnected(String),
    /// `send` was called with no active session.
    #[error("not connected")]
    NotConnected,
    /// `connect` was called with an empty username.
    #[error("username must not be empty")]
    EmptyUsername,

    // Transport
    /// The TCP connect did not complete within the configured timeout.
    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Remote `host:port`.
        addr: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// The remote host actively refused the connection.
    #[error("connection to {addr} refused")]
    ConnectRefused {
        /// Remote `host:port`.
        addr: String,
    },
    /// Any other failure while opening the connection.
    #[error("connection to {addr} failed: {source}")]
    Connect {
        /// Remote `host:port`.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing the username handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(#[source] io::Error),
    /// Writing an outgoing message failed. The connection has been torn down.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
}

impl BridgeError {
    /// Classify a connect-phase I/O error.
    ///
    /// `timeout` is the configured connect bound, reported when the OS
    /// gives up first.
    pub fn from_connect_io(addr: String, timeout: Duration, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectRefused { addr },
            io::ErrorKind::TimedOut => Self::ConnectTimeout { addr, timeout },
            _ => Self::Connect { addr, source },
        }
    }

    /// Whether the error reflects session state rather than a transport fault.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::AlreadyConnected(_) | Self::NotConnected | Self::EmptyUsername
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AlreadyConnected(_) => "already_connected",
            Self::NotConnected => "not_connected",
            Self::EmptyUsername => "empty_username",
            Self::ConnectTimeout { .. } => "connect_timeout",
            Self::ConnectRefused { .. } => "connect_refused",
            Self::Connect { .. } => "connect_failed",
            Self::Handshake(_) => "handshake_failed",
            Self::Send(_) => "send_failed",
        }
    }
}
