//! The operation set consumed by the HTTP adapter.
//!
//! [`Bridge`] orchestrates the session, the TCP connection and the receiver
//! task. Every operation counts as activity for the idle watchdog.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::errors::BridgeError;
use crate::receiver::ReceiverLoop;
use crate::session::{ActiveConnection, Session, SessionSnapshot, SharedWriter, TeardownReason};
use crate::watchdog::IdleWatchdog;

/// Remote endpoint and timing configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Chat server host.
    pub remote_host: String,
    /// Chat server port.
    pub remote_port: u16,
    /// Upper bound on the TCP connect.
    pub connect_timeout: Duration,
    /// Upper bound on each receiver wait before it re-checks ownership.
    pub read_interval: Duration,
    /// Inactivity after which the watchdog closes the session.
    pub idle_timeout: Duration,
    /// Period between watchdog checks.
    pub watchdog_interval: Duration,
}

impl BridgeConfig {
    /// `host:port` of the chat server.
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            remote_host: "127.0.0.1".into(),
            remote_port: 5000,
            connect_timeout: Duration::from_secs(5),
            read_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(120),
            watchdog_interval: Duration::from_secs(5),
        }
    }
}

/// Single-session bridge between the polling client and the chat server.
pub struct Bridge {
    session: Arc<Session>,
    config: BridgeConfig,
    /// Serializes `connect` so at most one connection is ever opened.
    connect_lock: tokio::sync::Mutex<()>,
}

impl Bridge {
    /// Create a bridge with a fresh session.
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_session(config, Arc::new(Session::new()))
    }

    /// Create a bridge around an existing session.
    pub fn with_session(config: BridgeConfig, session: Arc<Session>) -> Self {
        Self {
            session,
            config,
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The shared session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Build the idle watchdog for this bridge's session.
    pub fn watchdog(&self) -> IdleWatchdog {
        IdleWatchdog::new(
            Arc::clone(&self.session),
            self.config.idle_timeout,
            self.config.watchdog_interval,
        )
    }

    /// Open the chat connection for `username`.
    ///
    /// Sends the raw username as the handshake and starts the receiver.
    pub async fn connect(&self, username: &str) -> Result<(), BridgeError> {
        self.session.touch();
        if username.trim().is_empty() {
            return Err(BridgeError::EmptyUsername);
        }

        let _guard = self.connect_lock.lock().await;
        if let Some(active) = self.session.username() {
            return Err(BridgeError::AlreadyConnected(active));
        }

        let addr = self.config.remote_addr();
        let timeout = self.config.connect_timeout;
        let mut stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(BridgeError::from_connect_io(addr, timeout, e)),
            Err(_) => return Err(BridgeError::ConnectTimeout { addr, timeout }),
        };
        let peer = stream.peer_addr().ok();

        write_handshake(&mut stream, username).await?;

        let (reader, writer) = stream.into_split();
        let connection = ActiveConnection::new(username.to_string(), Box::new(writer));
        let connection_id = connection.id.clone();
        let cancel = connection.cancel.clone();

        if self.session.attach(connection).is_err() {
            return Err(BridgeError::AlreadyConnected(
                self.session.username().unwrap_or_default(),
            ));
        }

        let _receiver = ReceiverLoop::new(
            Arc::clone(&self.session),
            connection_id.clone(),
            reader,
            cancel,
            self.config.read_interval,
        )
        .spawn();

        info!(
            username,
            peer = ?peer,
            connection_id = %connection_id,
            "TCP connection established"
        );
        Ok(())
    }

    /// Write `message` to the chat server as raw bytes, no delimiter added.
    ///
    /// A teardown while the write is pending abandons it and returns
    /// [`BridgeError::NotConnected`].
    pub async fn send(&self, message: &str) -> Result<(), BridgeError> {
        self.session.touch();
        let handle = self.session.writer().ok_or(BridgeError::NotConnected)?;

        let result = tokio::select! {
            biased;
            () = handle.cancel.cancelled() => {
                info!(connection_id = %handle.id, "Send abandoned by teardown");
                return Err(BridgeError::NotConnected);
            }
            result = write_message(&handle.writer, message.as_bytes()) => result,
        };

        if let Err(e) = result {
            warn!(connection_id = %handle.id, error = %e, "Write failed");
            let _ = self
                .session
                .teardown_connection(&handle.id, TeardownReason::WriteError);
            return Err(BridgeError::Send(e));
        }
        Ok(())
    }

    /// Drain every message received since the last poll.
    pub fn poll(&self) -> Vec<Value> {
        self.session.touch();
        self.session.drain()
    }

    /// Close the session. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        self.session.touch();
        let _ = self.session.teardown(TeardownReason::Disconnect);
    }

    /// Best-effort teardown on process exit.
    pub fn shutdown(&self) {
        if self.session.teardown(TeardownReason::Shutdown) {
            info!("Session closed for shutdown");
        }
    }

    /// Current session state. Does not count as activity.
    pub fn status(&self) -> SessionSnapshot {
        self.session.snapshot()
    }
}

/// Send the username as the first bytes on the connection.
async fn write_handshake<W>(writer: &mut W, username: &str) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(username.as_bytes())
        .await
        .map_err(BridgeError::Handshake)
}

/// Serialize on the writer lock, then write and flush.
async fn write_message(writer: &SharedWriter, bytes: &[u8]) -> io::Result<()> {
    let mut writer = writer.lock().await;
    writer.write_all(bytes).await?;
    writer.flush().await
}
