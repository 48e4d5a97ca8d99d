//! Lock-protected session state and the single teardown routine.
//!
//! Every read and mutation of the session goes through a method on
//! [`Session`] that holds the mutex for one short critical section. The lock
//! is a `parking_lot` mutex and is never held across an `.await`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ids::ConnectionId;

/// Write side of the remote connection.
pub type ConnectionWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared handle to the write side. Writes serialize on the async mutex.
pub type SharedWriter = Arc<tokio::sync::Mutex<ConnectionWriter>>;

/// Why a session was torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownReason {
    /// The browser asked to disconnect.
    Disconnect,
    /// No activity for longer than the idle timeout.
    IdleTimeout,
    /// The remote server closed the stream.
    RemoteClosed,
    /// Reading from the remote server failed.
    ReadError,
    /// Writing to the remote server failed.
    WriteError,
    /// The process is shutting down.
    Shutdown,
}

impl TeardownReason {
    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnect => "disconnect",
            Self::IdleTimeout => "idle_timeout",
            Self::RemoteClosed => "remote_closed",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the status message queued on teardown. The browser client
/// resets its UI when a status payload contains `Desconectado`.
pub const DISCONNECTED_PAYLOAD: &str = "🔴 Desconectado";

/// Status value queued for pollers when a session ends.
pub fn status_message(reason: TeardownReason) -> Value {
    json!({
        "type": "status",
        "payload": DISCONNECTED_PAYLOAD,
        "reason": reason.as_str(),
    })
}

/// The live connection owned by the session.
///
/// Connected state, username and socket live in one value, so the session is
/// connected exactly when it holds one of these.
pub(crate) struct ActiveConnection {
    pub(crate) id: ConnectionId,
    pub(crate) username: String,
    pub(crate) writer: SharedWriter,
    pub(crate) cancel: CancellationToken,
}

impl ActiveConnection {
    pub(crate) fn new(username: String, writer: ConnectionWriter) -> Self {
        Self {
            id: ConnectionId::new(),
            username,
            writer: Arc::new(tokio::sync::Mutex::new(writer)),
            cancel: CancellationToken::new(),
        }
    }
}

/// What `send` needs from the active connection, taken in one lock.
///
/// `cancel` fires when the connection is torn down, so an in-flight write
/// can be abandoned and the writer released.
pub(crate) struct WriteHandle {
    pub(crate) id: ConnectionId,
    pub(crate) writer: SharedWriter,
    pub(crate) cancel: CancellationToken,
}

/// Point-in-time view of the session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    /// Whether a TCP connection is active.
    pub connected: bool,
    /// Username of the active connection.
    pub username: Option<String>,
    /// Messages waiting to be polled.
    pub queued: usize,
    /// Seconds since the last facade operation.
    pub idle_secs: u64,
}

struct SessionInner {
    connection: Option<ActiveConnection>,
    queue: Vec<Value>,
    last_activity: Instant,
}

/// The bridge session: at most one connection plus the inbound queue.
pub struct Session {
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Create a disconnected session with an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                connection: None,
                queue: Vec::new(),
                last_activity: Instant::now(),
            }),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        self.inner.lock().last_activity = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.inner.lock().last_activity.elapsed()
    }

    /// Whether a connection is active.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().connection.is_some()
    }

    /// Username of the active connection.
    pub fn username(&self) -> Option<String> {
        self.inner
            .lock()
            .connection
            .as_ref()
            .map(|c| c.username.clone())
    }

    /// Id of the active connection.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.inner.lock().connection.as_ref().map(|c| c.id.clone())
    }

    /// Whether `id` is still the active connection.
    pub fn owns(&self, id: &ConnectionId) -> bool {
        self.inner
            .lock()
            .connection
            .as_ref()
            .is_some_and(|c| &c.id == id)
    }

    /// Install a new connection. Hands it back if one is already active.
    pub(crate) fn attach(&self, connection: ActiveConnection) -> Result<(), ActiveConnection> {
        let mut inner = self.inner.lock();
        if inner.connection.is_some() {
            return Err(connection);
        }
        inner.connection = Some(connection);
        Ok(())
    }

    /// Write handle of the active connection.
    pub(crate) fn writer(&self) -> Option<WriteHandle> {
        self.inner.lock().connection.as_ref().map(|c| WriteHandle {
            id: c.id.clone(),
            writer: Arc::clone(&c.writer),
            cancel: c.cancel.clone(),
        })
    }

    /// Append frames received on connection `id`.
    ///
    /// Frames from a connection that is no longer active are discarded.
    /// Returns the number of frames queued.
    pub fn push_frames<I>(&self, id: &ConnectionId, frames: I) -> usize
    where
        I: IntoIterator<Item = Value>,
    {
        let mut inner = self.inner.lock();
        if !inner.connection.as_ref().is_some_and(|c| &c.id == id) {
            return 0;
        }
        let before = inner.queue.len();
        inner.queue.extend(frames);
        inner.queue.len() - before
    }

    /// Take every queued message, leaving the queue empty.
    pub fn drain(&self) -> Vec<Value> {
        std::mem::take(&mut self.inner.lock().queue)
    }

    /// Number of queued messages.
    pub fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Current state in one consistent read.
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            connected: inner.connection.is_some(),
            username: inner.connection.as_ref().map(|c| c.username.clone()),
            queued: inner.queue.len(),
            idle_secs: inner.last_activity.elapsed().as_secs(),
        }
    }

    /// Tear down the active connection, whichever it is.
    ///
    /// Returns `false` (and does nothing) when already disconnected.
    pub fn teardown(&self, reason: TeardownReason) -> bool {
        let mut inner = self.inner.lock();
        close_locked(&mut inner, reason)
    }

    /// Tear down only if `id` is still the active connection.
    pub fn teardown_connection(&self, id: &ConnectionId, reason: TeardownReason) -> bool {
        let mut inner = self.inner.lock();
        if !inner.connection.as_ref().is_some_and(|c| &c.id == id) {
            return false;
        }
        close_locked(&mut inner, reason)
    }

    /// Tear down if connected and idle for longer than `timeout`.
    ///
    /// The idle check and the teardown share one critical section, so a
    /// concurrent [`touch`](Self::touch) either lands before the check or
    /// after the teardown.
    pub fn teardown_if_idle(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.connection.is_none() {
            return false;
        }
        let idle = inner.last_activity.elapsed();
        if idle <= timeout {
            return false;
        }
        info!(idle_secs = idle.as_secs(), "Session idle past timeout");
        close_locked(&mut inner, TeardownReason::IdleTimeout)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Close and clear the connection, then queue the status message.
///
/// Cancelling the token stops the receiver, which drops the read side, and
/// makes any in-flight `send` abandon its write. Once the last writer handle
/// is dropped the write side is shut down.
fn close_locked(inner: &mut SessionInner, reason: TeardownReason) -> bool {
    let Some(connection) = inner.connection.take() else {
        return false;
    };
    info!(
        username = %connection.username,
        connection_id = %connection.id,
        reason = %reason,
        "Closing TCP connection"
    );
    connection.cancel.cancel();
    drop(connection);
    inner.queue.push(status_message(reason));
    true
}
