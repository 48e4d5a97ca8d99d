//! Background task that reads one connection and fills the session queue.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::frame::FrameDecoder;
use crate::ids::ConnectionId;
use crate::session::{Session, TeardownReason};

/// Read size for one socket read.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Reads frames from one connection until it ends.
pub struct ReceiverLoop<R> {
    session: Arc<Session>,
    connection_id: ConnectionId,
    reader: R,
    cancel: CancellationToken,
    read_interval: Duration,
}

impl<R> ReceiverLoop<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Bind a receiver to connection `connection_id`.
    ///
    /// `read_interval` bounds each wait for data; when it elapses the loop
    /// re-checks that its connection is still the active one.
    pub fn new(
        session: Arc<Session>,
        connection_id: ConnectionId,
        reader: R,
        cancel: CancellationToken,
        read_interval: Duration,
    ) -> Self {
        Self {
            session,
            connection_id,
            reader,
            cancel,
            read_interval,
        }
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<TeardownReason> {
        tokio::spawn(self.run())
    }

    /// Run until end-of-stream, a read error, or external teardown.
    ///
    /// Always finishes with a teardown scoped to its own connection and
    /// returns the reason the loop stopped.
    pub async fn run(mut self) -> TeardownReason {
        info!(connection_id = %self.connection_id, "Receiver started");
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        let reason = loop {
            let read = tokio::select! {
                () = self.cancel.cancelled() => break TeardownReason::Disconnect,
                read = tokio::time::timeout(self.read_interval, self.reader.read(&mut buf)) => read,
            };

            match read {
                Err(_elapsed) => {
                    if !self.session.owns(&self.connection_id) {
                        break TeardownReason::Disconnect;
                    }
                }
                Ok(Ok(0)) => {
                    info!(connection_id = %self.connection_id, "Remote closed connection");
                    break TeardownReason::RemoteClosed;
                }
                Ok(Ok(n)) => {
                    let frames: Vec<Value> = decoder.feed(&buf[..n]).collect();
                    let queued = self.session.push_frames(&self.connection_id, frames);
                    debug!(
                        connection_id = %self.connection_id,
                        bytes = n,
                        frames = queued,
                        buffered = decoder.buffered(),
                        "Read chunk"
                    );
                }
                Ok(Err(e)) => {
                    warn!(connection_id = %self.connection_id, error = %e, "Read failed");
                    break TeardownReason::ReadError;
                }
            }
        };

        let _ = self.session.teardown_connection(&self.connection_id, reason);
        info!(connection_id = %self.connection_id, reason = %reason, "Receiver stopped");
        reason
    }
}
