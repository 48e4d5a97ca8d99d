//! Idle watchdog: tears the session down after a period of inactivity.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::Session;

/// Periodically evaluates the session's idle time.
///
/// Teardown can lag the nominal timeout by up to one `check_interval`.
pub struct IdleWatchdog {
    session: Arc<Session>,
    idle_timeout: Duration,
    check_interval: Duration,
}

impl IdleWatchdog {
    /// Create a watchdog for `session`.
    pub fn new(session: Arc<Session>, idle_timeout: Duration, check_interval: Duration) -> Self {
        Self {
            session,
            idle_timeout,
            check_interval,
        }
    }

    /// Run one evaluation. Returns `true` if the session was torn down.
    pub fn evaluate(&self) -> bool {
        self.session.teardown_if_idle(self.idle_timeout)
    }

    /// Spawn the check loop. It exits when `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                idle_timeout_secs = self.idle_timeout.as_secs(),
                check_interval_secs = self.check_interval.as_secs(),
                "Idle watchdog started"
            );
            let mut ticker = tokio::time::interval(self.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let _ = ticker.tick().await; // consume first immediate tick

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if self.evaluate() {
                            info!("Idle session released");
                        } else {
                            debug!("Idle check passed");
                        }
                    }
                }
            }
            debug!("Idle watchdog stopped");
        })
    }
}
