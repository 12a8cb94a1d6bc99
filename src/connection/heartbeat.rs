//! Session heartbeat — periodic WebSocket pings plus pong-timeout
//! bookkeeping.
//!
//! The pong counter is informational: operators watch the log, nothing acts
//! on it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::outbound::Outbound;
use super::supervisor::ConnectionState;

/// Fixed binary payload carried by every heartbeat ping.
pub const HEARTBEAT_PAYLOAD: &[u8] = b"corvid-heartbeat";

#[derive(Debug, Default)]
struct PongState {
    awaiting_pong: bool,
    consecutive_timeouts: u32,
}

/// Shared pong-timeout counter, guarded by a mutex.
#[derive(Clone, Default)]
pub struct PongTracker {
    inner: Arc<Mutex<PongState>>,
}

impl PongTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at each heartbeat tick just before pinging.  If the previous
    /// ping is still unanswered, that is a pong timeout.
    pub fn note_ping(&self) {
        let mut state = self.inner.lock().expect("pong mutex poisoned");
        if state.awaiting_pong {
            state.consecutive_timeouts += 1;
            warn!(
                consecutive = state.consecutive_timeouts,
                "pong timeout"
            );
        }
        state.awaiting_pong = true;
    }

    /// Called for each pong frame received on the session.
    pub fn on_pong(&self, payload: &[u8]) {
        debug!(payload_len = payload.len(), "received pong");
        let mut state = self.inner.lock().expect("pong mutex poisoned");
        state.awaiting_pong = false;
        if state.consecutive_timeouts > 0 {
            state.consecutive_timeouts = 0;
        }
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.inner
            .lock()
            .expect("pong mutex poisoned")
            .consecutive_timeouts
    }
}

/// Ping the broker every `period` while the connection state is open.
pub async fn run(
    outbound: Outbound,
    pong: PongTracker,
    state: watch::Receiver<ConnectionState>,
    session: CancellationToken,
    period: Duration,
) {
    info!("starting the heartbeat task");
    let mut ticker = tokio::time::interval(period);
    // The first tick fires immediately; the session has just opened, so skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = session.cancelled() => {
                info!("stopping the heartbeat task");
                break;
            }

            _ = ticker.tick() => {
                if *state.borrow() != ConnectionState::Open {
                    debug!("skipping ping; connection is not open");
                    continue;
                }
                pong.note_ping();
                if let Err(e) = outbound.ping(HEARTBEAT_PAYLOAD.to_vec()).await {
                    warn!(error = %e, "heartbeat ping failed");
                }
            }
        }
    }
}
