//! Outbound message path — a clonable handle over the session's outgoing
//! queue, and the writer task that drains the queue into the socket sink.
//!
//! The handle is the only way the processor and workers reach the socket.
//! Every frame is validated against the network-message schema before it is
//! queued; sends carry a per-send timeout.  Tests build the channel pair
//! directly and read the receiver end instead of opening a socket.

use std::time::Duration;

use futures_util::{Sink, SinkExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::protocol::{schemas, WireFrame};

/// Per-send timeout for outgoing messages.
pub const DEFAULT_MSG_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SendError {
    #[error("outbound message failed schema validation: {0:?}")]
    Invalid(Vec<String>),

    #[error("outbound serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("outbound queue closed")]
    Closed,

    #[error("outbound send timed out")]
    Timeout,
}

#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
}

impl Outbound {
    /// Build the handle plus the receiver the writer task (or a test) owns.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Validate, serialise, and queue a frame.
    pub async fn send_frame(&self, frame: &WireFrame) -> Result<(), SendError> {
        let value = frame.to_value()?;
        schemas::validate(&schemas::NETWORK_MESSAGE, &value).map_err(SendError::Invalid)?;

        self.queue(Message::Text(value.to_string())).await
    }

    /// Queue a WebSocket ping frame.
    pub async fn ping(&self, payload: Vec<u8>) -> Result<(), SendError> {
        self.queue(Message::Ping(payload)).await
    }

    async fn queue(&self, message: Message) -> Result<(), SendError> {
        match self.tx.send_timeout(message, DEFAULT_MSG_TIMEOUT).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(SendError::Timeout),
            Err(SendTimeoutError::Closed(_)) => Err(SendError::Closed),
        }
    }
}

/// Drain the outbound queue into the socket sink until the session ends.
///
/// A sink error cancels the session token so the supervisor tears the
/// session down and reconnects.
pub async fn writer_task<S>(
    mut rx: mpsc::Receiver<Message>,
    mut sink: S,
    session: CancellationToken,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        tokio::select! {
            biased;

            _ = session.cancelled() => {
                debug!("writer task stopping");
                break;
            }

            msg = rx.recv() => {
                match msg {
                    Some(msg) => {
                        if let Err(e) = sink.send(msg).await {
                            error!(error = %e, "socket send failed — ending session");
                            session.cancel();
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::rpc;
    use serde_json::json;

    #[tokio::test]
    async fn valid_frame_reaches_the_queue() {
        let (outbound, mut rx) = Outbound::channel(4);
        let frame = rpc::blocking_response(
            "corvid://localhost/agent",
            "corvid://controller/site",
            "t1",
            json!({"message": "hi"}),
            vec![],
        );
        outbound.send_frame(&frame).await.unwrap();

        match rx.recv().await {
            Some(Message::Text(text)) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["data"]["transaction_id"], json!("t1"));
            }
            other => panic!("expected text message, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_queue_is_a_send_error() {
        let (outbound, rx) = Outbound::channel(1);
        drop(rx);
        let frame = rpc::rpc_error(
            "corvid://localhost/agent",
            "corvid://controller/site",
            "t1",
            2,
            "broker gone",
            vec![],
        );
        assert!(matches!(
            outbound.send_frame(&frame).await,
            Err(SendError::Closed)
        ));
    }

    #[tokio::test]
    async fn ping_queues_a_ping_frame() {
        let (outbound, mut rx) = Outbound::channel(1);
        outbound.ping(b"corvid".to_vec()).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Message::Ping(p)) if p == b"corvid"));
    }
}
