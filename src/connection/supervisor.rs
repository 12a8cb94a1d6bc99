//! Connection supervisor — owns the broker session and its lifecycle.
//!
//! State loop: `Disconnected → Connecting → Open → Disconnected`, repeating
//! until shutdown.  Each open session runs a writer task and a heartbeat
//! task; the supervisor itself pumps inbound frames into the request
//! processor.  A lost session is reopened after a short wait; repeated
//! consecutive connect failures are fatal.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AgentError;
use crate::modules::ModuleRegistry;
use crate::protocol::{rpc, schemas};
use crate::runner::{JobExecutor, RequestProcessor, SpoolStore};

use super::heartbeat::{self, PongTracker};
use super::outbound::{self, Outbound};
use super::tls;

pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);
pub const RECONNECT_WAIT: Duration = Duration::from_secs(2);
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Capacity of the per-session outbound queue.
const OUTBOUND_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

enum SessionEnd {
    Shutdown,
    Dropped,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct ConnectionSupervisor {
    config: Config,
    registry: Arc<ModuleRegistry>,
    spool: Arc<SpoolStore>,
    executor: JobExecutor,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: Config,
        registry: Arc<ModuleRegistry>,
        spool: Arc<SpoolStore>,
        executor: JobExecutor,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            registry,
            spool,
            executor,
            state_tx,
        }
    }

    /// Observe the connection state (used by the heartbeat and by tests).
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Run until `shutdown` is cancelled or a fatal error occurs.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), AgentError> {
        let connector = tls::build_connector(&self.config.broker)?;
        let mut failed_attempts: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);
            match self.connect(connector.clone()).await {
                Ok(ws) => {
                    failed_attempts = 0;
                    info!(broker = %self.config.broker.uri, "session open");
                    match self.drive_session(ws, &shutdown).await? {
                        SessionEnd::Shutdown => {
                            self.set_state(ConnectionState::Disconnected);
                            return Ok(());
                        }
                        SessionEnd::Dropped => {
                            self.set_state(ConnectionState::Disconnected);
                            warn!(
                                "agent is not connected; will try to reconnect in {} s",
                                RECONNECT_WAIT.as_secs()
                            );
                        }
                    }
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    failed_attempts += 1;
                    if failed_attempts >= MAX_RECONNECT_ATTEMPTS {
                        return Err(AgentError::Connection(format!(
                            "failed to connect after {failed_attempts} attempts: {e}"
                        )));
                    }
                    warn!(
                        error = %e,
                        attempt = failed_attempts,
                        "failed to connect; retrying in {} s",
                        RECONNECT_WAIT.as_secs()
                    );
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(RECONNECT_WAIT) => {}
            }
        }
    }

    async fn connect(
        &self,
        connector: Option<tokio_tungstenite::Connector>,
    ) -> Result<WsStream, AgentError> {
        let (ws, _response) =
            connect_async_tls_with_config(self.config.broker.uri.as_str(), None, false, connector)
                .await
                .map_err(|e| AgentError::Connection(format!("websocket connect failed: {e}")))?;
        Ok(ws)
    }

    /// Run one open session to its end.
    ///
    /// Returns `Err` only for session-fatal conditions (login schema or
    /// login send failure).
    async fn drive_session(
        &self,
        ws: WsStream,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, AgentError> {
        let (sink, mut stream) = ws.split();
        let (outbound, outbound_rx) = Outbound::channel(OUTBOUND_QUEUE);

        let session = shutdown.child_token();
        let writer = tokio::spawn(outbound::writer_task(outbound_rx, sink, session.clone()));

        self.set_state(ConnectionState::Open);
        if let Err(e) = self.send_login(&outbound).await {
            session.cancel();
            let _ = writer.await;
            return Err(e);
        }

        let pong = PongTracker::new();
        let hb = tokio::spawn(heartbeat::run(
            outbound.clone(),
            pong.clone(),
            self.state(),
            session.clone(),
            HEARTBEAT_PERIOD,
        ));

        let processor = RequestProcessor::new(
            self.registry.clone(),
            self.spool.clone(),
            self.executor.clone(),
            outbound.clone(),
            self.config.agent_uri.clone(),
        );

        let end = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("supervisor shutting down — closing session");
                    break SessionEnd::Shutdown;
                }

                _ = session.cancelled() => {
                    // The writer hit a socket error and tore the session down.
                    break SessionEnd::Dropped;
                }

                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            debug!(bytes = text.len(), "received message");
                            processor.handle_text(&text).await;
                        }
                        Some(Ok(Message::Pong(payload))) => pong.on_pong(&payload),
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queues the pong reply itself.
                            debug!("received ping");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "broker closed the connection");
                            break SessionEnd::Dropped;
                        }
                        Some(Ok(other)) => {
                            debug!(?other, "ignoring non-text frame");
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "connection error");
                            break SessionEnd::Dropped;
                        }
                        None => {
                            warn!("connection stream ended");
                            break SessionEnd::Dropped;
                        }
                    }
                }
            }
        };

        session.cancel();
        let _ = hb.await;
        let _ = writer.await;
        Ok(end)
    }

    /// Compose, validate, and send the login envelope.  Any failure here is
    /// fatal — the agent cannot participate on the bus without logging in.
    async fn send_login(&self, outbound: &Outbound) -> Result<(), AgentError> {
        let frame = rpc::login(&self.config.agent_uri, &self.config.broker.endpoint_uri);

        let value = frame
            .to_value()
            .map_err(|e| AgentError::Schema(format!("login serialisation failed: {e}")))?;
        if let Err(issues) = schemas::validate(&schemas::NETWORK_MESSAGE, &value) {
            for issue in &issues {
                warn!(%issue, "login message validation failed");
            }
            return Err(AgentError::Schema("invalid login message schema".into()));
        }

        outbound
            .send_frame(&frame)
            .await
            .map_err(|e| AgentError::Connection(format!("failed to send login message: {e}")))?;

        info!(sender = %self.config.agent_uri, "login message sent");
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        // send_replace updates the value even while nobody is subscribed.
        self.state_tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn supervisor(tmp: &TempDir) -> (ConnectionSupervisor, CancellationToken) {
        let config = Config::test_default(tmp.path());
        let spool = Arc::new(SpoolStore::open(&config.spool_dir).unwrap());
        let registry = Arc::new(ModuleRegistry::with_builtins());
        let shutdown = CancellationToken::new();
        let (executor, _handle) = JobExecutor::start(shutdown.clone());
        (
            ConnectionSupervisor::new(config, registry, spool, executor),
            shutdown,
        )
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let tmp = TempDir::new().unwrap();
        let (sup, _shutdown) = supervisor(&tmp);
        assert_eq!(*sup.state().borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_broker_exhausts_reconnect_attempts() {
        let tmp = TempDir::new().unwrap();
        let (sup, shutdown) = supervisor(&tmp);

        // Port 0 is never connectable; every attempt fails fast, the 2 s
        // waits auto-advance under paused time.
        let err = sup.run(shutdown).await.unwrap_err();
        match err {
            AgentError::Connection(msg) => {
                assert!(msg.contains("attempts"), "unexpected message: {msg}")
            }
            other => panic!("expected Connection error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_before_connect_returns_ok() {
        let tmp = TempDir::new().unwrap();
        let (sup, shutdown) = supervisor(&tmp);
        shutdown.cancel();
        sup.run(shutdown).await.unwrap();
    }
}
