//! Public configuration structs consumed by the rest of the agent.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Agent display name, used in logs and the startup summary.
    pub agent_name: String,
    /// The agent's own bus URI, used as `sender` on every outgoing envelope.
    pub agent_uri: String,
    /// Root directory for per-job result directories.
    pub spool_dir: PathBuf,
    /// Directory scanned for external module executables.
    pub modules_dir: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker WebSocket URI (`wss://…`, or `ws://…` for plaintext dev runs).
    pub uri: String,
    /// Broker endpoint URI placed in the login envelope's `endpoints` list.
    pub endpoint_uri: String,
    pub ca_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}
