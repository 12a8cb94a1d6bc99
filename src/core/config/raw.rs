//! Raw TOML deserialization types.  These mirror the file shape and carry the
//! serde defaults; kept private to the config module.

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub agent: RawAgent,
    #[serde(default)]
    pub broker: RawBroker,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawAgent {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_agent_uri")]
    pub uri: String,
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawAgent {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            uri: default_agent_uri(),
            spool_dir: default_spool_dir(),
            modules_dir: default_modules_dir(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawBroker {
    #[serde(default = "default_broker_uri")]
    pub uri: String,
    #[serde(default = "default_broker_endpoint")]
    pub endpoint_uri: String,
    #[serde(default)]
    pub ca_cert: Option<String>,
    #[serde(default)]
    pub client_cert: Option<String>,
    #[serde(default)]
    pub client_key: Option<String>,
}

impl Default for RawBroker {
    fn default() -> Self {
        Self {
            uri: default_broker_uri(),
            endpoint_uri: default_broker_endpoint(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }
}

pub(super) fn default_agent_name() -> String {
    "corvid".to_string()
}

pub(super) fn default_agent_uri() -> String {
    "corvid://localhost/agent".to_string()
}

pub(super) fn default_spool_dir() -> String {
    "~/.corvid/spool".to_string()
}

pub(super) fn default_modules_dir() -> String {
    "modules".to_string()
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_broker_uri() -> String {
    "wss://localhost:8142/corvid".to_string()
}

pub(super) fn default_broker_endpoint() -> String {
    "corvid://broker".to_string()
}
