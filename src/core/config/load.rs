//! Configuration loading with env-var overrides.
//!
//! Reads a TOML file (default `config/default.toml` relative to the working
//! directory), then applies `CORVID_SPOOL_DIR` and `CORVID_LOG_LEVEL`
//! overrides.  When no file exists and no path was given, a minimal hardcoded
//! default is returned so the agent can start in a bare environment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AgentError;

use super::raw::RawConfig;
use super::types::{BrokerConfig, Config};

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AgentError> {
    let spool_override = env::var("CORVID_SPOOL_DIR").ok();
    let log_override = env::var("CORVID_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            spool_override.as_deref(),
            log_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(
            default_path,
            spool_override.as_deref(),
            log_override.as_deref(),
        )
    } else {
        let raw = RawConfig::default();
        Ok(resolve(
            raw,
            spool_override.as_deref(),
            log_override.as_deref(),
        ))
    }
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    spool_override: Option<&str>,
    log_override: Option<&str>,
) -> Result<Config, AgentError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AgentError::Config(format!("cannot read {}: {e}", path.display())))?;

    let raw: RawConfig = toml::from_str(&text)
        .map_err(|e| AgentError::Config(format!("config error in {}: {e}", path.display())))?;

    Ok(resolve(raw, spool_override, log_override))
}

fn resolve(raw: RawConfig, spool_override: Option<&str>, log_override: Option<&str>) -> Config {
    let spool_dir = expand_home(spool_override.unwrap_or(&raw.agent.spool_dir));
    let log_level = log_override.unwrap_or(&raw.agent.log_level).to_string();

    Config {
        agent_name: raw.agent.name,
        agent_uri: raw.agent.uri,
        spool_dir,
        modules_dir: expand_home(&raw.agent.modules_dir),
        log_level,
        log_file: raw.agent.log_file.as_deref().map(expand_home),
        broker: BrokerConfig {
            uri: raw.broker.uri,
            endpoint_uri: raw.broker.endpoint_uri,
            ca_cert: raw.broker.ca_cert.as_deref().map(expand_home),
            client_cert: raw.broker.client_cert.as_deref().map(expand_home),
            client_key: raw.broker.client_key.as_deref().map(expand_home),
        },
    }
}

/// Resolve a leading `~` against the user's home directory; every other
/// path (and `~` when no home is known) passes through untouched.
pub fn expand_home(path: &str) -> PathBuf {
    match (dirs::home_dir(), path) {
        (Some(home), "~") => home,
        (Some(home), p) => match p.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(p),
        },
        (None, p) => PathBuf::from(p),
    }
}
