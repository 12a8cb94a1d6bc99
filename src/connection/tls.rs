//! TLS connector construction for the mutually-authenticated broker session.

use native_tls::{Certificate, Identity, TlsConnector};
use tokio_tungstenite::Connector;

use crate::config::BrokerConfig;
use crate::error::AgentError;

/// Build the TLS connector for `wss://` broker URIs.
///
/// Returns `None` for plaintext `ws://` URIs (dev and test runs).  Any
/// missing or unreadable certificate material is fatal.
pub fn build_connector(broker: &BrokerConfig) -> Result<Option<Connector>, AgentError> {
    if !broker.uri.starts_with("wss://") {
        return Ok(None);
    }

    let ca_path = broker
        .ca_cert
        .as_ref()
        .ok_or_else(|| AgentError::Tls("broker.ca_cert is required for wss://".into()))?;
    let cert_path = broker
        .client_cert
        .as_ref()
        .ok_or_else(|| AgentError::Tls("broker.client_cert is required for wss://".into()))?;
    let key_path = broker
        .client_key
        .as_ref()
        .ok_or_else(|| AgentError::Tls("broker.client_key is required for wss://".into()))?;

    let ca_pem = std::fs::read(ca_path).map_err(|e| {
        AgentError::Tls(format!("cannot read ca cert '{}': {e}", ca_path.display()))
    })?;
    let cert_pem = std::fs::read(cert_path).map_err(|e| {
        AgentError::Tls(format!(
            "cannot read client cert '{}': {e}",
            cert_path.display()
        ))
    })?;
    let key_pem = std::fs::read(key_path).map_err(|e| {
        AgentError::Tls(format!(
            "cannot read client key '{}': {e}",
            key_path.display()
        ))
    })?;

    let ca = Certificate::from_pem(&ca_pem)
        .map_err(|e| AgentError::Tls(format!("invalid ca cert: {e}")))?;
    let identity = Identity::from_pkcs8(&cert_pem, &key_pem)
        .map_err(|e| AgentError::Tls(format!("invalid client identity: {e}")))?;

    let connector = TlsConnector::builder()
        .add_root_certificate(ca)
        .identity(identity)
        .build()
        .map_err(|e| AgentError::Tls(format!("failed to build tls connector: {e}")))?;

    Ok(Some(Connector::NativeTls(connector)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;

    fn broker(uri: &str) -> BrokerConfig {
        BrokerConfig {
            uri: uri.to_string(),
            endpoint_uri: "corvid://broker".to_string(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }

    #[test]
    fn plaintext_uri_needs_no_connector() {
        let result = build_connector(&broker("ws://127.0.0.1:8142/corvid")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn wss_without_certs_is_fatal() {
        let err = match build_connector(&broker("wss://broker:8142/corvid")) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, AgentError::Tls(_)));
        assert!(err.to_string().contains("ca_cert"));
    }

    #[test]
    fn wss_with_missing_files_is_fatal() {
        let mut cfg = broker("wss://broker:8142/corvid");
        cfg.ca_cert = Some("/nonexistent/ca.pem".into());
        cfg.client_cert = Some("/nonexistent/agent.pem".into());
        cfg.client_key = Some("/nonexistent/agent.key".into());
        let err = match build_connector(&cfg) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(err.to_string().contains("cannot read ca cert"));
    }
}
