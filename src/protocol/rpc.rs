//! Outgoing RPC message construction.
//!
//! Each builder returns a [`WireFrame`] — an [`Envelope`] plus the debug
//! chunks to re-attach.  Envelope ids are minted from a process-wide counter;
//! id 1 is reserved for the login message.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::envelope::{Envelope, PROTOCOL_VERSION};

pub const LOGIN_SCHEMA_URI: &str = "urn:corvid:rpc:login";
pub const REQUEST_SCHEMA_URI: &str = "urn:corvid:rpc:request";
pub const BLOCKING_RESPONSE_URI: &str = "urn:corvid:rpc:blocking-response";
pub const PROVISIONAL_RESPONSE_URI: &str = "urn:corvid:rpc:provisional-response";
pub const NON_BLOCKING_RESPONSE_URI: &str = "urn:corvid:rpc:non-blocking-response";
pub const RPC_ERROR_URI: &str = "urn:corvid:rpc:error";

/// How far in the future outgoing envelopes expire.
const EXPIRY_MINUTES: i64 = 10;

// Id 1 is the login envelope.
static NEXT_ENVELOPE_ID: AtomicU64 = AtomicU64::new(2);

fn next_id() -> u64 {
    NEXT_ENVELOPE_ID.fetch_add(1, Ordering::Relaxed)
}

fn expiry() -> String {
    (Utc::now() + Duration::minutes(EXPIRY_MINUTES)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// An outgoing message: envelope plus debug side-car.
#[derive(Debug, Clone)]
pub struct WireFrame {
    pub envelope: Envelope,
    pub debug: Vec<Value>,
}

impl WireFrame {
    /// The full JSON value as it will appear on the wire, with the debug
    /// array appended when non-empty.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(&self.envelope)?;
        if !self.debug.is_empty() {
            value["debug"] = Value::Array(self.debug.clone());
        }
        Ok(value)
    }
}

fn outgoing(
    sender: &str,
    recipient: &str,
    data_schema: &str,
    data: Value,
    debug: Vec<Value>,
) -> WireFrame {
    WireFrame {
        envelope: Envelope {
            id: next_id(),
            version: PROTOCOL_VERSION.to_string(),
            expires: expiry(),
            sender: sender.to_string(),
            endpoints: vec![recipient.to_string()],
            hops: Vec::new(),
            data_schema: data_schema.to_string(),
            data,
        },
        debug,
    }
}

/// Login envelope sent once per session open; always id 1.
pub fn login(agent_uri: &str, broker_endpoint: &str) -> WireFrame {
    WireFrame {
        envelope: Envelope {
            id: 1,
            version: PROTOCOL_VERSION.to_string(),
            expires: expiry(),
            sender: agent_uri.to_string(),
            endpoints: vec![broker_endpoint.to_string()],
            hops: Vec::new(),
            data_schema: LOGIN_SCHEMA_URI.to_string(),
            data: json!({"type": "agent"}),
        },
        debug: Vec::new(),
    }
}

pub fn blocking_response(
    agent_uri: &str,
    requester: &str,
    transaction_id: &str,
    results: Value,
    debug: Vec<Value>,
) -> WireFrame {
    outgoing(
        agent_uri,
        requester,
        BLOCKING_RESPONSE_URI,
        json!({
            "transaction_id": transaction_id,
            "results": results,
        }),
        debug,
    )
}

pub fn provisional_response(
    agent_uri: &str,
    requester: &str,
    transaction_id: &str,
    job_id: &str,
    error: Option<&str>,
    debug: Vec<Value>,
) -> WireFrame {
    let mut data = json!({
        "transaction_id": transaction_id,
        "job_id": job_id,
        "success": error.is_none(),
    });
    if let Some(err) = error {
        data["error"] = Value::String(err.to_string());
    }
    outgoing(agent_uri, requester, PROVISIONAL_RESPONSE_URI, data, debug)
}

pub fn non_blocking_response(
    agent_uri: &str,
    requester: &str,
    transaction_id: &str,
    job_id: &str,
    results: Value,
) -> WireFrame {
    outgoing(
        agent_uri,
        requester,
        NON_BLOCKING_RESPONSE_URI,
        json!({
            "transaction_id": transaction_id,
            "job_id": job_id,
            "results": results,
        }),
        // Debug was already attached to the provisional response.
        Vec::new(),
    )
}

pub fn rpc_error(
    agent_uri: &str,
    requester: &str,
    transaction_id: &str,
    request_id: u64,
    description: &str,
    debug: Vec<Value>,
) -> WireFrame {
    outgoing(
        agent_uri,
        requester,
        RPC_ERROR_URI,
        json!({
            "transaction_id": transaction_id,
            "id": request_id,
            "description": description,
        }),
        debug,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::schemas;

    const AGENT: &str = "corvid://localhost/agent";
    const REQUESTER: &str = "corvid://controller/site";

    #[test]
    fn login_is_id_one_and_valid() {
        let frame = login(AGENT, "corvid://broker");
        assert_eq!(frame.envelope.id, 1);
        assert_eq!(frame.envelope.data_schema, LOGIN_SCHEMA_URI);
        let value = frame.to_value().unwrap();
        assert!(schemas::validate(&schemas::NETWORK_MESSAGE, &value).is_ok());
        assert!(schemas::validate(&schemas::LOGIN_DATA, &frame.envelope.data).is_ok());
    }

    #[test]
    fn every_builder_validates_against_network_message() {
        let frames = [
            blocking_response(AGENT, REQUESTER, "t1", json!({"message": "hi"}), vec![]),
            provisional_response(AGENT, REQUESTER, "t2", "job-1", None, vec![]),
            provisional_response(AGENT, REQUESTER, "t2", "job-1", Some("spawn failed"), vec![]),
            non_blocking_response(AGENT, REQUESTER, "t2", "job-1", json!({})),
            rpc_error(AGENT, REQUESTER, "t3", 9, "unknown module: 'xyz'", vec![]),
        ];
        for frame in &frames {
            let value = frame.to_value().unwrap();
            assert!(
                schemas::validate(&schemas::NETWORK_MESSAGE, &value).is_ok(),
                "frame with schema {} must validate",
                frame.envelope.data_schema
            );
        }
    }

    #[test]
    fn envelope_ids_are_distinct() {
        let a = blocking_response(AGENT, REQUESTER, "t", json!({}), vec![]);
        let b = blocking_response(AGENT, REQUESTER, "t", json!({}), vec![]);
        assert_ne!(a.envelope.id, b.envelope.id);
        assert!(a.envelope.id > 1);
    }

    #[test]
    fn provisional_success_has_no_error_field() {
        let ok = provisional_response(AGENT, REQUESTER, "t", "j", None, vec![]);
        assert_eq!(ok.envelope.data["success"], json!(true));
        assert!(ok.envelope.data.get("error").is_none());

        let failed = provisional_response(AGENT, REQUESTER, "t", "j", Some("boom"), vec![]);
        assert_eq!(failed.envelope.data["success"], json!(false));
        assert_eq!(failed.envelope.data["error"], json!("boom"));
    }

    #[test]
    fn debug_chunks_appear_on_wire_only_when_present() {
        let bare = blocking_response(AGENT, REQUESTER, "t", json!({}), vec![]);
        assert!(bare.to_value().unwrap().get("debug").is_none());

        let chunk = json!({"hop": "broker-1"});
        let with_debug = blocking_response(AGENT, REQUESTER, "t", json!({}), vec![chunk.clone()]);
        let value = with_debug.to_value().unwrap();
        assert_eq!(value["debug"], json!([chunk]));
    }

    #[test]
    fn responses_address_the_requester() {
        let frame = rpc_error(AGENT, REQUESTER, "t", 4, "nope", vec![]);
        assert_eq!(frame.envelope.endpoints, vec![REQUESTER.to_string()]);
        assert_eq!(frame.envelope.sender, AGENT);
    }
}
