//! Compiled JSON-schema validators for the bus protocol.
//!
//! The schema sources live under `schemas/` at the crate root and are
//! compiled once into lazy statics; compilation failure is a programming
//! error caught at first use.

use jsonschema::{self, Validator};
use once_cell::sync::Lazy;
use serde_json::Value;

/// Top-level envelope shape shared by every message on the bus.
pub static NETWORK_MESSAGE: Lazy<Validator> = Lazy::new(|| {
    let raw = include_str!("../../schemas/network_message.json");
    let schema: Value = serde_json::from_str(raw).expect("network_message.json must parse");
    jsonschema::validator_for(&schema).expect("network_message schema must be valid")
});

/// `data` shape of an inbound request.
pub static REQUEST_DATA: Lazy<Validator> = Lazy::new(|| {
    let raw = include_str!("../../schemas/request_data.json");
    let schema: Value = serde_json::from_str(raw).expect("request_data.json must parse");
    jsonschema::validator_for(&schema).expect("request_data schema must be valid")
});

/// `data` shape of the login message.
pub static LOGIN_DATA: Lazy<Validator> = Lazy::new(|| {
    let raw = include_str!("../../schemas/login_data.json");
    let schema: Value = serde_json::from_str(raw).expect("login_data.json must parse");
    jsonschema::validator_for(&schema).expect("login_data schema must be valid")
});

/// Run `value` through `validator`, collecting every violation as a string.
pub fn validate(validator: &Validator, value: &Value) -> Result<(), Vec<String>> {
    let issues = validator
        .iter_errors(value)
        .map(|e| e.to_string())
        .collect::<Vec<_>>();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_envelope() -> Value {
        json!({
            "id": 7,
            "version": "1",
            "expires": "2026-08-02T00:00:00Z",
            "sender": "corvid://controller/site",
            "endpoints": ["corvid://localhost/agent"],
            "hops": [],
            "data_schema": "urn:corvid:rpc:request",
            "data": {
                "transaction_id": "t1",
                "module": "echo",
                "action": "echo",
                "params": {"message": "hi"}
            }
        })
    }

    #[test]
    fn accepts_valid_envelope() {
        assert!(validate(&NETWORK_MESSAGE, &valid_envelope()).is_ok());
    }

    #[test]
    fn rejects_missing_sender() {
        let mut env = valid_envelope();
        env.as_object_mut().unwrap().remove("sender");
        let issues = validate(&NETWORK_MESSAGE, &env).unwrap_err();
        assert!(issues.iter().any(|i| i.contains("sender")));
    }

    #[test]
    fn rejects_non_object_data() {
        let mut env = valid_envelope();
        env["data"] = json!("not an object");
        assert!(validate(&NETWORK_MESSAGE, &env).is_err());
    }

    #[test]
    fn request_data_requires_module_and_action() {
        let data = json!({"transaction_id": "t1", "module": "echo"});
        let issues = validate(&REQUEST_DATA, &data).unwrap_err();
        assert!(issues.iter().any(|i| i.contains("action")));
    }

    #[test]
    fn request_data_accepts_notify_flag() {
        let data = json!({
            "transaction_id": "t2",
            "module": "ping",
            "action": "ping",
            "notify_outcome": true
        });
        assert!(validate(&REQUEST_DATA, &data).is_ok());
    }

    #[test]
    fn login_data_requires_known_type() {
        assert!(validate(&LOGIN_DATA, &json!({"type": "agent"})).is_ok());
        assert!(validate(&LOGIN_DATA, &json!({"type": "toaster"})).is_err());
        assert!(validate(&LOGIN_DATA, &json!({})).is_err());
    }
}
