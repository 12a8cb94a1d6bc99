//! Bus envelope parsing.
//!
//! A wire frame is the envelope JSON object; the broker may attach an
//! optional top-level `debug` array of diagnostic objects.  Parsing splits
//! the frame into the envelope headers, the primary `data` object, the valid
//! debug chunks, and a count of invalid (non-object) debug entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::schemas;

pub const PROTOCOL_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    pub version: String,
    pub expires: String,
    pub sender: String,
    pub endpoints: Vec<String>,
    pub hops: Vec<Value>,
    pub data_schema: String,
    pub data: Value,
}

/// A fully parsed inbound frame.
#[derive(Debug, Clone)]
pub struct ParsedEnvelope {
    pub envelope: Envelope,
    /// Valid debug chunks, kept verbatim for re-attachment to responses.
    pub debug: Vec<Value>,
    /// Debug entries that were not JSON objects; dropped, counted.
    pub num_invalid_debug: usize,
}

/// `data` of an inbound request, extracted after schema validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestData {
    pub transaction_id: String,
    pub module: String,
    pub action: String,
    #[serde(default = "empty_object")]
    pub params: Value,
    /// Present ⇒ non-blocking request; absent ⇒ blocking.
    #[serde(default)]
    pub notify_outcome: Option<bool>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl RequestData {
    pub fn is_non_blocking(&self) -> bool {
        self.notify_outcome.is_some()
    }

    pub fn notify(&self) -> bool {
        self.notify_outcome.unwrap_or(false)
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frame is not valid JSON: {0}")]
    Json(String),

    #[error("envelope schema validation failed: {0:?}")]
    Schema(Vec<String>),

    #[error("envelope deserialisation failed: {0}")]
    Envelope(String),
}

/// Parse and schema-validate a text frame.
pub fn parse_frame(text: &str) -> Result<ParsedEnvelope, ParseError> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;

    schemas::validate(&schemas::NETWORK_MESSAGE, &value).map_err(ParseError::Schema)?;

    // Split the debug side-car off before reading the envelope proper.
    let (debug, num_invalid_debug) = match value
        .as_object_mut()
        .and_then(|obj| obj.remove("debug"))
    {
        Some(Value::Array(entries)) => {
            let total = entries.len();
            let valid: Vec<Value> = entries.into_iter().filter(|e| e.is_object()).collect();
            let invalid = total - valid.len();
            (valid, invalid)
        }
        Some(_) => (Vec::new(), 1),
        None => (Vec::new(), 0),
    };

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| ParseError::Envelope(e.to_string()))?;

    Ok(ParsedEnvelope {
        envelope,
        debug,
        num_invalid_debug,
    })
}
