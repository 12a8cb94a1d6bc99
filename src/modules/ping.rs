//! Built-in `ping` module — liveness check returning the agent's clock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::error::RequestError;

use super::{ActionSpec, Module, Outcome};

pub struct Ping {
    actions: BTreeMap<String, ActionSpec>,
}

impl Ping {
    pub fn new() -> Self {
        let input = json!({"type": "object"});
        let output = json!({
            "type": "object",
            "properties": {
                "pong": {"type": "string"}
            },
            "required": ["pong"]
        });
        let mut actions = BTreeMap::new();
        actions.insert(
            "ping".to_string(),
            ActionSpec::new(input, output).expect("ping schemas are static and valid"),
        );
        Self { actions }
    }
}

impl Default for Ping {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for Ping {
    fn name(&self) -> &str {
        "ping"
    }

    fn actions(&self) -> &BTreeMap<String, ActionSpec> {
        &self.actions
    }

    async fn run_action(&self, _action: &str, _params: &Value) -> Result<Outcome, RequestError> {
        Ok(Outcome::Internal {
            results: json!({
                "pong": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
        })
    }
}
