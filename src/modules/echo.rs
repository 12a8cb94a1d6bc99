//! Built-in `echo` module — returns its input message unchanged.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::RequestError;

use super::{ActionSpec, Module, Outcome};

pub struct Echo {
    actions: BTreeMap<String, ActionSpec>,
}

impl Echo {
    pub fn new() -> Self {
        let input = json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"}
            },
            "required": ["message"]
        });
        let output = json!({
            "type": "object",
            "properties": {
                "message": {"type": "string"}
            },
            "required": ["message"]
        });
        let mut actions = BTreeMap::new();
        actions.insert(
            "echo".to_string(),
            ActionSpec::new(input, output).expect("echo schemas are static and valid"),
        );
        Self { actions }
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn actions(&self) -> &BTreeMap<String, ActionSpec> {
        &self.actions
    }

    async fn run_action(&self, _action: &str, params: &Value) -> Result<Outcome, RequestError> {
        let message = params
            .get("message")
            .and_then(|m| m.as_str())
            .ok_or_else(|| RequestError::InvalidParams("message must be a string".into()))?;
        Ok(Outcome::Internal {
            results: json!({"message": message}),
        })
    }
}
