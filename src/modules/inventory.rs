//! Built-in `inventory` module — reports what this agent is and runs on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::RequestError;

use super::{ActionSpec, Module, Outcome};

pub struct Inventory {
    actions: BTreeMap<String, ActionSpec>,
}

impl Inventory {
    pub fn new() -> Self {
        let input = json!({"type": "object"});
        let output = json!({
            "type": "object",
            "properties": {
                "agent": {"type": "string"},
                "version": {"type": "string"},
                "os": {"type": "string"},
                "arch": {"type": "string"}
            },
            "required": ["agent", "version", "os", "arch"]
        });
        let mut actions = BTreeMap::new();
        actions.insert(
            "inventory".to_string(),
            ActionSpec::new(input, output).expect("inventory schemas are static and valid"),
        );
        Self { actions }
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for Inventory {
    fn name(&self) -> &str {
        "inventory"
    }

    fn actions(&self) -> &BTreeMap<String, ActionSpec> {
        &self.actions
    }

    async fn run_action(&self, _action: &str, _params: &Value) -> Result<Outcome, RequestError> {
        Ok(Outcome::Internal {
            results: json!({
                "agent": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::execute;

    #[tokio::test]
    async fn inventory_reports_platform() {
        let module = Inventory::new();
        let outcome = execute(&module, "inventory", &json!({})).await.unwrap();
        let results = outcome.results();
        assert_eq!(results["os"], json!(std::env::consts::OS));
        assert_eq!(results["agent"], json!("corvid-agent"));
    }
}
