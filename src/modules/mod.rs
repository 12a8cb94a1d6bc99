//! Module abstraction — the contract satisfied by built-in and external
//! action providers.
//!
//! A [`Module`] owns a set of named actions, each described by an
//! [`ActionSpec`] carrying input and output JSON schemas.  [`execute`] is the
//! single entry point used by the request processor: it validates params
//! against the action's input schema, runs the action, and stamps the
//! outcome with a completion time and measured duration.

mod echo;
mod external;
mod inventory;
mod ping;
mod registry;

pub use echo::Echo;
pub use external::ExternalModule;
pub use inventory::Inventory;
pub use ping::Ping;
pub use registry::ModuleRegistry;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonschema::Validator;
use serde_json::Value;

use crate::error::RequestError;

/// Describes one action: its input and output JSON schemas.
pub struct ActionSpec {
    pub input: Value,
    pub output: Value,
    input_validator: Validator,
}

impl ActionSpec {
    pub fn new(input: Value, output: Value) -> Result<Self, String> {
        let input_validator =
            jsonschema::validator_for(&input).map_err(|e| format!("invalid input schema: {e}"))?;
        Ok(Self {
            input,
            output,
            input_validator,
        })
    }

    pub fn validate_input(&self, params: &Value) -> Result<(), RequestError> {
        let issues = self
            .input_validator
            .iter_errors(params)
            .map(|e| e.to_string())
            .collect::<Vec<_>>();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(RequestError::InvalidParams(issues.join("; ")))
        }
    }
}

impl std::fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSpec")
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

/// What an action produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// In-process action: a single structured value.
    Internal { results: Value },
    /// Subprocess action: raw streams plus parsed results.
    External {
        results: Value,
        stdout: String,
        stderr: String,
    },
}

impl Outcome {
    pub fn results(&self) -> &Value {
        match self {
            Outcome::Internal { results } => results,
            Outcome::External { results, .. } => results,
        }
    }
}

/// An [`Outcome`] stamped with completion time and duration.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub outcome: Outcome,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
}

impl ActionOutcome {
    pub fn results(&self) -> &Value {
        self.outcome.results()
    }
}

/// An action provider registered with the agent.
///
/// Implementations must be `Send + Sync`; the registry shares them as
/// `Arc<dyn Module>` with worker tasks.
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique module name used for request routing.
    fn name(&self) -> &str;

    /// The actions this module publishes.  Immutable after registration.
    fn actions(&self) -> &BTreeMap<String, ActionSpec>;

    /// Run one action.  `params` has already been validated against the
    /// action's input schema.
    async fn run_action(&self, action: &str, params: &Value) -> Result<Outcome, RequestError>;
}

/// Validate and run an action, timing the invocation.
pub async fn execute(
    module: &dyn Module,
    action: &str,
    params: &Value,
) -> Result<ActionOutcome, RequestError> {
    let spec = module
        .actions()
        .get(action)
        .ok_or_else(|| RequestError::UnknownAction(action.to_string()))?;
    spec.validate_input(params)?;

    let started = Instant::now();
    let outcome = module.run_action(action, params).await?;

    Ok(ActionOutcome {
        outcome,
        completed_at: Utc::now(),
        duration: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn execute_rejects_unknown_action() {
        let module = Echo::new();
        let err = execute(&module, "shout", &json!({})).await.unwrap_err();
        match err {
            RequestError::UnknownAction(name) => assert_eq!(name, "shout"),
            other => panic!("expected UnknownAction, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn execute_validates_params() {
        let module = Echo::new();
        let err = execute(&module, "echo", &json!({"message": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn execute_measures_duration() {
        let module = Ping::new();
        let outcome = execute(&module, "ping", &json!({})).await.unwrap();
        assert!(outcome.completed_at <= Utc::now());
        assert!(matches!(outcome.outcome, Outcome::Internal { .. }));
    }
}
