//! External module adapter — actions backed by an executable on disk.
//!
//! # Subprocess contract
//!
//! - `<exe> describe` prints a JSON manifest on stdout:
//!   `{"actions": [{"name": "...", "input": {...}, "output": {...}}, ...]}`.
//! - A normal invocation (no args) reads a JSON object on stdin, writes a
//!   JSON object on stdout, and exits 0 on success.
//!
//! The module name is the executable's file stem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::RequestError;

use super::{ActionSpec, Module, Outcome};

#[derive(Debug, Deserialize)]
struct Manifest {
    actions: Vec<ManifestAction>,
}

#[derive(Debug, Deserialize)]
struct ManifestAction {
    name: String,
    #[serde(default = "default_schema")]
    input: Value,
    #[serde(default = "default_schema")]
    output: Value,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object"})
}

#[derive(Debug)]
pub struct ExternalModule {
    name: String,
    path: PathBuf,
    actions: BTreeMap<String, ActionSpec>,
}

impl ExternalModule {
    /// Interrogate the executable at `path` and build the adapter.
    ///
    /// Runs `<path> describe` once; a subprocess failure, a non-JSON
    /// manifest, or an invalid action schema fails the load.
    pub async fn load(path: &Path) -> Result<Self, String> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| format!("module path has no usable file name: {}", path.display()))?
            .to_string();

        let output = Command::new(path)
            .arg("describe")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| format!("failed to run '{} describe': {e}", path.display()))?;

        if !output.status.success() {
            return Err(format!(
                "'{} describe' exited with {}: {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let manifest: Manifest = serde_json::from_slice(&output.stdout)
            .map_err(|e| format!("'{} describe' printed invalid manifest: {e}", path.display()))?;

        let mut actions = BTreeMap::new();
        for action in manifest.actions {
            let spec = ActionSpec::new(action.input, action.output)
                .map_err(|e| format!("action '{}' of module '{name}': {e}", action.name))?;
            actions.insert(action.name, spec);
        }

        debug!(
            module = %name,
            path = %path.display(),
            actions = actions.len(),
            "loaded external module"
        );

        Ok(Self {
            name,
            path: path.to_path_buf(),
            actions,
        })
    }
}

#[async_trait]
impl Module for ExternalModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &BTreeMap<String, ActionSpec> {
        &self.actions
    }

    async fn run_action(&self, action: &str, params: &Value) -> Result<Outcome, RequestError> {
        let input = serde_json::to_vec(params)
            .map_err(|e| RequestError::Failed(format!("failed to serialise params: {e}")))?;

        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RequestError::Failed(format!("failed to spawn '{}': {e}", self.path.display()))
            })?;

        // Feed params and close stdin so the subprocess sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.map_err(|e| {
                RequestError::Failed(format!("failed to write action input: {e}"))
            })?;
        }

        let output = child.wait_with_output().await.map_err(|e| {
            RequestError::Failed(format!("failed to wait for '{}': {e}", self.path.display()))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(RequestError::Execution {
                description: format!(
                    "'{} {action}' exited with {}: {}",
                    self.name,
                    output.status,
                    stderr.trim()
                ),
                stdout,
                stderr,
            });
        }

        match serde_json::from_str::<Value>(&stdout) {
            Ok(results) => Ok(Outcome::External {
                results,
                stdout,
                stderr,
            }),
            Err(e) => Err(RequestError::Execution {
                description: format!(
                    "'{} {action}' produced non-JSON output ({e}): {}",
                    self.name,
                    stderr.trim()
                ),
                stdout,
                stderr,
            }),
        }
    }
}
