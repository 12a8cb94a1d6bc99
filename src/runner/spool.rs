//! On-disk spool — per-job result directories.
//!
//! Layout: `<root>/<job_id>/{status,stdout,stderr}`.  Every write replaces
//! the whole file; durability is "eventually visible after return" (no
//! fsync).  Status writes after dispatch are best-effort: failures are
//! logged, never propagated.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{AgentError, DispatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

/// The single-line JSON object written to a job's `status` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub module: String,
    pub action: String,
    pub status: JobState,
    pub duration: String,
    pub input: String,
}

impl JobStatus {
    pub fn running(module: &str, action: &str, input: &str) -> Self {
        Self {
            module: module.to_string(),
            action: action.to_string(),
            status: JobState::Running,
            duration: "0 s".to_string(),
            input: if input.is_empty() {
                "none".to_string()
            } else {
                input.to_string()
            },
        }
    }

    pub fn finish(&mut self, state: JobState, duration_secs: f64) {
        self.status = state;
        self.duration = format!("{duration_secs:.3} s");
    }

    /// Serialised single-line form with trailing newline.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }
}

pub struct SpoolStore {
    root: PathBuf,
}

impl SpoolStore {
    /// Open the spool, creating the root directory if absent.  A root that
    /// cannot be created is fatal.
    pub fn open(root: &Path) -> Result<Self, AgentError> {
        if !root.exists() {
            fs::create_dir_all(root).map_err(|e| {
                AgentError::Spool(format!(
                    "failed to create spool root '{}': {e}",
                    root.display()
                ))
            })?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Create the per-job directory; failure is a dispatch error reported in
    /// the provisional response.
    pub fn create_job_dir(&self, job_id: &str) -> Result<PathBuf, DispatchError> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir).map_err(|source| DispatchError::JobDir {
            dir: dir.display().to_string(),
            source,
        })?;
        Ok(dir)
    }

    /// Truncate-and-write one spool file.
    pub fn write(dir: &Path, filename: &str, text: &str) -> std::io::Result<()> {
        fs::write(dir.join(filename), text)
    }

    /// Best-effort status write; logs on failure.
    pub fn write_status(dir: &Path, status: &JobStatus) {
        if let Err(e) = Self::write(dir, "status", &status.to_line()) {
            error!(
                dir = %dir.display(),
                error = %e,
                "failed to write job status file"
            );
        }
    }
}
