//! The action-task body run by each worker.
//!
//! Failures never escape: every path ends with the final status on disk and,
//! when requested, exactly one outcome message attempted on the wire.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::connection::Outbound;
use crate::error::RequestError;
use crate::modules::{self, Module, Outcome};
use crate::protocol::rpc;

use super::spool::{JobState, JobStatus, SpoolStore};

/// Everything a worker needs to run one non-blocking action.
pub struct JobContext {
    pub job_id: String,
    pub transaction_id: String,
    pub request_id: u64,
    pub requester: String,
    pub agent_uri: String,
    pub module: Arc<dyn Module>,
    pub action: String,
    pub params: Value,
    pub params_text: String,
    pub notify: bool,
    pub job_dir: PathBuf,
}

/// Run one action to completion.
///
/// `release` is fired by the processor once the provisional response has
/// been queued; waiting on it keeps the provisional ahead of any final
/// message.  If the sender side is dropped the action still runs.
pub async fn run(ctx: JobContext, outbound: Outbound, release: oneshot::Receiver<()>) {
    let mut status = JobStatus::running(ctx.module.name(), &ctx.action, &ctx.params_text);
    SpoolStore::write_status(&ctx.job_dir, &status);
    for stream in ["stdout", "stderr"] {
        if let Err(e) = SpoolStore::write(&ctx.job_dir, stream, "") {
            error!(
                job_id = %ctx.job_id,
                file = stream,
                error = %e,
                "failed to initialise spool file"
            );
        }
    }

    let timer = Instant::now();
    let _ = release.await;

    let result = modules::execute(ctx.module.as_ref(), &ctx.action, &ctx.params).await;
    let elapsed = timer.elapsed().as_secs_f64();

    match result {
        Ok(outcome) => {
            if ctx.notify {
                let frame = rpc::non_blocking_response(
                    &ctx.agent_uri,
                    &ctx.requester,
                    &ctx.transaction_id,
                    &ctx.job_id,
                    outcome.results().clone(),
                );
                match outbound.send_frame(&frame).await {
                    Ok(()) => info!(
                        request_id = ctx.request_id,
                        requester = %ctx.requester,
                        transaction_id = %ctx.transaction_id,
                        "sent response for non-blocking request"
                    ),
                    Err(e) => error!(
                        request_id = ctx.request_id,
                        requester = %ctx.requester,
                        transaction_id = %ctx.transaction_id,
                        error = %e,
                        "failed to reply to non-blocking request (no further attempts)"
                    ),
                }
            }

            status.finish(JobState::Completed, elapsed);
            SpoolStore::write_status(&ctx.job_dir, &status);
            write_outcome_streams(&ctx, &outcome.outcome);
        }
        Err(e) => {
            if ctx.notify {
                let frame = rpc::rpc_error(
                    &ctx.agent_uri,
                    &ctx.requester,
                    &ctx.transaction_id,
                    ctx.request_id,
                    &e.to_string(),
                    Vec::new(),
                );
                match outbound.send_frame(&frame).await {
                    Ok(()) => info!(
                        request_id = ctx.request_id,
                        requester = %ctx.requester,
                        transaction_id = %ctx.transaction_id,
                        "replied to non-blocking request with an RPC error"
                    ),
                    Err(send_err) => error!(
                        request_id = ctx.request_id,
                        requester = %ctx.requester,
                        transaction_id = %ctx.transaction_id,
                        error = %send_err,
                        "failed to send RPC error for non-blocking request (no further attempts)"
                    ),
                }
            }

            status.finish(JobState::Failed, elapsed);
            SpoolStore::write_status(&ctx.job_dir, &status);
            write_failure_streams(&ctx, &e);
        }
    }
}

fn write_outcome_streams(ctx: &JobContext, outcome: &Outcome) {
    match outcome {
        Outcome::External {
            stdout, stderr, ..
        } => {
            spool_write(ctx, "stdout", &with_newline(stdout));
            if !stderr.is_empty() {
                spool_write(ctx, "stderr", &with_newline(stderr));
            }
        }
        Outcome::Internal { results } => {
            let text = serde_json::to_string(results).unwrap_or_else(|_| "{}".to_string());
            spool_write(ctx, "stdout", &with_newline(&text));
        }
    }
}

fn write_failure_streams(ctx: &JobContext, err: &RequestError) {
    if let RequestError::Execution { stdout, .. } = err {
        if !stdout.is_empty() {
            spool_write(ctx, "stdout", &with_newline(stdout));
        }
    }
    let msg = format!(
        "Failed to execute '{} {}': {err}",
        ctx.module.name(),
        ctx.action
    );
    spool_write(ctx, "stderr", &with_newline(&msg));
}

fn spool_write(ctx: &JobContext, filename: &str, text: &str) {
    if let Err(e) = SpoolStore::write(&ctx.job_dir, filename, text) {
        error!(
            job_id = %ctx.job_id,
            file = filename,
            error = %e,
            "failed to write spool file"
        );
    }
}

fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}
