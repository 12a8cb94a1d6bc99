//! Request processor — parses, validates, and dispatches inbound frames.
//!
//! Blocking requests run inline on the dispatch task; non-blocking requests
//! become jobs: a spool directory, a worker on the executor, a provisional
//! response, and later exactly one final message.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connection::Outbound;
use crate::error::DispatchError;
use crate::modules::{self, ModuleRegistry};
use crate::protocol::envelope::{self, ParsedEnvelope, RequestData};
use crate::protocol::{rpc, schemas, WireFrame};

use super::executor::JobExecutor;
use super::spool::SpoolStore;
use super::task::{self, JobContext};

pub struct RequestProcessor {
    registry: Arc<ModuleRegistry>,
    spool: Arc<SpoolStore>,
    executor: JobExecutor,
    outbound: Outbound,
    agent_uri: String,
}

impl RequestProcessor {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        spool: Arc<SpoolStore>,
        executor: JobExecutor,
        outbound: Outbound,
        agent_uri: String,
    ) -> Self {
        Self {
            registry,
            spool,
            executor,
            outbound,
            agent_uri,
        }
    }

    /// Handle one inbound text frame.  Frames that fail parsing or schema
    /// validation are dropped with a log line; everything else produces at
    /// least one outbound message or a job.
    pub async fn handle_text(&self, text: &str) {
        let parsed = match envelope::parse_frame(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "dropping malformed inbound message");
                return;
            }
        };

        if parsed.envelope.data_schema != rpc::REQUEST_SCHEMA_URI {
            warn!(
                data_schema = %parsed.envelope.data_schema,
                "dropping message with unexpected data schema"
            );
            return;
        }

        if let Err(issues) = schemas::validate(&schemas::REQUEST_DATA, &parsed.envelope.data) {
            warn!(?issues, "dropping request with invalid data");
            return;
        }

        let data: RequestData = match serde_json::from_value(parsed.envelope.data.clone()) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "dropping undeserialisable request data");
                return;
            }
        };

        let debug_chunks = self.wrap_debug(&parsed);

        let module = match self.registry.get(&data.module) {
            Some(module) => module,
            None => {
                error!(module = %data.module, "invalid request: unknown module");
                self.send_rpc_error(
                    &parsed,
                    &data,
                    &format!("unknown module: '{}'", data.module),
                    debug_chunks,
                )
                .await;
                return;
            }
        };

        if !module.actions().contains_key(&data.action) {
            error!(
                module = %data.module,
                action = %data.action,
                "invalid request: unknown action"
            );
            self.send_rpc_error(
                &parsed,
                &data,
                &format!("unknown action '{}' of module '{}'", data.action, data.module),
                debug_chunks,
            )
            .await;
            return;
        }

        if data.is_non_blocking() {
            self.process_non_blocking(module, &parsed, &data, debug_chunks)
                .await;
        } else {
            self.process_blocking(module, &parsed, &data, debug_chunks)
                .await;
        }
    }

    /// Run the action inline and reply with a blocking response.
    async fn process_blocking(
        &self,
        module: Arc<dyn modules::Module>,
        parsed: &ParsedEnvelope,
        data: &RequestData,
        debug_chunks: Vec<Value>,
    ) {
        match modules::execute(module.as_ref(), &data.action, &data.params).await {
            Ok(outcome) => {
                let frame = rpc::blocking_response(
                    &self.agent_uri,
                    &parsed.envelope.sender,
                    &data.transaction_id,
                    outcome.results().clone(),
                    debug_chunks,
                );
                self.send_or_log(&frame, parsed, data).await;
            }
            Err(e) => {
                error!(
                    module = %data.module,
                    action = %data.action,
                    error = %e,
                    "blocking action failed"
                );
                self.send_rpc_error(
                    parsed,
                    data,
                    &format!(
                        "Failed to execute '{} {}': {e}",
                        data.module, data.action
                    ),
                    debug_chunks,
                )
                .await;
            }
        }
    }

    /// Mint a job, start a worker, and acknowledge with a provisional
    /// response.
    async fn process_non_blocking(
        &self,
        module: Arc<dyn modules::Module>,
        parsed: &ParsedEnvelope,
        data: &RequestData,
        debug_chunks: Vec<Value>,
    ) {
        let job_id = Uuid::new_v4().to_string();

        let dispatch = self.start_worker(module, parsed, data, &job_id).await;

        let (release_tx, error) = match dispatch {
            Ok(release_tx) => (Some(release_tx), None),
            Err(e) => {
                error!(
                    module = %data.module,
                    action = %data.action,
                    job_id = %job_id,
                    error = %e,
                    "failed to dispatch non-blocking request"
                );
                (None, Some(e.to_string()))
            }
        };

        let frame = rpc::provisional_response(
            &self.agent_uri,
            &parsed.envelope.sender,
            &data.transaction_id,
            &job_id,
            error.as_deref(),
            debug_chunks,
        );
        match self.outbound.send_frame(&frame).await {
            Ok(()) => info!(
                request_id = parsed.envelope.id,
                requester = %parsed.envelope.sender,
                transaction_id = %data.transaction_id,
                job_id = %job_id,
                "sent provisional response"
            ),
            Err(e) => error!(
                request_id = parsed.envelope.id,
                requester = %parsed.envelope.sender,
                transaction_id = %data.transaction_id,
                error = %e,
                "failed to send provisional response (no further attempts)"
            ),
        }

        // Only release the worker once the provisional is queued, so the
        // final message cannot overtake it.
        if let Some(release_tx) = release_tx {
            let _ = release_tx.send(());
        }
    }

    /// Create the spool directory and submit the worker body.
    async fn start_worker(
        &self,
        module: Arc<dyn modules::Module>,
        parsed: &ParsedEnvelope,
        data: &RequestData,
        job_id: &str,
    ) -> Result<oneshot::Sender<()>, DispatchError> {
        let job_dir = self.spool.create_job_dir(job_id)?;

        debug!(
            module = %data.module,
            action = %data.action,
            job_id = %job_id,
            transaction_id = %data.transaction_id,
            "starting job for non-blocking request"
        );

        let params_text = if data.params.as_object().map(|o| o.is_empty()).unwrap_or(false) {
            String::new()
        } else {
            data.params.to_string()
        };

        let ctx = JobContext {
            job_id: job_id.to_string(),
            transaction_id: data.transaction_id.clone(),
            request_id: parsed.envelope.id,
            requester: parsed.envelope.sender.clone(),
            agent_uri: self.agent_uri.clone(),
            module,
            action: data.action.clone(),
            params: data.params.clone(),
            params_text,
            notify: data.notify(),
            job_dir,
        };

        let (release_tx, release_rx) = oneshot::channel();
        let label = format!("{} {}", data.module, data.action);
        let outbound = self.outbound.clone();

        self.executor
            .spawn(label, task::run(ctx, outbound, release_rx))
            .await?;

        Ok(release_tx)
    }

    /// Pull the valid debug chunks off a parsed envelope, warning when the
    /// broker attached broken ones.
    fn wrap_debug(&self, parsed: &ParsedEnvelope) -> Vec<Value> {
        if parsed.num_invalid_debug > 0 {
            warn!(
                request_id = parsed.envelope.id,
                invalid = parsed.num_invalid_debug,
                "message contained invalid debug chunks"
            );
        }
        parsed.debug.clone()
    }

    async fn send_rpc_error(
        &self,
        parsed: &ParsedEnvelope,
        data: &RequestData,
        description: &str,
        debug_chunks: Vec<Value>,
    ) {
        let frame = rpc::rpc_error(
            &self.agent_uri,
            &parsed.envelope.sender,
            &data.transaction_id,
            parsed.envelope.id,
            description,
            debug_chunks,
        );
        self.send_or_log(&frame, parsed, data).await;
    }

    async fn send_or_log(&self, frame: &WireFrame, parsed: &ParsedEnvelope, data: &RequestData) {
        if let Err(e) = self.outbound.send_frame(frame).await {
            // The requester is expected to retry the request.
            error!(
                request_id = parsed.envelope.id,
                requester = %parsed.envelope.sender,
                transaction_id = %data.transaction_id,
                error = %e,
                "failed to send reply"
            );
        }
    }
}
