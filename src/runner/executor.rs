//! Job executor — a background service owning the worker task set.
//!
//! The processor submits fully-built worker futures through a command
//! channel; the service spawns each into a `JoinSet`, reaps workers as they
//! finish, and drains the set on shutdown.  A worker body must not return an
//! error — failures are reflected in the spool and on the wire before the
//! future resolves — so the only thing the reaper reports is a panic.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::DispatchError;

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

enum ExecutorCommand {
    Spawn {
        label: String,
        job: JobFuture,
        ack: oneshot::Sender<()>,
    },
}

/// Clonable handle for submitting jobs.
#[derive(Clone)]
pub struct JobExecutor {
    cmd_tx: mpsc::Sender<ExecutorCommand>,
}

impl JobExecutor {
    /// Start the executor service; returns the submission handle and the
    /// service's join handle (awaited by `main` after shutdown to drain
    /// outstanding workers).
    pub fn start(shutdown: CancellationToken) -> (Self, tokio::task::JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let handle = tokio::spawn(service_loop(cmd_rx, shutdown));
        (Self { cmd_tx }, handle)
    }

    /// Submit a worker body.  Fails if the service has shut down.
    pub async fn spawn<F>(&self, label: String, job: F) -> Result<(), DispatchError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(ExecutorCommand::Spawn {
                label,
                job: Box::pin(job),
                ack: ack_tx,
            })
            .await
            .map_err(|_| DispatchError::Spawn("executor is not running".into()))?;

        ack_rx
            .await
            .map_err(|_| DispatchError::Spawn("executor dropped the job".into()))
    }
}

async fn service_loop(mut cmd_rx: mpsc::Receiver<ExecutorCommand>, shutdown: CancellationToken) {
    let mut workers: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(live = workers.len(), "executor shutting down — joining workers");
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ExecutorCommand::Spawn { label, job, ack }) => {
                        debug!(%label, live = workers.len(), "spawning action worker");
                        workers.spawn(job);
                        let _ = ack.send(());
                    }
                    None => {
                        info!("executor command channel closed");
                        break;
                    }
                }
            }

            Some(res) = workers.join_next(), if !workers.is_empty() => {
                if let Err(e) = res {
                    // Worker bodies catch their own failures; only a panic
                    // lands here.
                    error!(error = %e, "action worker panicked");
                }
            }
        }
    }

    // Workers are not cancellable — wait for each to finish on its own.
    while let Some(res) = workers.join_next().await {
        if let Err(e) = res {
            error!(error = %e, "action worker panicked during drain");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn spawned_job_runs_to_completion() {
        let shutdown = CancellationToken::new();
        let (executor, handle) = JobExecutor::start(shutdown.clone());

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_job = ran.clone();
        executor
            .spawn("test-job".into(), async move {
                ran_in_job.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_workers() {
        let shutdown = CancellationToken::new();
        let (executor, handle) = JobExecutor::start(shutdown.clone());

        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = done.clone();
            executor
                .spawn("slow-job".into(), async move {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn spawn_after_shutdown_fails() {
        let shutdown = CancellationToken::new();
        let (executor, handle) = JobExecutor::start(shutdown.clone());
        shutdown.cancel();
        handle.await.unwrap();

        let result = executor.spawn("late-job".into(), async {}).await;
        assert!(matches!(result, Err(DispatchError::Spawn(_))));
    }

    #[tokio::test]
    async fn worker_panic_does_not_kill_the_service() {
        let shutdown = CancellationToken::new();
        let (executor, handle) = JobExecutor::start(shutdown.clone());

        executor
            .spawn("panicking-job".into(), async {
                panic!("worker exploded");
            })
            .await
            .unwrap();

        // The service must still accept work after a worker panic.
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_job = ran.clone();
        executor
            .spawn("after-panic".into(), async move {
                ran_in_job.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
