//! Runs every configured [`Runner`] as one structured task group.
//!
//! All runners share a single [`CancellationToken`]. The first runner
//! failure (or panic) cancels the token and becomes the overall result. A
//! shutdown signal cancels the token too; the supervisor then waits for
//! every runner and succeeds unless one of them fails while stopping.
//! Runners are never restarted.

use std::future::Future;
use std::sync::Arc;

use dem_core::{Runner, RunnerError, RunnerState};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct Supervisor {
    runners: Vec<Arc<dyn Runner>>,
    cancel: CancellationToken,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            runners: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn add(&mut self, runner: Arc<dyn Runner>) {
        self.runners.push(runner);
    }

    /// The token handed to every runner.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start all runners and wait until each has finished.
    ///
    /// `shutdown` resolving is treated as a termination request.
    pub async fn run<F>(self, shutdown: F) -> Result<(), RunnerError>
    where
        F: Future<Output = ()>,
    {
        let Self { runners, cancel } = self;

        let names: Vec<String> = runners.iter().map(|r| r.name().to_string()).collect();
        let mut states = vec![RunnerState::Created; runners.len()];
        let mut tasks = JoinSet::new();

        for (idx, runner) in runners.into_iter().enumerate() {
            let token = cancel.clone();
            let name = names[idx].clone();
            tasks.spawn(async move {
                // A nested task isolates panics so they surface as a runner error.
                let result = match tokio::spawn(async move { runner.run(token).await }).await {
                    Ok(result) => result,
                    Err(e) => Err(RunnerError::new(name, format!("runner panicked: {e}"))),
                };
                (idx, result)
            });
            states[idx] = RunnerState::Running;
            tracing::info!(runner = %names[idx], "Runner started");
        }

        let mut shutdown = std::pin::pin!(shutdown);
        let mut signalled = false;
        let mut first_error: Option<RunnerError> = None;

        while !tasks.is_empty() {
            tokio::select! {
                () = &mut shutdown, if !signalled => {
                    signalled = true;
                    tracing::info!("Shutdown requested, cancelling runners");
                    cancel.cancel();
                }
                Some(joined) = tasks.join_next() => {
                    let (idx, result) = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(error = %e, "Runner task aborted");
                            if first_error.is_none() {
                                first_error = Some(RunnerError::new("supervisor", e));
                            }
                            cancel.cancel();
                            continue;
                        }
                    };

                    match result {
                        Ok(()) => {
                            states[idx] = RunnerState::Stopped;
                            if cancel.is_cancelled() {
                                tracing::info!(runner = %names[idx], "Runner stopped");
                            } else {
                                tracing::warn!(runner = %names[idx], "Runner stopped before shutdown, siblings keep running");
                            }
                        }
                        Err(e) => {
                            states[idx] = RunnerState::Failed;
                            tracing::error!(runner = %names[idx], error = %e, "Runner failed");
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                            cancel.cancel();
                        }
                    }
                }
                else => break,
            }
        }

        for (name, state) in names.iter().zip(&states) {
            tracing::debug!(runner = %name, state = ?state, "Final runner state");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
