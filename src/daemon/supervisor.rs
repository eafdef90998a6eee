use anyhow::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Restart `run_component` with exponential backoff until it has failed
/// more than `max_restarts` times in a row (0 means unlimited).
pub(super) fn spawn_component_supervisor<F, Fut>(
    name: &'static str,
    initial_backoff_secs: u64,
    max_backoff_secs: u64,
    max_restarts: u32,
    mut run_component: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut backoff = initial_backoff_secs.max(1);
        let max_backoff = max_backoff_secs.max(backoff);
        let mut consecutive_failures: u32 = 0;

        loop {
            tracing::info!(component = name, "daemon.component_start");
            match run_component().await {
                Ok(()) => {
                    tracing::info!(component = name, "daemon.component_stopped");
                    break;
                }
                Err(e) => {
                    tracing::error!(component = name, error = %format!("{e:#}"), "daemon.component_failed");
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
            }

            if max_restarts > 0 && consecutive_failures > max_restarts {
                tracing::error!(
                    component = name,
                    max_restarts,
                    "daemon.component_circuit_open"
                );
                break;
            }
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    })
}
