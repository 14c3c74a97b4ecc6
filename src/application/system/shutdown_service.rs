//! Graceful shutdown (§5): propagates top-down from the signal handler
//! through every supervised task, each given a bounded drain window before
//! being forced to stop.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Drain window a supervised task gets to notice cancellation and exit on
/// its own before `ShutdownService` aborts it (§5 "bounded drain window
/// (default 5s)").
const DEFAULT_DRAIN: Duration = Duration::from_secs(5);

/// Owns every long-running task's `JoinHandle` and aborts what doesn't
/// exit within the drain window. Supervised tasks (wrapped in
/// `scheduler::supervise`) loop forever by design, so "exiting on its own"
/// in practice means the task noticing a cancellation signal; this engine
/// has no such signal today; the drain window still bounds shutdown
/// latency by aborting stragglers rather than waiting indefinitely.
pub struct ShutdownService {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    drain: Duration,
}

impl ShutdownService {
    pub fn new(tasks: Vec<(&'static str, JoinHandle<()>)>) -> Self {
        Self {
            tasks,
            drain: DEFAULT_DRAIN,
        }
    }

    #[cfg(test)]
    fn with_drain(tasks: Vec<(&'static str, JoinHandle<()>)>, drain: Duration) -> Self {
        Self { tasks, drain }
    }

    /// Waits up to the drain window for every task to finish, aborting
    /// whatever is left once it elapses. Tasks run concurrently so one
    /// slow drain does not eat into another task's budget.
    pub async fn shutdown(self) {
        info!(drain = ?self.drain, tasks = self.tasks.len(), "shutdown: draining tasks");

        let drain = self.drain;
        let drains = self.tasks.into_iter().map(|(name, mut handle)| async move {
            tokio::select! {
                res = &mut handle => match res {
                    Ok(()) => info!(name, "shutdown: task exited cleanly"),
                    Err(e) => warn!(name, error = %e, "shutdown: task panicked during drain"),
                },
                _ = tokio::time::sleep(drain) => {
                    handle.abort();
                    warn!(name, "shutdown: drain window elapsed, aborting task");
                }
            }
        });
        futures_util::future::join_all(drains).await;

        info!("shutdown: complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_returns_once_every_task_completes() {
        let handle = tokio::spawn(async {});
        let service = ShutdownService::with_drain(vec![("noop", handle)], Duration::from_secs(1));
        service.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_does_not_hang_past_drain_window_on_a_stuck_task() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(600)).await;
        });
        let service =
            ShutdownService::with_drain(vec![("stuck", handle)], Duration::from_millis(50));

        let start = tokio::time::Instant::now();
        service.shutdown().await;
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
