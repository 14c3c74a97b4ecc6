//! Scheduler (C10): the top-level supervisor. Owns the three timed jobs
//! (daily reset, balance snapshot, eligibility monitor) and the generic
//! `supervise` wrapper every other long-running task in the system is
//! started under, so a panicking task restarts after a cooldown instead of
//! taking the process down (§4.10, §7).

use crate::domain::ports::BrokerClient;
use crate::domain::trading::types::BalanceSnapshot;
use crate::infrastructure::persistence::Store;
use chrono::{FixedOffset, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Runs `make_task` forever, restarting 5 seconds after any exit —
/// graceful or panicking — per §4.10's supervisor contract. Every
/// long-running agent (ingestor, orchestrator, monitor) is started this
/// way from `bin/server.rs`.
pub async fn supervise<F, Fut>(name: &'static str, mut make_task: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let handle = tokio::spawn(make_task());
        match handle.await {
            Ok(()) => warn!(name, "supervised task exited, restarting after cooldown"),
            Err(e) => error!(name, error = %e, "supervised task panicked, restarting after cooldown"),
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

#[derive(Clone)]
pub struct Scheduler {
    store: Store,
    broker: Arc<dyn BrokerClient>,
    timezone: FixedOffset,
}

impl Scheduler {
    pub fn new(store: Store, broker: Arc<dyn BrokerClient>, timezone: FixedOffset) -> Self {
        Self {
            store,
            broker,
            timezone,
        }
    }

    /// Daily reset at local 00:00 (§4.10 bullet 1).
    pub async fn run_daily_reset(&self) {
        loop {
            tokio::time::sleep(duration_until_next_local_midnight(self.timezone)).await;
            self.daily_reset_once().await;
        }
    }

    async fn daily_reset_once(&self) {
        let today = Utc::now().with_timezone(&self.timezone).date_naive();

        match self.store.windows.stopping_on(today).await {
            Ok(windows) => {
                for w in windows {
                    if let Err(e) = self.store.users.set_trading_flags(&w.email, false, false).await {
                        warn!(email = %w.email, error = %e, "daily reset: failed to stop user");
                    }
                }
            }
            Err(e) => warn!(error = %e, "daily reset: failed to list stopping windows"),
        }

        match self.store.windows.starting_on(today).await {
            Ok(windows) => {
                for w in windows {
                    if let Err(e) = self.store.users.set_trading_flags(&w.email, true, true).await {
                        warn!(email = %w.email, error = %e, "daily reset: failed to start user");
                    }
                }
            }
            Err(e) => warn!(error = %e, "daily reset: failed to list starting windows"),
        }

        match self.store.users.all_trading().await {
            Ok(users) => {
                for user in users {
                    if let Err(e) = self
                        .store
                        .users
                        .set_trading_flags(&user.email, true, true)
                        .await
                    {
                        warn!(email = %user.email, error = %e, "daily reset: failed to clear soft-disable");
                    }
                }
            }
            Err(e) => warn!(error = %e, "daily reset: failed to list trading users"),
        }

        info!("daily reset complete");
    }

    /// Balance snapshot every `interval_seconds` (§4.10 bullet 2).
    pub async fn run_balance_snapshot(&self, interval_seconds: u64) {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        loop {
            ticker.tick().await;
            self.balance_snapshot_once().await;
        }
    }

    async fn balance_snapshot_once(&self) {
        let users = match self.store.users.all_trading().await {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "balance snapshot: failed to list trading users");
                return;
            }
        };
        let today = Utc::now().with_timezone(&self.timezone).date_naive();

        for user in users {
            if self.broker.authorize(&user.token).await.is_err() {
                warn!(email = %user.email, "balance snapshot: authorize failed");
                continue;
            }
            let balance = match self.broker.balance().await {
                Ok(b) => b,
                Err(e) => {
                    warn!(email = %user.email, error = %e, "balance snapshot: balance lookup failed");
                    continue;
                }
            };

            if let Err(e) = self.store.users.set_balance_today(&user.email, balance).await {
                warn!(email = %user.email, error = %e, "balance snapshot: failed to set balance_today");
            }

            let window = self.store.windows.find_by_email(&user.email).await.ok().flatten();
            if window.is_some_and(|w| w.start_date == today)
                && let Err(e) = self.store.users.set_balance(&user.email, balance).await
            {
                warn!(email = %user.email, error = %e, "balance snapshot: failed to reset lifecycle balance");
            }

            let snapshot = BalanceSnapshot {
                email: user.email.clone(),
                timestamp: Utc::now().timestamp(),
                balance,
            };
            if let Err(e) = self.store.balances.insert_snapshot(&snapshot).await {
                warn!(email = %user.email, error = %e, "balance snapshot: failed to persist snapshot");
            }
        }

        info!("balance snapshot complete");
    }
}

fn duration_until_next_local_midnight(tz: FixedOffset) -> Duration {
    let now_local = Utc::now().with_timezone(&tz);
    let next_midnight = (now_local.date_naive() + chrono::Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight");
    let next_midnight_utc = next_midnight
        .and_local_timezone(tz)
        .single()
        .expect("unambiguous local midnight")
        .with_timezone(&Utc);
    let wait = (next_midnight_utc - Utc::now()).num_seconds().max(1);
    Duration::from_secs(wait as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_midnight_is_in_the_future_and_bounded() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let wait = duration_until_next_local_midnight(tz);
        assert!(wait.as_secs() >= 1);
        assert!(wait.as_secs() <= 86_400);
    }
}
