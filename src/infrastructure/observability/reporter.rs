//! Push-based metrics reporter for meridian.
//!
//! Periodically outputs an engine snapshot as structured JSON to stdout.
//! No HTTP server, no incoming connections — only outbound data, exactly
//! as the teacher's headless reporter works (§1 Non-goals).

use crate::infrastructure::observability::metrics::Metrics;
use crate::infrastructure::persistence::Store;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Serialize)]
pub struct EngineSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub active_trades: usize,
    pub trading_users: usize,
}

/// Push-based reporter: outputs an `EngineSnapshot` as a structured JSON
/// log line on a configurable interval.
pub struct MetricsReporter {
    store: Store,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(store: Store, metrics: Metrics, interval_seconds: u64) -> Self {
        Self {
            store,
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub async fn run(self) {
        info!(interval = ?self.interval, "metrics reporter starting");

        loop {
            tokio::time::sleep(self.interval).await;

            match self.collect_snapshot().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        println!("METRICS_JSON:{}", json);
                        info!(
                            active_trades = snapshot.active_trades,
                            trading_users = snapshot.trading_users,
                            uptime_seconds = snapshot.uptime_seconds,
                            "engine snapshot"
                        );
                    }
                    Err(e) => warn!(error = %e, "failed to serialize metrics snapshot"),
                },
                Err(e) => warn!(error = %e, "failed to collect metrics snapshot"),
            }
        }
    }

    async fn collect_snapshot(&self) -> anyhow::Result<EngineSnapshot> {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        let active_trades = self.store.trades.find_active().await?.len();
        let trading_users = self.store.users.all_trading().await?.len();
        self.metrics.set_active_watchers(active_trades);

        Ok(EngineSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_trades,
            trading_users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn snapshot_reflects_empty_store() {
        let store = Store::connect("sqlite::memory:", &HashMap::new())
            .await
            .expect("in-memory store");
        let metrics = Metrics::new().expect("metrics");
        let reporter = MetricsReporter::new(store, metrics, 60);

        let snapshot = reporter.collect_snapshot().await.expect("snapshot");
        assert_eq!(snapshot.active_trades, 0);
        assert_eq!(snapshot.trading_users, 0);
        assert!(!snapshot.timestamp.is_empty());
    }
}
