//! CandleIngestor (C3): one minute-tick supervisor fanning out a closed
//! one-minute candle fetch per configured symbol, all sharing the one
//! `BrokerClient` session the way the teacher's Sentinel shares one market
//! data subscription across symbols.

use crate::domain::errors::BrokerError;
use crate::domain::ports::BrokerClient;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::Store;
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct CandleIngestor {
    broker: Arc<dyn BrokerClient>,
    store: Store,
    symbol_tables: HashMap<String, String>,
    retry_attempts: u32,
    retry_delay: Duration,
    metrics: Metrics,
}

fn floor_to_minute(ts: i64) -> i64 {
    ts - ts.rem_euclid(60)
}

impl CandleIngestor {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        store: Store,
        symbol_tables: HashMap<String, String>,
        retry_attempts: u32,
        retry_delay_seconds: u64,
        metrics: Metrics,
    ) -> Self {
        Self {
            broker,
            store,
            symbol_tables,
            retry_attempts,
            retry_delay: Duration::from_secs(retry_delay_seconds),
            metrics,
        }
    }

    /// Runs forever: on every minute boundary, fetches and upserts the
    /// closed candle for every symbol concurrently. A failing symbol never
    /// blocks the others (§4.3).
    pub async fn run(&self) {
        loop {
            sleep_until_next_minute_boundary().await;
            let aligned = floor_to_minute(Utc::now().timestamp());

            let fetches = self
                .symbol_tables
                .keys()
                .map(|symbol| self.fetch_and_store(symbol, aligned));
            let results = join_all(fetches).await;

            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                warn!(failed, total = results.len(), "candle ingestion tick had failures");
            }
        }
    }

    async fn fetch_and_store(&self, symbol: &str, aligned: i64) -> Result<(), BrokerError> {
        let start = aligned - 60;
        let mut attempt = 0;
        loop {
            match self.broker.ticks_history(symbol, start, aligned, 1).await {
                Ok(candles) => {
                    let Some(candle) = candles.into_iter().next() else {
                        return Ok(());
                    };
                    if let Err(e) = self.store.candles.upsert(&candle).await {
                        error!(symbol, error = %e, "failed to persist ingested candle");
                    } else {
                        self.metrics.inc_candles_ingested(symbol);
                    }
                    return Ok(());
                }
                Err(e) if e.is_auth() => {
                    error!(symbol, error = %e, "candle ingestion halted: auth failure");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.retry_attempts {
                        warn!(symbol, attempts = attempt, error = %e, "candle fetch retries exhausted for this tick");
                        return Err(e);
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

async fn sleep_until_next_minute_boundary() {
    let now = Utc::now().timestamp();
    let next = floor_to_minute(now) + 60;
    let wait = (next - now).max(0) as u64;
    tokio::time::sleep(Duration::from_secs(wait)).await;
    info!("candle ingestor tick");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_to_minute_rounds_down() {
        assert_eq!(floor_to_minute(125), 120);
        assert_eq!(floor_to_minute(120), 120);
        assert_eq!(floor_to_minute(0), 0);
    }
}
