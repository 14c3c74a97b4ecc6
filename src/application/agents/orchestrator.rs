//! OrchestratorLoop (C11): the top-level iteration that turns persisted
//! minute candles into signals and hands them to TradeDispatcher. Each
//! symbol is independent — one symbol's failure never aborts the others
//! (§4.11).

use super::dispatcher::TradeDispatcher;
use crate::application::aggregator::aggregate;
use crate::application::strategies::{StrategyConstants, malaysian, moving_average};
use crate::config::{Config, StrategyKind};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::trading::types::Signal;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::Store;
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

/// 200 four-hour candles of history, rounded up, is the deepest lookback
/// any strategy needs (MovingAverage's `MIN_HISTORY`); 40 days covers it
/// with headroom for gaps.
const LOOKBACK_HOURS: i64 = 24 * 40;

#[derive(Clone)]
pub struct OrchestratorLoop {
    store: Store,
    dispatcher: TradeDispatcher,
    config: Config,
    metrics: Metrics,
}

impl OrchestratorLoop {
    pub fn new(store: Store, dispatcher: TradeDispatcher, config: Config, metrics: Metrics) -> Self {
        Self {
            store,
            dispatcher,
            config,
            metrics,
        }
    }

    pub async fn run(&self) {
        loop {
            self.run_once().await;
            tokio::time::sleep(Duration::from_secs(self.config.sleep_interval_seconds)).await;
        }
    }

    async fn run_once(&self) {
        let constants = StrategyConstants::from(&self.config);
        let until = Utc::now().timestamp();
        let since = until - LOOKBACK_HOURS * 3600;

        for symbol in self.config.symbols_to_tables.keys() {
            let minutes = match self.store.candles.read_range(symbol, since, until).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(symbol, error = %e, "orchestrator failed to read candles");
                    continue;
                }
            };
            if minutes.is_empty() {
                continue;
            }

            let h = aggregate(&minutes, Timeframe::FourHour);
            let m15 = aggregate(&minutes, Timeframe::FifteenMin);
            let m30 = aggregate(&minutes, Timeframe::ThirtyMin);

            let mut signals: Vec<Signal> = Vec::new();
            for strategy in &self.config.strategies {
                match strategy {
                    StrategyKind::Malaysian => {
                        signals.extend(malaysian::evaluate(&h, &m15, symbol, constants));
                    }
                    StrategyKind::MovingAverage => {
                        signals.extend(moving_average::evaluate(&h, &m30, symbol, constants));
                    }
                }
            }

            if signals.is_empty() {
                continue;
            }

            info!(symbol, count = signals.len(), "orchestrator generated signals");
            for signal in &signals {
                self.metrics.inc_signal(&signal.strategy, &signal.kind.to_string());
                if let Err(e) = self.store.signals.insert(signal).await {
                    warn!(symbol, error = %e, "failed to persist signal");
                }
            }
            self.dispatcher.process(&signals).await;
        }
    }
}
