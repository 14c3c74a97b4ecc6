//! TradeMonitor (C9): one watcher task per open contract, polling
//! settlement status and writing the `active → complete` transition
//! exactly once. New contracts arrive either via Dispatcher's channel
//! signal or the periodic reconciliation sweep, so a missed notification
//! never orphans a position (§4.9).

use crate::domain::ports::{BrokerClient, BrokerClientFactory};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::Store;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct TradeMonitor {
    store: Store,
    broker_factory: Arc<dyn BrokerClientFactory>,
    poll_interval: Duration,
    reconcile_interval: Duration,
    tracked: Arc<Mutex<HashSet<String>>>,
    metrics: Metrics,
}

impl TradeMonitor {
    pub fn new(
        store: Store,
        broker_factory: Arc<dyn BrokerClientFactory>,
        poll_seconds: u64,
        reconcile_seconds: u64,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            broker_factory,
            poll_interval: Duration::from_secs(poll_seconds),
            reconcile_interval: Duration::from_secs(reconcile_seconds),
            tracked: Arc::new(Mutex::new(HashSet::new())),
            metrics,
        }
    }

    /// Loads every active trade at boot, then runs the reconciliation loop
    /// and the new-contract channel concurrently for the process lifetime.
    pub async fn run(&self, mut new_contract_rx: Receiver<String>) {
        self.spawn_watchers_for_active_trades().await;

        let mut reconcile_ticker = tokio::time::interval(self.reconcile_interval);
        loop {
            tokio::select! {
                maybe_contract = new_contract_rx.recv() => {
                    match maybe_contract {
                        Some(contract_id) => self.spawn_watcher_if_new(contract_id).await,
                        None => {
                            warn!("trade monitor new-contract channel closed");
                        }
                    }
                }
                _ = reconcile_ticker.tick() => {
                    self.spawn_watchers_for_active_trades().await;
                }
            }
        }
    }

    async fn spawn_watchers_for_active_trades(&self) {
        let active = match self.store.trades.find_active().await {
            Ok(trades) => trades,
            Err(e) => {
                warn!(error = %e, "trade monitor failed to load active trades");
                return;
            }
        };
        for trade in active {
            self.spawn_watcher_if_new(trade.contract_id).await;
        }
    }

    async fn spawn_watcher_if_new(&self, contract_id: String) {
        let mut tracked = self.tracked.lock().await;
        if !tracked.insert(contract_id.clone()) {
            return;
        }
        let count = tracked.len();
        drop(tracked);
        self.metrics.set_active_watchers(count);

        let store = self.store.clone();
        let broker_factory = self.broker_factory.clone();
        let poll_interval = self.poll_interval;
        let tracked = self.tracked.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            watch_contract(store, broker_factory, &contract_id, poll_interval, &metrics).await;
            let mut tracked = tracked.lock().await;
            tracked.remove(&contract_id);
            metrics.set_active_watchers(tracked.len());
        });
    }
}

async fn watch_contract(
    store: Store,
    broker_factory: Arc<dyn BrokerClientFactory>,
    contract_id: &str,
    poll_interval: Duration,
    metrics: &Metrics,
) {
    let Ok(Some(trade)) = store.trades.find_by_contract_id(contract_id).await else {
        warn!(contract_id, "watcher started for unknown trade row");
        return;
    };

    let broker = match authorize_session(broker_factory.as_ref(), &trade.token).await {
        Some(b) => b,
        None => {
            error!(contract_id, "watcher could not authorize broker session, giving up");
            return;
        }
    };

    loop {
        match broker.open_contract(contract_id).await {
            Ok(state) if state.is_sold => {
                let sell_price = state.sell_price.unwrap_or(state.buy_price);
                let sell_time = state.sell_time.unwrap_or_else(|| chrono::Utc::now().timestamp());
                let profit_loss = state
                    .profit
                    .unwrap_or((sell_price - state.buy_price) * Decimal::from(trade.multiplier));
                if let Err(e) = store
                    .trades
                    .settle(contract_id, sell_price, sell_time, state.buy_price, profit_loss)
                    .await
                {
                    error!(contract_id, error = %e, "failed to persist settlement");
                } else {
                    let outcome = if profit_loss.is_sign_negative() { "loss" } else { "win" };
                    metrics.inc_trade_settled(outcome);
                }
                info!(contract_id, sell_price = %sell_price, "contract settled");
                return;
            }
            Ok(_) => {
                tokio::time::sleep(poll_interval).await;
            }
            Err(e) if e.is_auth() => {
                error!(contract_id, error = %e, "watcher auth error, abandoning contract");
                return;
            }
            Err(e) => {
                warn!(contract_id, error = %e, "watcher transient error, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn authorize_session(
    factory: &dyn BrokerClientFactory,
    token: &str,
) -> Option<Arc<dyn BrokerClient>> {
    match factory.connect().await {
        Ok(broker) => match broker.authorize(token).await {
            Ok(()) => Some(broker),
            Err(e) => {
                error!(error = %e, "watcher failed to authorize broker session");
                None
            }
        },
        Err(e) => {
            error!(error = %e, "watcher failed to open broker session");
            None
        }
    }
}
