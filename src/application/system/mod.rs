//! `Application::build`/`start` wires the Store, BrokerClient, and
//! `Config` into the six long-running agents and hands back a
//! `SystemHandle` the headless binary waits on, mirroring the teacher's
//! bootstrap-then-start composition.

pub mod shutdown_service;

use crate::application::agents::candle_ingestor::CandleIngestor;
use crate::application::agents::dispatcher::TradeDispatcher;
use crate::application::agents::eligibility;
use crate::application::agents::monitor::TradeMonitor;
use crate::application::agents::orchestrator::OrchestratorLoop;
use crate::application::agents::scheduler::{Scheduler, supervise};
use crate::application::system::shutdown_service::ShutdownService;
use crate::config::Config;
use crate::domain::ports::{BrokerClient, BrokerClientFactory};
use crate::infrastructure::broker::{WsBrokerClient, WsBrokerClientFactory};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::Store;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Everything a caller needs to observe or tear down a running engine.
pub struct SystemHandle {
    pub store: Store,
    pub metrics: Metrics,
    shutdown: ShutdownService,
}

impl SystemHandle {
    /// Propagates shutdown top-down through every supervised task,
    /// bounded by the configured drain window (§5).
    pub async fn shutdown(self) {
        self.shutdown.shutdown().await;
    }
}

pub struct Application {
    pub config: Config,
    pub store: Store,
    pub broker: Arc<dyn BrokerClient>,
    pub broker_factory: Arc<dyn BrokerClientFactory>,
    pub metrics: Metrics,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!("building meridian trading engine");

        let metrics = Metrics::new()?;
        let store = Store::connect(&config.database_url, &config.symbols_to_tables).await?;
        let broker = WsBrokerClient::connect(&config.broker_ws_url, metrics.clone());
        let broker_factory: Arc<dyn BrokerClientFactory> = Arc::new(WsBrokerClientFactory {
            ws_url: config.broker_ws_url.clone(),
            metrics: metrics.clone(),
        });

        info!(
            symbols = config.symbols_to_tables.len(),
            strategies = config.strategies.len(),
            "configuration loaded"
        );

        Ok(Self {
            config,
            store,
            broker,
            broker_factory,
            metrics,
        })
    }

    /// Spawns every agent, each wrapped in `scheduler::supervise` so a
    /// panic restarts the task after a 5-second cooldown rather than
    /// taking the process down (§4.10, §7).
    pub async fn start(self) -> Result<SystemHandle> {
        let (new_contract_tx, new_contract_rx) = mpsc::channel::<String>(256);

        let dispatcher = TradeDispatcher::new(
            self.broker.clone(),
            self.store.clone(),
            self.config.clone(),
            new_contract_tx,
            self.metrics.clone(),
        );
        let orchestrator = OrchestratorLoop::new(
            self.store.clone(),
            dispatcher,
            self.config.clone(),
            self.metrics.clone(),
        );
        let ingestor = CandleIngestor::new(
            self.broker.clone(),
            self.store.clone(),
            self.config.symbols_to_tables.clone(),
            self.config.candle_retry_attempts,
            self.config.candle_retry_delay_seconds,
            self.metrics.clone(),
        );
        let monitor = TradeMonitor::new(
            self.store.clone(),
            self.broker_factory.clone(),
            self.config.watcher_poll_seconds,
            self.config.watcher_reconcile_seconds,
            self.metrics.clone(),
        );
        let scheduler = Scheduler::new(
            self.store.clone(),
            self.broker.clone(),
            self.config.timezone_offset(),
        );

        let mut tasks: Vec<(&'static str, tokio::task::JoinHandle<()>)> = Vec::new();

        {
            let ingestor = ingestor.clone();
            tasks.push((
                "candle_ingestor",
                tokio::spawn(supervise("candle_ingestor", move || {
                    let ingestor = ingestor.clone();
                    async move { ingestor.run().await }
                })),
            ));
        }

        {
            let orchestrator = orchestrator.clone();
            tasks.push((
                "orchestrator",
                tokio::spawn(supervise("orchestrator", move || {
                    let orchestrator = orchestrator.clone();
                    async move { orchestrator.run().await }
                })),
            ));
        }

        {
            let store = self.store.clone();
            let interval = self.config.monitor_interval_seconds;
            tasks.push((
                "auto_trading_monitor",
                tokio::spawn(supervise("auto_trading_monitor", move || {
                    let store = store.clone();
                    async move { eligibility::run_auto_trading_monitor(store, interval).await }
                })),
            ));
        }

        {
            let scheduler = scheduler.clone();
            tasks.push((
                "daily_reset",
                tokio::spawn(supervise("daily_reset", move || {
                    let scheduler = scheduler.clone();
                    async move { scheduler.run_daily_reset().await }
                })),
            ));
        }

        {
            let scheduler = scheduler.clone();
            let interval = self.config.balance_interval_seconds;
            tasks.push((
                "balance_snapshot",
                tokio::spawn(supervise("balance_snapshot", move || {
                    let scheduler = scheduler.clone();
                    async move { scheduler.run_balance_snapshot(interval).await }
                })),
            ));
        }

        // TradeMonitor owns the receiving end of the new-contract channel
        // for the process lifetime; its internal per-contract watchers
        // are already isolated tokio tasks (§4.9), so the dispatch loop
        // itself does not need restart-on-panic supervision.
        tasks.push((
            "trade_monitor",
            tokio::spawn(async move { monitor.run(new_contract_rx).await }),
        ));

        Ok(SystemHandle {
            store: self.store,
            metrics: self.metrics,
            shutdown: ShutdownService::new(tasks),
        })
    }
}
