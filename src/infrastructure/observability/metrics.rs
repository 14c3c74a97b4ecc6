//! Prometheus metrics definitions for meridian.
//!
//! All metrics use the `meridian_` prefix. Push-based: there is no HTTP
//! server exposing `/metrics` (§1 Non-goals exclude an outer surface);
//! `MetricsReporter` renders a JSON snapshot to stdout on an interval
//! instead, the same way the teacher's push-based reporter works.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the trading engine.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Closed one-minute candles persisted, by symbol.
    pub candles_ingested_total: CounterVec,
    /// Strategy signals emitted, by strategy and signal kind.
    pub signals_total: CounterVec,
    /// Orders placed through the broker, by symbol.
    pub trades_dispatched_total: CounterVec,
    /// Contracts settled, by outcome (win/loss).
    pub trades_settled_total: CounterVec,
    /// Eligibility checks that rejected a user, by reason (daily_cap/overall_cap).
    pub eligibility_rejections_total: CounterVec,
    /// Contract watcher tasks currently running.
    pub active_watchers: GenericGauge<AtomicF64>,
    /// Broker WebSocket reconnection attempts.
    pub broker_reconnects_total: CounterVec,
    /// Broker round-trip latency in seconds, by endpoint.
    pub broker_latency_seconds: HistogramVec,
    /// Process uptime in seconds.
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Creates a new `Metrics` instance with every gauge/counter registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let candles_ingested_total = CounterVec::new(
            Opts::new(
                "meridian_candles_ingested_total",
                "Closed one-minute candles persisted",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(candles_ingested_total.clone()))?;

        let signals_total = CounterVec::new(
            Opts::new("meridian_signals_total", "Strategy signals emitted"),
            &["strategy", "kind"],
        )?;
        registry.register(Box::new(signals_total.clone()))?;

        let trades_dispatched_total = CounterVec::new(
            Opts::new(
                "meridian_trades_dispatched_total",
                "Orders placed through the broker",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(trades_dispatched_total.clone()))?;

        let trades_settled_total = CounterVec::new(
            Opts::new("meridian_trades_settled_total", "Contracts settled by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(trades_settled_total.clone()))?;

        let eligibility_rejections_total = CounterVec::new(
            Opts::new(
                "meridian_eligibility_rejections_total",
                "Eligibility checks that disabled a user, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(eligibility_rejections_total.clone()))?;

        let active_watchers = Gauge::with_opts(Opts::new(
            "meridian_active_watchers",
            "Contract watcher tasks currently running",
        ))?;
        registry.register(Box::new(active_watchers.clone()))?;

        let broker_reconnects_total = CounterVec::new(
            Opts::new(
                "meridian_broker_reconnects_total",
                "Broker WebSocket reconnection attempts",
            ),
            &["broker"],
        )?;
        registry.register(Box::new(broker_reconnects_total.clone()))?;

        let broker_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "meridian_broker_latency_seconds",
                "Broker round-trip latency in seconds",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(broker_latency_seconds.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "meridian_uptime_seconds",
            "Process uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            candles_ingested_total,
            signals_total,
            trades_dispatched_total,
            trades_settled_total,
            eligibility_rejections_total,
            active_watchers,
            broker_reconnects_total,
            broker_latency_seconds,
            uptime_seconds,
        })
    }

    /// Renders all metrics in Prometheus text format (used only by the JSON
    /// reporter's debug snapshot, never served over HTTP).
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn inc_candles_ingested(&self, symbol: &str) {
        self.candles_ingested_total.with_label_values(&[symbol]).inc();
    }

    pub fn inc_signal(&self, strategy: &str, kind: &str) {
        self.signals_total.with_label_values(&[strategy, kind]).inc();
    }

    pub fn inc_trade_dispatched(&self, symbol: &str) {
        self.trades_dispatched_total.with_label_values(&[symbol]).inc();
    }

    pub fn inc_trade_settled(&self, outcome: &str) {
        self.trades_settled_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_eligibility_rejection(&self, reason: &str) {
        self.eligibility_rejections_total.with_label_values(&[reason]).inc();
    }

    pub fn set_active_watchers(&self, count: usize) {
        self.active_watchers.set(count as f64);
    }

    pub fn inc_reconnects(&self, broker: &str) {
        self.broker_reconnects_total.with_label_values(&[broker]).inc();
    }

    pub fn observe_broker_latency(&self, endpoint: &str, seconds: f64) {
        self.broker_latency_seconds.with_label_values(&[endpoint]).observe(seconds);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to create default Metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_render_contains_prefix() {
        let metrics = Metrics::new().expect("failed to create metrics");
        assert!(metrics.render().contains("meridian_"));
    }

    #[test]
    fn candle_ingestion_counter_increments_per_symbol() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.inc_candles_ingested("frxEURUSD");
        metrics.inc_candles_ingested("frxEURUSD");
        metrics.inc_candles_ingested("frxGBPUSD");
        let output = metrics.render();
        assert!(output.contains("meridian_candles_ingested_total"));
        assert!(output.contains("frxEURUSD"));
    }

    #[test]
    fn active_watchers_gauge_reflects_last_set_value() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.set_active_watchers(3);
        assert!(metrics.render().contains("meridian_active_watchers 3"));
    }

    #[test]
    fn eligibility_rejections_counted_by_reason() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.inc_eligibility_rejection("daily_cap");
        metrics.inc_eligibility_rejection("overall_cap");
        let output = metrics.render();
        assert!(output.contains("meridian_eligibility_rejections_total"));
    }
}
