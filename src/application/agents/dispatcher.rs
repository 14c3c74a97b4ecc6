//! TradeDispatcher (C8): turns a batch of signals into broker orders for
//! every eligible, subscribed user, then hands the resulting contract off
//! to TradeMonitor over a bounded channel — the one documented rendezvous
//! between components (§5).

use super::eligibility;
use crate::config::Config;
use crate::domain::errors::DispatchError;
use crate::domain::ports::{BrokerClient, ProposalRequest};
use crate::domain::trading::types::{ContractType, Signal, Trade, TradeStatus};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::Store;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

#[derive(Clone)]
pub struct TradeDispatcher {
    broker: Arc<dyn BrokerClient>,
    store: Store,
    config: Config,
    new_contract_tx: Sender<String>,
    metrics: Metrics,
}

impl TradeDispatcher {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        store: Store,
        config: Config,
        new_contract_tx: Sender<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            broker,
            store,
            config,
            new_contract_tx,
            metrics,
        }
    }

    /// Dispatches every signal to every eligible subscriber. Dedupes within
    /// this call on `(email, signal.ts, symbol)` so a re-evaluated signal
    /// inside the same orchestrator iteration never double-orders.
    pub async fn process(&self, signals: &[Signal]) {
        let mut seen = HashSet::new();

        let users = match self.store.users.all_trading().await {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "dispatcher failed to list trading users");
                return;
            }
        };

        for signal in signals {
            for user in &users {
                if !user.trading_today {
                    continue;
                }
                let dedupe_key = (user.email.clone(), signal.ts, signal.pair.clone());
                if seen.contains(&dedupe_key) {
                    continue;
                }

                let subscriptions = self
                    .store
                    .users
                    .symbols_for(&user.email)
                    .await
                    .unwrap_or_default();
                if !subscriptions.iter().any(|s| s.symbol == signal.pair) {
                    continue;
                }

                match eligibility::is_eligible(&self.store, self.broker.clone(), user).await {
                    Ok(true) => {}
                    Ok(false) => {
                        self.metrics.inc_eligibility_rejection("cap_breached");
                        continue;
                    }
                    Err(e) => {
                        warn!(email = %user.email, error = %e, "eligibility check failed, skipping signal");
                        continue;
                    }
                }

                seen.insert(dedupe_key);
                if let Err(e) = self.dispatch_one(user, signal).await {
                    warn!(email = %user.email, pair = %signal.pair, error = %e, "dispatch failed");
                }
            }
        }
    }

    async fn dispatch_one(
        &self,
        user: &crate::domain::trading::types::User,
        signal: &Signal,
    ) -> Result<(), DispatchError> {
        let risk_amount = crate::application::risk::sizer::risk_amount(
            self.broker.as_ref(),
            &user.token,
            self.config.risk_percentage,
        )
        .await;
        if risk_amount <= Decimal::ZERO {
            return Err(DispatchError::NonPositiveSize {
                email: user.email.clone(),
                symbol: signal.pair.clone(),
            });
        }

        let contract_type = ContractType::from(signal.kind);
        let take_profit = self.adapt_take_profit(signal);
        let stop_loss = self.adapt_stop_loss(signal);

        let proposal = self
            .broker
            .proposal(&ProposalRequest {
                contract_type,
                symbol: signal.pair.clone(),
                amount: risk_amount,
                multiplier: self.config.default_multiplier,
                take_profit,
                stop_loss,
            })
            .await?;

        let contract_id = self
            .broker
            .buy(&proposal.proposal_id, proposal.ask_price)
            .await?;

        let trade = Trade {
            contract_id: contract_id.clone(),
            email: user.email.clone(),
            token: user.token.clone(),
            symbol: signal.pair.clone(),
            timestamp: Utc::now().timestamp(),
            trade_status: TradeStatus::Active,
            amount: risk_amount,
            multiplier: self.config.default_multiplier,
            contract_type,
            currency: "USD".to_string(),
            take_profit,
            stop_loss,
            buy_price: proposal.ask_price,
            sell_price: None,
            sell_time: None,
            profit_loss: None,
        };

        if let Err(e) = self.store.trades.insert(&trade).await {
            warn!(contract_id = %contract_id, error = %e, "failed to persist dispatched trade");
        }

        info!(email = %user.email, contract_id = %contract_id, pair = %signal.pair, "dispatched trade");
        self.metrics.inc_trade_dispatched(&signal.pair);
        if self.new_contract_tx.send(contract_id).await.is_err() {
            warn!("trade monitor channel closed, new contract will only surface via reconciliation");
        }

        Ok(())
    }

    /// §4.8/§9 adapter-layer transform between signal-space and
    /// broker-space limit orders, preserving the source's observed
    /// `take_profit × multiplier` behavior as a configurable constant.
    fn adapt_take_profit(&self, signal: &Signal) -> Decimal {
        signal.tp * self.config.dispatcher_tp_multiplier
    }

    fn adapt_stop_loss(&self, signal: &Signal) -> Decimal {
        signal.sl + self.config.dispatcher_sl_offset
    }
}
