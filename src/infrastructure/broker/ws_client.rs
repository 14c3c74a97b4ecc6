//! Production `BrokerClient` (C1): one persistent `tokio-tungstenite`
//! session, multiplexing concurrent logical calls by `req_id` over a
//! `tokio::sync::{oneshot, Mutex}` pending-request table, reconnecting with
//! the same doubling-backoff-with-cap loop the teacher's Binance WebSocket
//! manager uses (§4.1).

use crate::domain::errors::BrokerError;
use crate::domain::market::candle::Candle;
use crate::domain::ports::{
    BrokerClient, BrokerClientFactory, ContractState, ContractStatus, ProfitTable,
    ProfitTableEntry, ProposalRequest, ProposalResponse,
};
use crate::domain::trading::types::ContractType;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::observability::latency_tracker::LatencyGuard;
use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BACKOFF: u64 = 60;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

pub struct WsBrokerClient {
    outbound: mpsc::Sender<Message>,
    pending: PendingMap,
    next_id: AtomicU64,
    last_token: Arc<RwLock<Option<String>>>,
    metrics: Metrics,
}

impl WsBrokerClient {
    /// Opens the connection and spawns the supervisor task that owns its
    /// lifecycle. The returned handle may be cloned into an `Arc<dyn
    /// BrokerClient>` immediately; the first call simply queues on the
    /// outbound channel until the socket is up.
    pub fn connect(ws_url: &str, metrics: Metrics) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(100);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let last_token = Arc::new(RwLock::new(None));

        let client = Arc::new(Self {
            outbound: outbound_tx,
            pending: pending.clone(),
            next_id: AtomicU64::new(1),
            last_token: last_token.clone(),
            metrics: metrics.clone(),
        });

        tokio::spawn(Self::run(
            ws_url.to_string(),
            outbound_rx,
            pending,
            last_token,
            metrics,
        ));
        client
    }

    fn next_req_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call(&self, mut body: Value, req_id: u64, endpoint: &str) -> Result<Value, BrokerError> {
        let _guard = LatencyGuard::new(
            self.metrics
                .broker_latency_seconds
                .with_label_values(&[endpoint]),
        );

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(req_id, tx);
        body["req_id"] = json!(req_id);

        if self
            .outbound
            .send(Message::Text(body.to_string().into()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&req_id);
            return Err(BrokerError::Transient {
                reason: "broker connection unavailable".into(),
            });
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(value)) => parse_response(value),
            Ok(Err(_)) => Err(BrokerError::Transient {
                reason: "broker session dropped before responding".into(),
            }),
            Err(_) => {
                self.pending.lock().await.remove(&req_id);
                Err(BrokerError::Transient {
                    reason: "broker request timed out".into(),
                })
            }
        }
    }

    async fn run(
        url: String,
        mut outbound_rx: mpsc::Receiver<Message>,
        pending: PendingMap,
        last_token: Arc<RwLock<Option<String>>>,
        metrics: Metrics,
    ) {
        let mut backoff = 1u64;
        loop {
            match Self::connect_and_serve(&url, &mut outbound_rx, &pending, &last_token).await {
                Ok(()) => {
                    info!("broker websocket session ended (client dropped)");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, backoff, "broker websocket error, reconnecting");
                    metrics.inc_reconnects("broker");
                    pending.lock().await.clear();
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            }
        }
    }

    async fn connect_and_serve(
        url: &str,
        outbound_rx: &mut mpsc::Receiver<Message>,
        pending: &PendingMap,
        last_token: &Arc<RwLock<Option<String>>>,
    ) -> anyhow::Result<()> {
        let (ws_stream, _) = connect_async(url)
            .await
            .context("failed to connect to broker websocket")?;
        info!(url, "broker websocket connected");

        let (mut write, mut read) = ws_stream.split();

        if let Some(token) = last_token.read().await.clone() {
            let reauth = json!({ "authorize": token });
            if write.send(Message::Text(reauth.to_string().into())).await.is_err() {
                anyhow::bail!("failed to re-authorize after reconnect");
            }
        }

        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    match outgoing {
                        Some(msg) => {
                            if write.send(msg).await.is_err() {
                                anyhow::bail!("broker websocket write failed");
                            }
                        }
                        None => return Ok(()),
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => Self::dispatch(&text, pending).await,
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(frame))) => {
                            anyhow::bail!("broker websocket closed by server: {frame:?}");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => anyhow::bail!("broker websocket read error: {e}"),
                        None => anyhow::bail!("broker websocket stream ended"),
                    }
                }
            }
        }
    }

    async fn dispatch(text: &str, pending: &PendingMap) {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to parse broker message");
                return;
            }
        };
        match value.get("req_id").and_then(|v| v.as_u64()) {
            Some(req_id) => {
                if let Some(tx) = pending.lock().await.remove(&req_id) {
                    let _ = tx.send(value);
                } else {
                    debug!(req_id, "no pending request for broker message");
                }
            }
            None => debug!("broker message without req_id"),
        }
    }
}

fn parse_response(value: Value) -> Result<Value, BrokerError> {
    if let Some(err) = value.get("error") {
        let code = err
            .get("code")
            .and_then(|c| c.as_str())
            .unwrap_or("UnknownError")
            .to_string();
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();
        if matches!(
            code.as_str(),
            "InvalidToken" | "AuthorizationRequired" | "DisabledClient" | "SelfExclusion"
        ) {
            return Err(BrokerError::Auth {
                token_suffix: "****".into(),
                reason: format!("{code}: {msg}"),
            });
        }
        return Err(BrokerError::Proposal { code, msg });
    }
    Ok(value)
}

fn parse_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
        _ => None,
    }
}

fn decimal_field(v: &Value, field: &str) -> Result<Decimal, BrokerError> {
    v.get(field)
        .and_then(parse_decimal)
        .ok_or_else(|| BrokerError::Transient {
            reason: format!("missing or non-numeric field '{field}' in broker response"),
        })
}

fn token_suffix(token: &str) -> String {
    let n = token.len();
    if n <= 4 {
        token.to_string()
    } else {
        token[n - 4..].to_string()
    }
}

#[async_trait]
impl BrokerClient for WsBrokerClient {
    async fn authorize(&self, token: &str) -> Result<(), BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({ "authorize": token });
        let response = self.call(body, req_id, "authorize").await.map_err(|e| match e {
            BrokerError::Transient { reason } => BrokerError::Auth {
                token_suffix: token_suffix(token),
                reason,
            },
            other => other,
        })?;
        if response.get("authorize").is_none() {
            return Err(BrokerError::Auth {
                token_suffix: token_suffix(token),
                reason: "missing authorize field in response".into(),
            });
        }
        *self.last_token.write().await = Some(token.to_string());
        Ok(())
    }

    async fn ticks_history(
        &self,
        symbol: &str,
        start: i64,
        end: i64,
        count: u32,
    ) -> Result<Vec<Candle>, BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({
            "ticks_history": symbol,
            "granularity": 60,
            "style": "candles",
            "start": start,
            "end": end,
            "count": count,
        });
        let response = self.call(body, req_id, "ticks_history").await?;
        let candles = response
            .get("candles")
            .and_then(|c| c.as_array())
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing candles field in ticks_history response".into(),
            })?;

        let mut out = Vec::with_capacity(candles.len());
        for c in candles {
            let ts = c.get("epoch").and_then(|v| v.as_i64()).ok_or_else(|| {
                BrokerError::Transient {
                    reason: "candle missing epoch".into(),
                }
            })?;
            out.push(Candle {
                symbol: symbol.to_string(),
                ts,
                open: decimal_field(c, "open")?,
                high: decimal_field(c, "high")?,
                low: decimal_field(c, "low")?,
                close: decimal_field(c, "close")?,
            });
        }
        Ok(out)
    }

    async fn contracts_for(&self, symbol: &str) -> Result<Vec<String>, BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({ "contracts_for": symbol });
        let response = self.call(body, req_id, "contracts_for").await?;
        let available = response
            .get("contracts_for")
            .and_then(|c| c.get("available"))
            .and_then(|a| a.as_array())
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing contracts_for.available in response".into(),
            })?;
        Ok(available
            .iter()
            .filter_map(|v| v.get("contract_type").and_then(|c| c.as_str()).map(String::from))
            .collect())
    }

    async fn proposal(&self, req: &ProposalRequest) -> Result<ProposalResponse, BrokerError> {
        let req_id = self.next_req_id();
        let contract_type = match req.contract_type {
            ContractType::MultUp => "MULTUP",
            ContractType::MultDown => "MULTDOWN",
        };
        let body = json!({
            "proposal": 1,
            "basis": "stake",
            "contract_type": contract_type,
            "currency": "USD",
            "symbol": req.symbol,
            "amount": req.amount.to_string(),
            "multiplier": req.multiplier,
            "limit_order": {
                "take_profit": req.take_profit.to_string(),
                "stop_loss": req.stop_loss.to_string(),
            },
        });
        let response = self.call(body, req_id, "proposal").await?;
        let proposal = response
            .get("proposal")
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing proposal field in response".into(),
            })?;
        let proposal_id = proposal
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing proposal.id in response".into(),
            })?
            .to_string();
        Ok(ProposalResponse {
            proposal_id,
            ask_price: decimal_field(proposal, "ask_price")?,
        })
    }

    async fn buy(&self, proposal_id: &str, price: Decimal) -> Result<String, BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({ "buy": proposal_id, "price": price.to_string() });
        let response = self.call(body, req_id, "buy").await?;
        let buy = response.get("buy").ok_or_else(|| BrokerError::Transient {
            reason: "missing buy field in response".into(),
        })?;
        buy.get("contract_id")
            .and_then(|v| v.as_str().map(String::from).or_else(|| v.as_i64().map(|i| i.to_string())))
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing buy.contract_id in response".into(),
            })
    }

    async fn sell(&self, contract_id: &str, price: Decimal) -> Result<(), BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({ "sell": contract_id, "price": price.to_string() });
        let response = self.call(body, req_id, "sell").await?;
        response
            .get("sell")
            .and_then(|s| s.get("sold_for"))
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing sell.sold_for in response".into(),
            })?;
        Ok(())
    }

    async fn open_contract(&self, contract_id: &str) -> Result<ContractState, BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({ "proposal_open_contract": 1, "contract_id": contract_id });
        let response = self.call(body, req_id, "open_contract").await?;
        let poc = response
            .get("proposal_open_contract")
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing proposal_open_contract in response".into(),
            })?;

        let is_sold = poc
            .get("is_sold")
            .and_then(|v| v.as_i64().map(|n| n != 0).or_else(|| v.as_bool()))
            .unwrap_or(false);
        let status_str = poc.get("status").and_then(|v| v.as_str()).unwrap_or("open");
        let status = if is_sold || status_str.eq_ignore_ascii_case("sold") {
            ContractStatus::Sold
        } else {
            ContractStatus::Open
        };

        Ok(ContractState {
            contract_id: contract_id.to_string(),
            status,
            is_sold,
            buy_price: decimal_field(poc, "buy_price")?,
            sell_price: poc.get("sell_price").and_then(parse_decimal),
            sell_time: poc.get("sell_time").and_then(|v| v.as_i64()),
            profit: poc.get("profit").and_then(parse_decimal),
        })
    }

    async fn balance(&self) -> Result<Decimal, BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({ "balance": 1 });
        let response = self.call(body, req_id, "balance").await?;
        let balance = response.get("balance").ok_or_else(|| BrokerError::Transient {
            reason: "missing balance field in response".into(),
        })?;
        decimal_field(balance, "balance")
    }

    async fn profit_table(&self, from: i64, to: i64) -> Result<ProfitTable, BrokerError> {
        let req_id = self.next_req_id();
        let body = json!({
            "profit_table": 1,
            "limit": 999,
            "sort": "ASC",
            "description": 1,
            "date_from": from,
            "date_to": to,
        });
        let response = self.call(body, req_id, "profit_table").await?;
        let pt = response
            .get("profit_table")
            .ok_or_else(|| BrokerError::Transient {
                reason: "missing profit_table field in response".into(),
            })?;
        let transactions = pt
            .get("transactions")
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(transactions.len());
        for t in &transactions {
            let contract_id = t
                .get("contract_id")
                .and_then(|v| v.as_str().map(String::from).or_else(|| v.as_i64().map(|i| i.to_string())))
                .unwrap_or_default();
            let buy_price = decimal_field(t, "buy_price")?;
            let sell_price = decimal_field(t, "sell_price")?;
            let sell_time = t.get("sell_time").and_then(|v| v.as_i64()).unwrap_or(0);
            let profit_loss = decimal_field(t, "profit_loss").unwrap_or(sell_price - buy_price);
            out.push(ProfitTableEntry {
                contract_id,
                buy_price,
                sell_price,
                sell_time,
                profit_loss,
            });
        }
        Ok(ProfitTable { transactions: out })
    }
}

/// Opens a fresh, unauthenticated session per call, per the
/// `BrokerClientFactory` contract.
pub struct WsBrokerClientFactory {
    pub ws_url: String,
    pub metrics: Metrics,
}

#[async_trait]
impl BrokerClientFactory for WsBrokerClientFactory {
    async fn connect(&self) -> Result<Arc<dyn BrokerClient>, BrokerError> {
        Ok(WsBrokerClient::connect(&self.ws_url, self.metrics.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_suffix_keeps_last_four_chars() {
        assert_eq!(token_suffix("abcd1234"), "1234");
        assert_eq!(token_suffix("ab"), "ab");
    }

    #[test]
    fn parse_decimal_accepts_string_and_number() {
        assert_eq!(parse_decimal(&json!("1.1035")), Some(Decimal::from_str("1.1035").unwrap()));
        assert_eq!(parse_decimal(&json!(1.1035)), Decimal::from_f64(1.1035));
        assert_eq!(parse_decimal(&json!(null)), None);
    }

    #[test]
    fn parse_response_maps_auth_error_codes() {
        let resp = json!({"error": {"code": "InvalidToken", "message": "bad token"}});
        let err = parse_response(resp).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn parse_response_maps_other_errors_to_proposal() {
        let resp = json!({"error": {"code": "InvalidOfferings", "message": "symbol closed"}});
        let err = parse_response(resp).unwrap_err();
        assert!(matches!(err, BrokerError::Proposal { .. }));
    }

    #[test]
    fn parse_response_passes_through_success() {
        let resp = json!({"balance": {"balance": "100.00"}});
        assert!(parse_response(resp).is_ok());
    }
}
