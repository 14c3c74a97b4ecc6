//! EligibilityEvaluator (C7) and AutoTradingMonitor (§4.7): a pure decision
//! core shared by two call sites — the per-signal check TradeDispatcher
//! makes against the broker's live profit table, and the fixed-interval
//! sweep AutoTradingMonitor runs against the store's `trades` rows.

use crate::domain::errors::EligibilityError;
use crate::domain::ports::BrokerClient;
use crate::domain::trading::types::{Risk, User, Window};
use crate::infrastructure::persistence::Store;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Eligible,
    /// Per-trade or per-day cap breached: soft-disable today only.
    DailyCapBreached,
    /// Cumulative cap breached: hard stop.
    OverallCapBreached,
}

impl Decision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Decision::Eligible)
    }
}

/// Pure decision (§4.7 steps 2-6). `today_trade_count` is compared against
/// `risk.max_trades_per_day()`; the P/L figures are already netted.
pub fn decide(
    risk: &Risk,
    window: &Window,
    today_trade_count: u64,
    today_loss: Decimal,
    today_win: Decimal,
    cumulative_loss: Decimal,
    cumulative_win: Decimal,
    balance: Decimal,
    balance_today: Decimal,
) -> Decision {
    let max_trades_per_day = risk.max_trades_per_day();
    if Decimal::from(today_trade_count) >= max_trades_per_day {
        return Decision::DailyCapBreached;
    }
    if today_loss >= balance_today * window.loss_per_day / Decimal::ONE_HUNDRED
        || today_win >= balance_today * window.win_per_day / Decimal::ONE_HUNDRED
    {
        return Decision::DailyCapBreached;
    }
    if cumulative_loss >= balance * window.overall_loss / Decimal::ONE_HUNDRED
        || cumulative_win >= balance * window.overall_win / Decimal::ONE_HUNDRED
    {
        return Decision::OverallCapBreached;
    }
    Decision::Eligible
}

async fn apply(store: &Store, email: &str, decision: Decision) -> Result<bool, EligibilityError> {
    match decision {
        Decision::Eligible => Ok(true),
        Decision::DailyCapBreached => {
            store
                .users
                .set_trading_flags(email, true, false)
                .await
                .map_err(|e| EligibilityError::MissingRisk {
                    email: format!("{email}: {e}"),
                })?;
            Ok(false)
        }
        Decision::OverallCapBreached => {
            store
                .users
                .set_trading_flags(email, false, false)
                .await
                .map_err(|e| EligibilityError::MissingRisk {
                    email: format!("{email}: {e}"),
                })?;
            Ok(false)
        }
    }
}

/// Per-signal path (TradeDispatcher): reads today's and cumulative P/L from
/// the broker's live profit table bounded by `[today, today]` and
/// `[start_date, today]`.
pub async fn evaluate_via_broker(
    store: &Store,
    broker: &dyn BrokerClient,
    user: &User,
) -> Result<bool, EligibilityError> {
    let window = store
        .windows
        .find_by_email(&user.email)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| EligibilityError::MissingRisk {
            email: user.email.clone(),
        })?;
    let risk = store
        .risk
        .find_by_email(&user.email)
        .await
        .unwrap_or_default();

    let today_start = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc()
        .timestamp();
    let start_ts = window
        .start_date
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc()
        .timestamp();

    let today = broker
        .profit_table(today_start, today_start + 86_400)
        .await
        .map_err(|e| EligibilityError::ProfitTableUnavailable {
            email: user.email.clone(),
            reason: e.to_string(),
        })?;
    let cumulative = broker
        .profit_table(start_ts, today_start + 86_400)
        .await
        .map_err(|e| EligibilityError::ProfitTableUnavailable {
            email: user.email.clone(),
            reason: e.to_string(),
        })?;

    let (today_loss, today_win) = net_pnl(&today.transactions.iter().map(|t| t.profit_loss).collect::<Vec<_>>());
    let (cumulative_loss, cumulative_win) =
        net_pnl(&cumulative.transactions.iter().map(|t| t.profit_loss).collect::<Vec<_>>());

    let decision = decide(
        &risk,
        &window,
        today.transactions.len() as u64,
        today_loss,
        today_win,
        cumulative_loss,
        cumulative_win,
        user.balance,
        user.balance_today,
    );
    apply(store, &user.email, decision).await
}

/// Interval path (AutoTradingMonitor): reads P/L from the store's `trades`
/// rows rather than a live broker round-trip.
pub async fn evaluate_via_store(store: &Store, user: &User) -> Result<bool, EligibilityError> {
    let window = store
        .windows
        .find_by_email(&user.email)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| EligibilityError::MissingRisk {
            email: user.email.clone(),
        })?;
    let risk = store
        .risk
        .find_by_email(&user.email)
        .await
        .unwrap_or_default();

    let today_start = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc()
        .timestamp();
    let start_ts = window
        .start_date
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc()
        .timestamp();

    let today_count = store
        .trades
        .count_for_user_today(&user.email, today_start)
        .await
        .map_err(|e| EligibilityError::ProfitTableUnavailable {
            email: user.email.clone(),
            reason: e.to_string(),
        })?;
    let today_trades = store
        .trades
        .find_for_user_since(&user.email, today_start)
        .await
        .unwrap_or_default();
    let cumulative_trades = store
        .trades
        .find_for_user_since(&user.email, start_ts)
        .await
        .unwrap_or_default();

    let (today_loss, today_win) =
        net_pnl(&today_trades.iter().filter_map(|t| t.profit_loss).collect::<Vec<_>>());
    let (cumulative_loss, cumulative_win) =
        net_pnl(&cumulative_trades.iter().filter_map(|t| t.profit_loss).collect::<Vec<_>>());

    let decision = decide(
        &risk,
        &window,
        today_count,
        today_loss,
        today_win,
        cumulative_loss,
        cumulative_win,
        user.balance,
        user.balance_today,
    );
    apply(store, &user.email, decision).await
}

/// Splits a list of signed P/L figures into `(total_loss_magnitude,
/// total_win)`, both non-negative.
fn net_pnl(pnls: &[Decimal]) -> (Decimal, Decimal) {
    let mut loss = Decimal::ZERO;
    let mut win = Decimal::ZERO;
    for pnl in pnls {
        if *pnl < Decimal::ZERO {
            loss += pnl.abs();
        } else {
            win += *pnl;
        }
    }
    (loss, win)
}

/// AutoTradingMonitor: sweeps every trading-enabled user on a fixed
/// interval, independent of signal arrival, so cap breaches are enforced
/// even for users without a new signal this cycle (§4.7).
pub async fn run_auto_trading_monitor(store: Store, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
    loop {
        ticker.tick().await;
        let users = match store.users.all_trading().await {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "auto trading monitor failed to list trading users");
                continue;
            }
        };
        for user in users {
            match evaluate_via_store(&store, &user).await {
                Ok(eligible) => {
                    if !eligible {
                        info!(email = %user.email, "auto trading monitor disabled user for cap breach");
                    }
                }
                Err(e) => warn!(email = %user.email, error = %e, "auto trading monitor evaluation failed"),
            }
        }
    }
}

/// Convenience alias used by TradeDispatcher call sites.
pub async fn is_eligible(
    store: &Store,
    broker: Arc<dyn BrokerClient>,
    user: &User,
) -> Result<bool, EligibilityError> {
    evaluate_via_broker(store, broker.as_ref(), user).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn risk(per_trade: Decimal, per_day: Decimal) -> Risk {
        Risk { per_trade, per_day }
    }

    fn window() -> Window {
        Window {
            email: "u@example.com".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            stop_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            loss_per_day: dec!(2),
            overall_loss: dec!(5),
            win_per_day: dec!(100),
            overall_win: dec!(100),
        }
    }

    #[test]
    fn daily_cap_breached_on_trade_count() {
        let d = decide(&risk(dec!(1), dec!(2)), &window(), 2, dec!(0), dec!(0), dec!(0), dec!(0), dec!(1000), dec!(1000));
        assert_eq!(d, Decision::DailyCapBreached);
    }

    #[test]
    fn daily_cap_breached_on_loss_percentage() {
        // S5: loss_per_day=2%, balance_today=1000 -> threshold 20; loss of 21 breaches.
        let d = decide(&risk(dec!(1), dec!(10)), &window(), 0, dec!(21), dec!(0), dec!(0), dec!(0), dec!(1000), dec!(1000));
        assert_eq!(d, Decision::DailyCapBreached);
    }

    #[test]
    fn overall_cap_breached_on_cumulative_loss() {
        // S6: overall_loss=5%, balance=1000 -> threshold 50; cumulative loss of 60 breaches.
        let mut w = window();
        w.overall_loss = dec!(5);
        let d = decide(&risk(dec!(1), dec!(10)), &w, 0, dec!(0), dec!(0), dec!(60), dec!(0), dec!(1000), dec!(1000));
        assert_eq!(d, Decision::OverallCapBreached);
    }

    #[test]
    fn eligible_when_under_every_cap() {
        let d = decide(&risk(dec!(1), dec!(10)), &window(), 1, dec!(0), dec!(0), dec!(0), dec!(0), dec!(1000), dec!(1000));
        assert_eq!(d, Decision::Eligible);
        assert!(d.is_eligible());
    }

    #[test]
    fn net_pnl_splits_signed_values() {
        let (loss, win) = net_pnl(&[dec!(-10), dec!(5), dec!(-2)]);
        assert_eq!(loss, dec!(12));
        assert_eq!(win, dec!(5));
    }
}
