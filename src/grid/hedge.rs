//! Opposite-leg hedging of maker fills
//!
//! Hedges are limit GTC orders on the hedge account, priced through the
//! reference by the slippage tolerance, and retried on a background task until
//! the venue acknowledges them. Every attempt reuses the same cid.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::helpers::round_to_decimals;
use crate::market::{AccountId, Bbo, OrderId, OrderRequest, Position, Side, TimeInForce};
use crate::trader::Trader;

use super::config::StrategyConfig;
use super::errors::TradeResult;

/// Log a still-failing hedge every this many attempts
const RETRY_LOG_EVERY: u32 = 50;

/// Result of a hedge task once the venue accepted the order
#[derive(Debug, Clone, PartialEq)]
pub struct HedgeOutcome {
    pub cid: String,
    pub order_id: OrderId,
    pub attempts: u32,
}

pub struct HedgeExecutor {
    trader: Arc<dyn Trader>,
    account: AccountId,
    exchange: String,
    symbol: String,
    sync: bool,
    slippage_tolerance: f64,
    price_decimals: u32,
    retry_delay: Duration,
}

impl HedgeExecutor {
    pub fn new(trader: Arc<dyn Trader>, config: &StrategyConfig) -> Self {
        Self {
            trader,
            account: config.execution.hedge_account,
            exchange: config.execution.hedge_exchange.clone(),
            symbol: config.pairs.spot.clone(),
            sync: config.execution.sync,
            slippage_tolerance: config.hedge.slippage_tolerance,
            price_decimals: config.hedge.price_decimals,
            retry_delay: config.hedge.retry_delay(),
        }
    }

    /// Spot price a hedge on `side` is referenced to
    pub fn reference_price(side: Side, spot: &Bbo) -> f64 {
        match side {
            Side::Buy => spot.ask_price,
            Side::Sell => spot.bid_price,
        }
    }

    /// Limit price crossing `reference` by the slippage tolerance
    pub fn limit_price(&self, side: Side, reference: f64) -> f64 {
        let raw = match side {
            Side::Buy => reference * (1.0 + self.slippage_tolerance),
            Side::Sell => reference * (1.0 - self.slippage_tolerance),
        };
        round_to_decimals(raw, self.price_decimals)
    }

    /// Hedge order for `amount` on `side` with a fresh cid
    pub fn build_order(&self, side: Side, amount: f64, reference: f64) -> OrderRequest {
        let cid = self.trader.create_cid(&self.exchange);
        OrderRequest::limit(
            cid,
            self.symbol.clone(),
            side,
            amount,
            self.limit_price(side, reference),
            TimeInForce::Gtc,
        )
    }

    /// Send `order` and keep retrying on a background task until acknowledged
    pub fn submit(&self, order: OrderRequest) -> JoinHandle<HedgeOutcome> {
        let trader = self.trader.clone();
        let account = self.account;
        let sync = self.sync;
        let retry_delay = self.retry_delay;

        tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                match trader.place_order(account, &order, sync).await {
                    Ok(order_id) => {
                        info!(
                            "Hedge {} {} {} @ {:?} acknowledged after {} attempt(s)",
                            order.cid, order.side, order.amount, order.price, attempts
                        );
                        return HedgeOutcome {
                            cid: order.cid.clone(),
                            order_id,
                            attempts,
                        };
                    }
                    Err(e) => {
                        if !e.is_retryable() {
                            error!("Hedge {} rejected (attempt {}): {}", order.cid, attempts, e);
                        } else if attempts == 1 || attempts % RETRY_LOG_EVERY == 0 {
                            warn!(
                                "Hedge {} failed (attempt {}), retrying in {:?}: {}",
                                order.cid, attempts, retry_delay, e
                            );
                        }
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        })
    }

    /// Close `position` at market on the hedge account (single attempt)
    pub async fn flatten(&self, position: &Position) -> TradeResult<Option<OrderId>> {
        if position.amount <= 0.0 {
            return Ok(None);
        }
        let order = OrderRequest::market(
            self.trader.create_cid(&self.exchange),
            self.symbol.clone(),
            position.closing_side(),
            position.amount,
        );
        info!(
            "Flattening {} {:?} {} with market {}",
            position.symbol, position.side, position.amount, order.side
        );
        self.trader
            .place_order(self.account, &order, self.sync)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{OrderType, PositionSide};
    use crate::trader::mock::MockTrader;

    fn executor(trader: Arc<MockTrader>) -> HedgeExecutor {
        let mut config = StrategyConfig::new("BTC_USDT", "BTC_FUT");
        config.hedge.retry_delay_ms = 1;
        HedgeExecutor::new(trader, &config)
    }

    #[test]
    fn test_limit_price_crosses_reference() {
        let hedger = executor(Arc::new(MockTrader::new()));
        // 0.2% through the touch, rounded to cents
        assert_eq!(hedger.limit_price(Side::Buy, 50_000.0), 50_100.0);
        assert_eq!(hedger.limit_price(Side::Sell, 50_000.0), 49_900.0);
        assert_eq!(hedger.limit_price(Side::Buy, 123.456), 123.7);
    }

    #[test]
    fn test_reference_price() {
        let spot = Bbo::new("BTC_USDT", 99.0, 101.0, 0);
        assert_eq!(HedgeExecutor::reference_price(Side::Buy, &spot), 101.0);
        assert_eq!(HedgeExecutor::reference_price(Side::Sell, &spot), 99.0);
    }

    #[tokio::test]
    async fn test_submit_retries_with_same_cid() {
        let trader = Arc::new(MockTrader::new());
        let hedger = executor(trader.clone());
        trader.fail_next_places(3).await;

        let order = hedger.build_order(Side::Buy, 0.008, 50_000.0);
        assert_eq!(order.time_in_force, Some(TimeInForce::Gtc));
        let cid = order.cid.clone();
        let outcome = hedger.submit(order).await.unwrap();

        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.cid, cid);
        let placed = trader.placed_on(0).await;
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].cid, cid);
        assert_eq!(placed[0].symbol, "BTC_USDT");
        assert_eq!(placed[0].price, Some(50_100.0));
    }

    #[tokio::test]
    async fn test_flatten_position() {
        let trader = Arc::new(MockTrader::new());
        let hedger = executor(trader.clone());
        let position = Position {
            symbol: "BTC_USDT".into(),
            side: PositionSide::Long,
            amount: 0.016,
        };
        assert!(hedger.flatten(&position).await.unwrap().is_some());
        let placed = trader.placed_on(0).await;
        assert_eq!(placed[0].order_type, OrderType::Market);
        assert_eq!(placed[0].side, Side::Sell);
        assert_eq!(placed[0].amount, 0.016);

        let flat = Position {
            amount: 0.0,
            ..position
        };
        assert!(hedger.flatten(&flat).await.unwrap().is_none());
    }
}
