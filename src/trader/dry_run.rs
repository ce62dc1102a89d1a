//! Trader that acknowledges every action without touching a venue

use async_trait::async_trait;
use log::info;
use uuid::Uuid;

use crate::grid::errors::{TradeError, TradeResult};
use crate::market::{AccountId, OrderId, OrderRequest};

use super::Trader;

#[derive(Debug, Default)]
pub struct DryRunTrader;

impl DryRunTrader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Trader for DryRunTrader {
    fn create_cid(&self, exchange: &str) -> String {
        format!("{}-{}", exchange, Uuid::new_v4().simple())
    }

    async fn place_order(
        &self,
        account: AccountId,
        order: &OrderRequest,
        sync: bool,
    ) -> TradeResult<OrderId> {
        if !order.is_valid() {
            return Err(TradeError::RejectedByVenue(format!("invalid order {}", order.cid)));
        }
        info!(
            "[DRY RUN] place account={} cid={} {} {:?} {} @ {:?} tif={:?} sync={}",
            account,
            order.cid,
            order.symbol,
            order.side,
            order.amount,
            order.price,
            order.time_in_force,
            sync
        );
        Ok(order.cid.clone())
    }

    async fn amend_order(
        &self,
        account: AccountId,
        order: &OrderRequest,
        sync: bool,
    ) -> TradeResult<OrderId> {
        if !order.is_valid() {
            return Err(TradeError::RejectedByVenue(format!("invalid amend {}", order.cid)));
        }
        info!(
            "[DRY RUN] amend account={} cid={} {} -> {:?} sync={}",
            account, order.cid, order.symbol, order.price, sync
        );
        Ok(order.cid.clone())
    }

    async fn batch_cancel_order_by_id(
        &self,
        account: AccountId,
        cids: &[String],
        symbol: Option<&str>,
        sync: bool,
    ) -> TradeResult<()> {
        info!(
            "[DRY RUN] cancel account={} symbol={:?} cids={:?} sync={}",
            account, symbol, cids, sync
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Side;

    #[tokio::test]
    async fn test_dry_run_acknowledges() {
        let trader = DryRunTrader::new();
        let a = trader.create_cid("spot");
        let b = trader.create_cid("spot");
        assert!(a.starts_with("spot-"));
        assert_ne!(a, b);

        let order = OrderRequest::market(&a, "BTC_USDT", Side::Buy, 0.01);
        assert_eq!(trader.place_order(0, &order, true).await.unwrap(), a);
        assert!(trader
            .batch_cancel_order_by_id(0, &[a.clone()], None, false)
            .await
            .is_ok());

        let bad = OrderRequest::market(&b, "BTC_USDT", Side::Buy, 0.0);
        assert!(matches!(
            trader.place_order(0, &bad, false).await,
            Err(TradeError::RejectedByVenue(_))
        ));
    }
}
