//! Effective spread captured by a completed grid round (maker fill + hedge fill)

use serde::Serialize;

use crate::market::Side;

use super::buffer::BoundedStats;
use super::sink::BatchWriter;
use super::slippage::signed_slippage;
use super::TelemetryError;

/// Grid context captured when a hedge is sent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DealContext {
    pub grid_side: Side,
    pub grid_price: f64,
    pub future_deal_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealPriceRecord {
    pub hedge_cid: String,
    pub grid_side: Side,
    pub grid_expected_price: f64,
    pub grid_actual_price: f64,
    pub grid_slippage: f64,
    pub future_deal_price: f64,
    pub hedge_deal_price: f64,
    pub amount: f64,
    pub deal_time: u64,
}

pub struct DealPriceCollector {
    pending: BoundedStats<DealContext>,
    writer: BatchWriter<DealPriceRecord>,
}

impl DealPriceCollector {
    pub fn new(capacity: usize, writer: BatchWriter<DealPriceRecord>) -> Self {
        Self {
            pending: BoundedStats::new(capacity),
            writer,
        }
    }

    pub fn register(&mut self, hedge_cid: &str, context: DealContext) {
        self.pending.insert(hedge_cid.to_string(), context);
    }

    pub fn on_hedge_fill(
        &mut self,
        hedge_cid: &str,
        hedge_deal_price: f64,
        deal_time: u64,
    ) -> Result<Option<DealPriceRecord>, TelemetryError> {
        let Some(ctx) = self.pending.take(hedge_cid) else {
            return Ok(None);
        };
        if ctx.future_deal_price <= 0.0 {
            return Ok(None);
        }
        let grid_actual_price = hedge_deal_price / ctx.future_deal_price;
        let record = DealPriceRecord {
            hedge_cid: hedge_cid.to_string(),
            grid_side: ctx.grid_side,
            grid_expected_price: ctx.grid_price,
            grid_actual_price,
            grid_slippage: signed_slippage(ctx.grid_side, ctx.grid_price, grid_actual_price),
            future_deal_price: ctx.future_deal_price,
            hedge_deal_price,
            amount: ctx.amount,
            deal_time,
        };
        self.writer.push(record.clone())?;
        Ok(Some(record))
    }

    pub fn flush(&mut self) -> Result<(), TelemetryError> {
        self.writer.flush()
    }
}
