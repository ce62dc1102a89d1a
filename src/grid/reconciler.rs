//! Keeps in-flight maker orders consistent with the grid
//!
//! Runs under the grid book lock. Every tick it re-prices or cancels working
//! orders, then promotes resting grid orders whose hysteresis counter fired.
//! A canceled index only returns to the grid once the venue confirms it.
//!
//! Latency and slippage samples are registered before the trader call is
//! awaited, so an acknowledgement racing the call still finds its sample.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::helpers::{now_millis, prices_equal};
use crate::market::{AccountId, Bbo, OrderRequest, Side, TimeInForce};
use crate::telemetry::{FillKind, OrderKind, Telemetry};
use crate::trader::Trader;

use super::book::GridBook;
use super::config::StrategyConfig;
use super::hedge::HedgeExecutor;
use super::types::{GridOrder, PendingOrder, SpreadQuote};

/// Order actions that reached the venue during one pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    pub amended: usize,
    pub canceled: usize,
    pub submitted: usize,
}

impl ReconcileReport {
    pub fn merge(&mut self, other: ReconcileReport) {
        self.amended += other.amended;
        self.canceled += other.canceled;
        self.submitted += other.submitted;
    }
}

pub struct OrderReconciler {
    trader: Arc<dyn Trader>,
    telemetry: Arc<Telemetry>,
    account: AccountId,
    exchange: String,
    symbol: String,
    sync: bool,
    quote_tick: f64,
    open_margin: f64,
}

impl OrderReconciler {
    pub fn new(trader: Arc<dyn Trader>, telemetry: Arc<Telemetry>, config: &StrategyConfig) -> Self {
        Self {
            trader,
            telemetry,
            account: config.execution.maker_account,
            exchange: config.execution.maker_exchange.clone(),
            symbol: config.pairs.future_order_symbol().to_string(),
            sync: config.execution.sync,
            quote_tick: config.execution.quote_tick,
            open_margin: config.grid_config.open_margin,
        }
    }

    /// Passive price for a maker order on `side`
    ///
    /// Joins the same-side touch, or steps one tick inside the spread when that
    /// does not reach the opposite quote.
    pub fn maker_quote(side: Side, future: &Bbo, tick: f64) -> f64 {
        match side {
            Side::Sell => {
                let improved = future.ask_price - tick;
                if tick > 0.0 && improved > future.bid_price {
                    improved
                } else {
                    future.ask_price
                }
            }
            Side::Buy => {
                let improved = future.bid_price + tick;
                if tick > 0.0 && improved < future.ask_price {
                    improved
                } else {
                    future.bid_price
                }
            }
        }
    }

    /// Spot price the hedge for a grid order is expected at
    pub fn taker_reference(grid_order: &GridOrder, spot: &Bbo) -> f64 {
        HedgeExecutor::reference_price(grid_order.side, spot)
    }

    async fn note_send(&self, kind: OrderKind, cid: &str, side: Side, price: f64) {
        let sent_at = now_millis();
        self.telemetry
            .latency
            .lock()
            .await
            .record_send(kind, cid, price, sent_at);
        if kind != OrderKind::Cancel {
            self.telemetry
                .slippage
                .lock()
                .await
                .register(cid, FillKind::Maker, side, price);
        }
    }

    async fn forget_send(&self, kind: OrderKind, cid: &str, price: f64) {
        self.telemetry.latency.lock().await.forget_send(kind, cid, price);
    }

    /// Amend in-flight orders that are still valid and cancel those that are not
    pub async fn reprice_pending(
        &self,
        book: &mut GridBook,
        quote: &SpreadQuote,
        future: &Bbo,
        spot: &Bbo,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut to_cancel = Vec::new();

        for cid in book.working_cids() {
            let (Some(grid_order), Some(pending)) =
                (book.grid_order_for(&cid).cloned(), book.pending(&cid).cloned())
            else {
                continue;
            };

            if !grid_order.still_valid(quote) {
                to_cancel.push(cid);
                continue;
            }

            let new_price = Self::maker_quote(pending.side, future, self.quote_tick);
            let taker = Self::taker_reference(&grid_order, spot);
            if prices_equal(new_price, pending.price) {
                if let Some(g) = book.grid_order_for_mut(&cid) {
                    g.arm(new_price, taker);
                }
                continue;
            }

            let request = OrderRequest::limit(
                cid.clone(),
                self.symbol.clone(),
                pending.side,
                pending.amount,
                new_price,
                TimeInForce::PostOnly,
            );
            self.note_send(OrderKind::Amend, &cid, pending.side, new_price)
                .await;
            match self.trader.amend_order(self.account, &request, self.sync).await {
                Ok(_) => {
                    debug!("Amended {} {} -> {}", cid, pending.price, new_price);
                    if let Some(p) = book.pending_mut(&cid) {
                        p.price = new_price;
                    }
                    if let Some(g) = book.grid_order_for_mut(&cid) {
                        g.arm(new_price, taker);
                    }
                    report.amended += 1;
                }
                Err(e) => {
                    warn!("Amend {} failed, will retry next tick: {}", cid, e);
                    self.forget_send(OrderKind::Amend, &cid, new_price).await;
                    self.telemetry.slippage.lock().await.register(
                        &cid,
                        FillKind::Maker,
                        pending.side,
                        pending.price,
                    );
                }
            }
        }

        if !to_cancel.is_empty() {
            report.canceled += self.cancel(book, to_cancel).await;
        }
        report
    }

    /// Submit resting grid orders whose hysteresis counter fired this tick
    pub async fn trigger_grid_orders(
        &self,
        book: &mut GridBook,
        quote: &SpreadQuote,
        future: &Bbo,
        spot: &Bbo,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for index in book.resting_indices() {
            let Some(order) = book.resting(index).cloned() else {
                continue;
            };
            let favorable = order.is_favorable(quote, self.open_margin);
            let fired = book.hysteresis.observe(index, favorable);
            if !(favorable && fired) {
                continue;
            }

            let maker_side = order.maker_side();
            let price = Self::maker_quote(maker_side, future, self.quote_tick);
            let taker = Self::taker_reference(&order, spot);
            let cid = self.trader.create_cid(&self.exchange);
            let request = OrderRequest::limit(
                cid.clone(),
                self.symbol.clone(),
                maker_side,
                order.amount,
                price,
                TimeInForce::PostOnly,
            );

            self.note_send(OrderKind::Place, &cid, maker_side, price).await;
            match self.trader.place_order(self.account, &request, self.sync).await {
                Ok(_) => {
                    info!(
                        "Grid {} {} @ {:.6} triggered: {} {} {} @ {}",
                        index, order.side, order.price, cid, maker_side, order.amount, price
                    );
                    let mut armed = book.take_resting(index).unwrap_or(order);
                    armed.arm(price, taker);
                    let pending = PendingOrder::new(
                        cid,
                        self.symbol.clone(),
                        maker_side,
                        price,
                        armed.amount,
                        TimeInForce::PostOnly,
                    );
                    book.track(pending, armed);
                    book.hysteresis.reset(index);
                    report.submitted += 1;
                }
                Err(e) => {
                    warn!("Grid {} order placement failed: {}", index, e);
                    self.forget_send(OrderKind::Place, &cid, price).await;
                    self.telemetry.slippage.lock().await.forget(&cid);
                }
            }
        }
        report
    }

    /// Request cancellation of every working order
    pub async fn cancel_all(&self, book: &mut GridBook) -> ReconcileReport {
        let cids = book.working_cids();
        let mut report = ReconcileReport::default();
        if !cids.is_empty() {
            report.canceled = self.cancel(book, cids).await;
        }
        report
    }

    /// Returns how many cancels the venue accepted
    async fn cancel(&self, book: &mut GridBook, cids: Vec<String>) -> usize {
        let sent: Vec<(String, Side, f64)> = cids
            .iter()
            .filter_map(|cid| book.pending(cid).map(|p| (cid.clone(), p.side, p.price)))
            .collect();
        for (cid, side, price) in &sent {
            self.note_send(OrderKind::Cancel, cid, *side, *price).await;
        }

        match self
            .trader
            .batch_cancel_order_by_id(self.account, &cids, Some(&self.symbol), self.sync)
            .await
        {
            Ok(()) => {
                debug!("Cancel requested for {:?}", cids);
                for cid in &cids {
                    book.mark_cancel_requested(cid);
                }
                cids.len()
            }
            Err(e) => {
                warn!("Cancel of {:?} failed, orders stay working: {}", cids, e);
                for (cid, _, price) in &sent {
                    self.forget_send(OrderKind::Cancel, cid, *price).await;
                }
                0
            }
        }
    }

    /// Venue confirmed cancel or reject: release the in-flight order and give
    /// its index back to the grid
    ///
    /// An order from the current epoch is rested again as it was. One from a
    /// superseded epoch held its index while the new grid was seeded, so the
    /// index gets the current grid's seed order instead, unless the grid is
    /// still waiting to be repopulated or the index is already resting.
    pub fn on_canceled(&self, book: &mut GridBook, cid: &str) -> bool {
        let Some((pending, grid_order)) = book.untrack(cid) else {
            return false;
        };
        let index = grid_order.grid_index;
        let epoch = grid_order.epoch;
        let replacement = if epoch == book.grid.epoch() {
            Some(grid_order)
        } else if book.resting(index).is_some() {
            None
        } else {
            book.grid.seed_order(index)
        };
        let Some(order) = replacement else {
            debug!(
                "Canceled {} from epoch {}, index {} left as is",
                cid, epoch, index
            );
            return false;
        };
        book.hysteresis.reset(index);
        let returned = book.rest(order);
        debug!(
            "Canceled {} (filled {}), index {} returned={}",
            cid, pending.filled, index, returned
        );
        returned
    }
}
