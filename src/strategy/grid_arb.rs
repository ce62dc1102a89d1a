//! Spot/future spread grid with hedged maker fills
//!
//! Every accepted tick runs: freshness and anomaly filters, grid
//! initialization, re-pricing of in-flight maker orders, re-centering on a
//! regime shift, then hysteresis-gated submission of resting grid orders.
//! Maker fills are hedged on the spot leg immediately; the filled rung is
//! replaced by the next one further out.
//!
//! A tick that cannot get the book lock in time is dropped, since the next
//! tick carries fresher prices. Order events are never dropped: they wait for
//! the lock one timeout at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, error, info, warn, Level};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::grid::book::GridBook;
use crate::grid::config::StrategyConfig;
use crate::grid::errors::GridResult;
use crate::grid::hedge::{HedgeExecutor, HedgeOutcome};
use crate::grid::lock::TimedMutex;
use crate::grid::reconciler::{OrderReconciler, ReconcileReport};
use crate::grid::signal::{PriceSignal, SignalUpdate, TickRejection};
use crate::grid::types::GridOrder;
use crate::helpers::{now_millis, LogThrottle};
use crate::market::{Bbo, Channel, OrderStatus, OrderUpdate, Position, Side, Subscription};
use crate::telemetry::{DealContext, FillKind, OrderKind, Telemetry};
use crate::trader::Trader;

use super::traits::Strategy;

const STRATEGY_NAME: &str = "spread_grid_arb";
const WARN_INTERVAL: Duration = Duration::from_secs(10);

/// What a single BBO callback did, mainly for tests and debugging
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not every tracked symbol has a BBO yet (or the symbol is not tracked)
    Waiting,
    /// Dropped by the freshness or price filter
    Rejected(TickRejection),
    /// Dropped by the anomaly filter
    Anomalous,
    /// First accepted observation seeded the averages
    SignalInitialized,
    /// The grid book lock could not be acquired in time
    Abandoned,
    Processed(TickReport),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub grid_initialized: bool,
    /// `Some(repopulated)` when the grid was re-centered this tick
    pub recentered: Option<bool>,
    /// A grid left empty by an earlier re-center was seeded this tick
    pub repopulated: bool,
    pub amended: usize,
    pub canceled: usize,
    pub submitted: usize,
}

pub struct SpreadGridStrategy {
    config: StrategyConfig,
    bbos: RwLock<HashMap<String, Bbo>>,
    positions: RwLock<HashMap<String, Position>>,
    signal: Mutex<PriceSignal>,
    book: TimedMutex<GridBook>,
    reconciler: OrderReconciler,
    hedger: HedgeExecutor,
    telemetry: Arc<Telemetry>,
    throttle: LogThrottle,
    hedge_tasks: Mutex<Vec<JoinHandle<HedgeOutcome>>>,
}

impl SpreadGridStrategy {
    /// Build with telemetry persisted as configured
    pub fn new(config: StrategyConfig, trader: Arc<dyn Trader>) -> GridResult<Self> {
        config.validate()?;
        let telemetry = Arc::new(Telemetry::from_config(&config.telemetry)?);
        Self::with_telemetry(config, trader, telemetry)
    }

    pub fn with_telemetry(
        config: StrategyConfig,
        trader: Arc<dyn Trader>,
        telemetry: Arc<Telemetry>,
    ) -> GridResult<Self> {
        config.validate()?;
        Ok(Self {
            bbos: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            signal: Mutex::new(PriceSignal::new(&config.signal)),
            book: TimedMutex::new(
                "grid_book",
                GridBook::new(&config.grid_config),
                config.execution.lock_timeout(),
            ),
            reconciler: OrderReconciler::new(trader.clone(), telemetry.clone(), &config),
            hedger: HedgeExecutor::new(trader, &config),
            telemetry,
            throttle: LogThrottle::new(),
            hedge_tasks: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Shared grid tables
    pub fn book(&self) -> &TimedMutex<GridBook> {
        &self.book
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.read().await.get(symbol).cloned()
    }

    /// Map the maker venue's order symbol back to the market-data symbol
    fn canonical_symbol<'a>(&'a self, symbol: &'a str) -> &'a str {
        let pairs = &self.config.pairs;
        if symbol == pairs.future_order_symbol() {
            pairs.future.as_str()
        } else {
            symbol
        }
    }

    fn is_future(&self, symbol: &str) -> bool {
        self.canonical_symbol(symbol) == self.config.pairs.future
    }

    fn is_spot(&self, symbol: &str) -> bool {
        symbol == self.config.pairs.spot
    }

    fn warn_throttled(&self, tag: &str, msg: &str) {
        self.throttle.tlog(tag, Level::Warn, WARN_INTERVAL, msg);
    }

    async fn leg_bbos(&self) -> Option<(Bbo, Bbo)> {
        let bbos = self.bbos.read().await;
        let spot = bbos.get(&self.config.pairs.spot)?.clone();
        let future = bbos.get(&self.config.pairs.future)?.clone();
        Some((spot, future))
    }

    /// Full tick pipeline for one BBO update
    pub async fn process_bbo(&self, bbo: &Bbo) -> TickOutcome {
        let symbol = self.canonical_symbol(&bbo.symbol).to_string();
        if !self.is_spot(&symbol) && !self.is_future(&symbol) {
            return TickOutcome::Waiting;
        }
        {
            let mut bbos = self.bbos.write().await;
            let mut stored = bbo.clone();
            stored.symbol = symbol.clone();
            bbos.insert(symbol, stored);
        }

        let Some((spot, future)) = self.leg_bbos().await else {
            return TickOutcome::Waiting;
        };

        let accepted = {
            let mut signal = self.signal.lock().await;
            let quote = match signal.evaluate(&spot, &future) {
                Ok(q) => q,
                Err(rejection) => {
                    let msg = format!("Tick dropped: {:?}", rejection);
                    self.warn_throttled("tick_rejected", &msg);
                    return TickOutcome::Rejected(rejection);
                }
            };
            match signal.observe(quote.middle) {
                SignalUpdate::Initialized(state) => {
                    info!(
                        "Signal initialized at {:.6} (buy {:.6} sell {:.6})",
                        state.long, quote.buy_price, quote.sell_price
                    );
                    return TickOutcome::SignalInitialized;
                }
                SignalUpdate::Anomalous { price, short } => {
                    let msg = format!("Anomalous spread {:.6} vs short EWMA {:.6}", price, short);
                    self.warn_throttled("anomaly", &msg);
                    return TickOutcome::Anomalous;
                }
                SignalUpdate::Updated(state) => (quote, state),
            }
        };
        let (quote, ewm) = accepted;

        let Ok(mut book) = self.book.lock().await else {
            return TickOutcome::Abandoned;
        };
        let mut report = TickReport::default();
        let mut sent = ReconcileReport::default();

        if !book.grid.is_initialized() {
            let orders = book.grid.initialize(quote.middle);
            book.seed(orders);
            report.grid_initialized = true;
        }

        sent.merge(
            self.reconciler
                .reprice_pending(&mut book, &quote, &future, &spot)
                .await,
        );

        if book.grid.needs_recenter(ewm.long) {
            sent.merge(self.reconciler.cancel_all(&mut book).await);
            self.flatten_spot().await;
            book.clear_resting();
            let plan = book.grid.recenter(ewm.long);
            book.hysteresis.reset_all();
            if plan.repopulate {
                book.seed(plan.orders);
            } else {
                warn!(
                    "Fair value jumped {:.6} -> {:.6}; grid left empty until the move settles",
                    plan.previous_base, plan.new_base
                );
            }
            report.recentered = Some(plan.repopulate);
        } else if book.grid.settled(ewm.long) {
            let orders = book.grid.repopulate();
            let rested = book.seed(orders);
            book.hysteresis.reset_all();
            debug!("Rested {} grid orders after the move settled", rested);
            report.repopulated = true;
        }

        sent.merge(
            self.reconciler
                .trigger_grid_orders(&mut book, &quote, &future, &spot)
                .await,
        );
        drop(book);

        report.amended = sent.amended;
        report.canceled = sent.canceled;
        report.submitted = sent.submitted;
        TickOutcome::Processed(report)
    }

    /// Close the cached spot position at market and forget it
    async fn flatten_spot(&self) {
        let Some(position) = self.position(&self.config.pairs.spot).await else {
            return;
        };
        match self.hedger.flatten(&position).await {
            Ok(_) => {
                self.positions.write().await.remove(&self.config.pairs.spot);
            }
            Err(e) => error!("Failed to flatten {}: {}", position.symbol, e),
        }
    }

    /// Send a hedge for `amount` and register its telemetry context
    async fn hedge(&self, side: Side, amount: f64, reference: f64, deal: Option<DealContext>) {
        let order = self.hedger.build_order(side, amount, reference);
        let sent_at = now_millis();
        info!(
            "Hedging {} {} {} @ {:?} (reference {})",
            order.cid, side, amount, order.price, reference
        );
        if let Some(price) = order.price {
            self.telemetry
                .latency
                .lock()
                .await
                .record_send(OrderKind::Place, &order.cid, price, sent_at);
        }
        self.telemetry
            .slippage
            .lock()
            .await
            .register(&order.cid, FillKind::Hedge, side, reference);
        if let Some(ctx) = deal {
            self.telemetry.deal_price.lock().await.register(&order.cid, ctx);
        }

        let handle = self.hedger.submit(order);
        let mut tasks = self.hedge_tasks.lock().await;
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    async fn hedge_grid_fill(&self, grid_order: &GridOrder, amount: f64, future_deal_price: f64) {
        let reference = match grid_order.taker_price {
            Some(p) => p,
            None => match self.leg_bbos().await {
                Some((spot, _)) => HedgeExecutor::reference_price(grid_order.side, &spot),
                None => {
                    error!("No spot BBO to price hedge for grid {}", grid_order.grid_index);
                    return;
                }
            },
        };
        let deal = DealContext {
            grid_side: grid_order.side,
            grid_price: grid_order.price,
            future_deal_price,
            amount,
        };
        self.hedge(grid_order.side, amount, reference, Some(deal)).await;
    }

    async fn handle_maker_update(&self, update: &OrderUpdate) {
        let mut book = self.book.lock_retrying().await;

        if book.is_retired(&update.cid) {
            debug!("Ignoring {:?} for retired order {}", update.status, update.cid);
            return;
        }

        let Some(grid_order) = book.grid_order_for(&update.cid).cloned() else {
            if update.status == OrderStatus::Filled && update.filled > 0.0 {
                book.retire(&update.cid);
                drop(book);
                self.hedge_unknown_fill(update).await;
            }
            return;
        };

        let unhedged = book
            .pending_mut(&update.cid)
            .map(|p| p.apply_fill(update.filled))
            .unwrap_or(0.0);
        if unhedged > 0.0 {
            self.hedge_grid_fill(&grid_order, unhedged, update.deal_price())
                .await;
        }

        match update.status {
            OrderStatus::Open | OrderStatus::PartiallyFilled => {}
            OrderStatus::Filled => {
                book.untrack(&update.cid);
                match book.grid.next_rung(&grid_order) {
                    Some(next) => {
                        let index = next.grid_index;
                        if book.rest(next) {
                            book.hysteresis.reset(index);
                            debug!("Grid {} filled, rested next rung at {}", grid_order.grid_index, index);
                        } else {
                            debug!("Next rung at {} is in flight, skipping", index);
                        }
                    }
                    None => debug!("Grid {} filled at the edge", grid_order.grid_index),
                }
                drop(book);
                if let Err(e) = self.telemetry.slippage.lock().await.on_fill(
                    &update.cid,
                    update.deal_price(),
                    update.filled,
                    update.timestamp,
                ) {
                    warn!("Slippage telemetry write failed: {}", e);
                }
            }
            OrderStatus::Canceled | OrderStatus::Rejected => {
                self.reconciler.on_canceled(&mut book, &update.cid);
            }
        }
    }

    /// Fill for an order the book does not know: hedge it in full from the live BBO
    async fn hedge_unknown_fill(&self, update: &OrderUpdate) {
        let side = update.side.opposite();
        warn!(
            "Fill for unknown maker order {} ({} {}), hedging from live BBO",
            update.cid, update.side, update.filled
        );
        let Some((spot, _)) = self.leg_bbos().await else {
            error!("No spot BBO to price hedge for {}", update.cid);
            return;
        };
        let reference = HedgeExecutor::reference_price(side, &spot);
        self.hedge(side, update.filled, reference, None).await;
    }

    async fn handle_hedge_update(&self, update: &OrderUpdate) {
        if update.status != OrderStatus::Filled {
            if update.status.is_terminal() {
                error!(
                    "Hedge {} ended {:?} with {} of {} filled",
                    update.cid, update.status, update.filled, update.amount
                );
            }
            return;
        }
        let price = update.deal_price();
        info!("Hedge {} filled {} @ {}", update.cid, update.filled, price);
        if let Err(e) = self.telemetry.slippage.lock().await.on_fill(
            &update.cid,
            price,
            update.filled,
            update.timestamp,
        ) {
            warn!("Slippage telemetry write failed: {}", e);
        }
        match self
            .telemetry
            .deal_price
            .lock()
            .await
            .on_hedge_fill(&update.cid, price, update.timestamp)
        {
            Ok(Some(rec)) => debug!(
                "Grid {} @ {:.6} realised {:.6}",
                rec.grid_side, rec.grid_expected_price, rec.grid_actual_price
            ),
            Ok(None) => {}
            Err(e) => warn!("Deal price telemetry write failed: {}", e),
        }
    }

    /// Await every outstanding hedge task
    pub async fn wait_for_hedges(&self) -> Vec<HedgeOutcome> {
        let handles: Vec<_> = self.hedge_tasks.lock().await.drain(..).collect();
        join_all(handles)
            .await
            .into_iter()
            .filter_map(|r| match r {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!("Hedge task failed: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl Strategy for SpreadGridStrategy {
    fn name(&self) -> &str {
        STRATEGY_NAME
    }

    fn subscribes(&self) -> Vec<Subscription> {
        let pairs = &self.config.pairs;
        let exec = &self.config.execution;
        let order_symbol = pairs.future_order_symbol().to_string();
        vec![
            Subscription {
                account_id: exec.hedge_account,
                channels: vec![
                    Channel::Bbo(vec![pairs.spot.clone(), pairs.future.clone()]),
                    Channel::Order(vec![pairs.spot.clone()]),
                    Channel::Position(vec![pairs.spot.clone()]),
                ],
            },
            Subscription {
                account_id: exec.maker_account,
                channels: vec![
                    Channel::Order(vec![order_symbol.clone()]),
                    Channel::Position(vec![order_symbol]),
                ],
            },
        ]
    }

    async fn start(&self) -> GridResult<()> {
        self.config.validate()?;
        let grid = &self.config.grid_config;
        info!(
            "Starting {}: spot={} future={} (orders on {}) interval={} levels={} amount={} min_signals={}",
            STRATEGY_NAME,
            self.config.pairs.spot,
            self.config.pairs.future,
            self.config.pairs.future_order_symbol(),
            grid.grid_interval,
            2 * grid.grid_num + 1,
            grid.trade_amount,
            grid.continuous_open_signal_min_num
        );
        Ok(())
    }

    async fn on_bbo(&self, _exchange: &str, bbo: &Bbo) {
        let outcome = self.process_bbo(bbo).await;
        debug!("Tick {}: {:?}", bbo.symbol, outcome);
    }

    async fn on_order(&self, exchange: &str, update: &OrderUpdate) {
        let symbol = self.canonical_symbol(&update.symbol).to_string();

        if let Err(e) = self.telemetry.latency.lock().await.on_update(update) {
            warn!("Latency telemetry write failed: {}", e);
        }

        if self.is_future(&symbol) {
            self.handle_maker_update(update).await;
        } else if self.is_spot(&symbol) {
            self.handle_hedge_update(update).await;
        } else {
            debug!("Ignoring order event for {} from {}", update.symbol, exchange);
        }
    }

    async fn on_position(&self, _exchange: &str, position: &Position) {
        let symbol = self.canonical_symbol(&position.symbol).to_string();
        let mut stored = position.clone();
        stored.symbol = symbol.clone();
        self.positions.write().await.insert(symbol, stored);
    }

    async fn on_stop(&self) {
        info!("Stopping {}", STRATEGY_NAME);
        match self.book.lock().await {
            Ok(mut book) => {
                let report = self.reconciler.cancel_all(&mut book).await;
                drop(book);
                info!("Requested cancel of {} working order(s)", report.canceled);
            }
            Err(e) => error!("Could not cancel working orders on stop: {}", e),
        }

        let outcomes = self.wait_for_hedges().await;
        info!("{} hedge(s) settled", outcomes.len());

        if let Err(e) = self.telemetry.force_flush().await {
            error!("Telemetry flush failed: {}", e);
        }
    }
}
