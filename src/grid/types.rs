//! Core data types for grid trading

use serde::{Deserialize, Serialize};

use crate::helpers::EPSILON;
use crate::market::{Side, TimeInForce};

/// One rung of the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub index: usize,
    pub price: f64,
}

/// Synthetic spread prices derived from the two legs' BBOs
///
/// `buy_price` is what it costs to buy the spread (lift the spot ask, sell the
/// future at its ask), `sell_price` what selling it yields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadQuote {
    pub buy_price: f64,
    pub sell_price: f64,
    pub middle: f64,
}

impl SpreadQuote {
    pub fn new(buy_price: f64, sell_price: f64) -> Self {
        Self {
            buy_price,
            sell_price,
            middle: (buy_price + sell_price) / 2.0,
        }
    }
}

/// A resting grid intention that has not been sent yet
///
/// `side` is the spread direction: a `Buy` rung buys spot and sells the future.
/// `maker_price`/`taker_price` are snapshots taken when the rung is armed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridOrder {
    pub grid_index: usize,
    pub price: f64,
    pub amount: f64,
    pub side: Side,
    /// Grid generation this rung belongs to
    pub epoch: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maker_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taker_price: Option<f64>,
}

impl GridOrder {
    pub fn new(grid_index: usize, price: f64, amount: f64, side: Side, epoch: u64) -> Self {
        Self {
            grid_index,
            price,
            amount,
            side,
            epoch,
            maker_price: None,
            taker_price: None,
        }
    }

    /// Side of the maker order on the future leg
    pub fn maker_side(&self) -> Side {
        self.side.opposite()
    }

    /// Record the maker quote and the taker reference used for this rung
    pub fn arm(&mut self, maker_price: f64, taker_price: f64) {
        self.maker_price = Some(maker_price);
        self.taker_price = Some(taker_price);
    }

    /// Drop execution snapshots before the rung goes back to the grid
    pub fn disarm(&mut self) {
        self.maker_price = None;
        self.taker_price = None;
    }

    /// Grid condition: the synthetic price is on the profitable side of this rung
    pub fn still_valid(&self, quote: &SpreadQuote) -> bool {
        match self.side {
            Side::Buy => self.price >= quote.buy_price,
            Side::Sell => self.price <= quote.sell_price,
        }
    }

    /// Grid condition with an extra `margin` of edge, used to count hysteresis ticks
    pub fn is_favorable(&self, quote: &SpreadQuote, margin: f64) -> bool {
        match self.side {
            Side::Buy => self.price - margin >= quote.buy_price,
            Side::Sell => self.price + margin <= quote.sell_price,
        }
    }
}

/// Lifecycle of a submitted order from the strategy's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingState {
    /// Live at the venue, eligible for amend or cancel
    Working,
    /// Cancel sent; waiting for the venue to confirm
    CancelRequested,
}

/// An order that has been submitted to the maker venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub cid: String,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub time_in_force: TimeInForce,
    /// Cumulative quantity filled so far
    pub filled: f64,
    /// Quantity already covered by hedge orders
    pub hedged: f64,
    pub state: PendingState,
}

impl PendingOrder {
    pub fn new(
        cid: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        price: f64,
        amount: f64,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            cid: cid.into(),
            symbol: symbol.into(),
            side,
            price,
            amount,
            time_in_force,
            filled: 0.0,
            hedged: 0.0,
            state: PendingState::Working,
        }
    }

    pub fn is_working(&self) -> bool {
        self.state == PendingState::Working
    }

    /// Record a cumulative fill and return the quantity that still needs a hedge
    pub fn apply_fill(&mut self, cumulative_filled: f64) -> f64 {
        if cumulative_filled > self.filled {
            self.filled = cumulative_filled;
        }
        let unhedged = self.filled - self.hedged;
        if unhedged > EPSILON {
            self.hedged = self.filled;
            unhedged
        } else {
            0.0
        }
    }
}
