//! Core data types exchanged with the host runtime and the order gateway

use serde::{Deserialize, Serialize};

/// Index of a trading account known to the host (hedge leg, maker leg, ...)
pub type AccountId = u32;

/// Venue-assigned or client-assigned order identifier returned on acknowledgement
pub type OrderId = String;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that offsets this one
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Time-in-force attached to limit orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till canceled
    #[serde(rename = "GTC")]
    Gtc,
    /// Rejected by the venue if it would take liquidity
    #[serde(rename = "PO")]
    PostOnly,
    /// Immediate or cancel
    #[serde(rename = "IOC")]
    Ioc,
}

/// Order request handed to a [`Trader`](crate::trader::Trader)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client order id, unique for the lifetime of the process
    pub cid: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub amount: f64,
    /// Limit price (absent for market orders)
    pub price: Option<f64>,
    pub time_in_force: Option<TimeInForce>,
}

impl OrderRequest {
    /// Limit order with an explicit time-in-force
    pub fn limit(
        cid: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        amount: f64,
        price: f64,
        tif: TimeInForce,
    ) -> Self {
        Self {
            cid: cid.into(),
            symbol: symbol.into(),
            order_type: OrderType::Limit,
            side,
            amount,
            price: Some(price),
            time_in_force: Some(tif),
        }
    }

    /// Market order
    pub fn market(cid: impl Into<String>, symbol: impl Into<String>, side: Side, amount: f64) -> Self {
        Self {
            cid: cid.into(),
            symbol: symbol.into(),
            order_type: OrderType::Market,
            side,
            amount,
            price: None,
            time_in_force: None,
        }
    }

    /// Basic sanity check before the request leaves the process
    pub fn is_valid(&self) -> bool {
        let price_ok = match self.order_type {
            OrderType::Limit => self.price.map(|p| p > 0.0).unwrap_or(false),
            OrderType::Market => true,
        };
        !self.cid.is_empty() && self.amount > 0.0 && price_ok
    }
}

/// Order status reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    /// Order can no longer fill
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// Order event delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub cid: String,
    pub symbol: String,
    pub side: Side,
    /// Order limit price
    pub price: f64,
    pub amount: f64,
    /// Cumulative filled quantity
    #[serde(default)]
    pub filled: f64,
    /// Average fill price, when the venue reports one
    #[serde(default)]
    pub avg_price: Option<f64>,
    pub status: OrderStatus,
    /// Venue timestamp in milliseconds
    pub timestamp: u64,
}

impl OrderUpdate {
    /// Best available execution price for the filled part
    pub fn deal_price(&self) -> f64 {
        self.avg_price.filter(|p| *p > 0.0).unwrap_or(self.price)
    }
}

/// Best bid/offer snapshot for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bbo {
    pub symbol: String,
    pub bid_price: f64,
    pub ask_price: f64,
    /// Venue timestamp in milliseconds
    pub timestamp: u64,
}

impl Bbo {
    pub fn new(symbol: impl Into<String>, bid_price: f64, ask_price: f64, timestamp: u64) -> Self {
        Self {
            symbol: symbol.into(),
            bid_price,
            ask_price,
            timestamp,
        }
    }

    pub fn has_positive_prices(&self) -> bool {
        self.bid_price > 0.0 && self.ask_price > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

/// Position snapshot delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub amount: f64,
}

impl Position {
    /// Side of the market order that closes this position
    pub fn closing_side(&self) -> Side {
        match self.side {
            PositionSide::Long => Side::Sell,
            PositionSide::Short => Side::Buy,
        }
    }
}

/// Feed kinds a strategy can subscribe to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "symbols", rename_all = "lowercase")]
pub enum Channel {
    Bbo(Vec<String>),
    Order(Vec<String>),
    Position(Vec<String>),
}

/// Subscription request for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub account_id: AccountId,
    pub channels: Vec<Channel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Buy.to_string(), "buy");
    }

    #[test]
    fn test_order_request_validity() {
        let order = OrderRequest::limit("c1", "BTC_USDT", Side::Buy, 0.01, 50000.0, TimeInForce::Gtc);
        assert!(order.is_valid());

        let order = OrderRequest::limit("c1", "BTC_USDT", Side::Buy, 0.0, 50000.0, TimeInForce::Gtc);
        assert!(!order.is_valid());

        let order = OrderRequest::limit("", "BTC_USDT", Side::Buy, 0.01, 50000.0, TimeInForce::Gtc);
        assert!(!order.is_valid());

        let order = OrderRequest::market("c2", "BTC_USDT", Side::Sell, 0.01);
        assert!(order.is_valid());
        assert_eq!(order.price, None);
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_deal_price_prefers_average() {
        let mut update = OrderUpdate {
            cid: "c1".into(),
            symbol: "BTC_USDT".into(),
            side: Side::Buy,
            price: 100.0,
            amount: 1.0,
            filled: 1.0,
            avg_price: Some(99.5),
            status: OrderStatus::Filled,
            timestamp: 0,
        };
        assert_eq!(update.deal_price(), 99.5);
        update.avg_price = Some(0.0);
        assert_eq!(update.deal_price(), 100.0);
        update.avg_price = None;
        assert_eq!(update.deal_price(), 100.0);
    }

    #[test]
    fn test_order_update_from_json() {
        let json = r#"{"cid":"c9","symbol":"BTC-2025","side":"sell","price":101.0,
            "amount":0.008,"filled":0.004,"status":"partially_filled","timestamp":1700000000000}"#;
        let update: OrderUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.status, OrderStatus::PartiallyFilled);
        assert_eq!(update.side, Side::Sell);
        assert_eq!(update.avg_price, None);
    }

    #[test]
    fn test_position_closing_side() {
        let pos = Position {
            symbol: "BTC_USDT".into(),
            side: PositionSide::Long,
            amount: 0.1,
        };
        assert_eq!(pos.closing_side(), Side::Sell);
    }
}
