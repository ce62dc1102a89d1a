#![deny(unreachable_pub)]
pub mod config;
pub mod grid;
pub mod helpers;
pub mod market;
pub mod strategy;
pub mod telemetry;
pub mod trader;

pub use config::{LogConfig, Settings};
pub use grid::{GridError, GridResult, StrategyConfig, TradeError};
pub use helpers::{bps_diff, round_to_decimals, LogThrottle};
pub use market::{Bbo, OrderRequest, OrderStatus, OrderUpdate, Position, Side, Subscription};
pub use strategy::{SpreadGridStrategy, Strategy, TickOutcome};
pub use telemetry::Telemetry;
pub use trader::{DryRunTrader, Trader};
