//! Spread Grid Module
//!
//! Building blocks of the spot/future spread grid. The strategy layer composes
//! them; each can be used and tested on its own.
//!
//! # Architecture
//!
//! - [`config`] - Strategy configuration and validation
//! - [`types`] - Core data types (GridOrder, PendingOrder, SpreadQuote, ...)
//! - [`errors`] - Grid and order-gateway error types
//! - [`signal`] - Synthetic spread prices, EWMAs, freshness and anomaly filters
//! - [`levels`] - Grid level calculation, seeding and re-centering
//! - [`hysteresis`] - Per-level debounce before submission
//! - [`book`] - Shared resting/in-flight tables
//! - [`lock`] - Timed mutex guarding the book
//! - [`reconciler`] - Amend/cancel/submit decisions for maker orders
//! - [`hedge`] - Opposite-leg hedging with retry
//!
//! # Testing
//!
//! Order actions go through [`Trader`](crate::trader::Trader), so the whole
//! pipeline runs against a recording mock:
//!
//! ```rust,ignore
//! use spread_grid_arb::trader::mock::MockTrader;
//!
//! let trader = Arc::new(MockTrader::new());
//! let (telemetry, records) = Telemetry::in_memory(100, 1);
//! let reconciler = OrderReconciler::new(trader.clone(), Arc::new(telemetry), &config);
//! // drive ticks, then inspect trader.placed / trader.canceled
//! ```

pub mod book;
pub mod config;
pub mod errors;
pub mod hedge;
pub mod hysteresis;
pub mod levels;
pub mod lock;
pub mod reconciler;
pub mod signal;
pub mod types;

// Re-export commonly used types
pub use book::GridBook;
pub use config::{
    ExecutionConfig, GridParams, HedgeConfig, PairsConfig, SignalConfig, StrategyConfig,
    TelemetryConfig,
};
pub use errors::{GridError, GridResult, TradeError, TradeResult};
pub use hedge::{HedgeExecutor, HedgeOutcome};
pub use hysteresis::HysteresisTable;
pub use levels::{GridManager, RecenterPlan};
pub use lock::TimedMutex;
pub use reconciler::{OrderReconciler, ReconcileReport};
pub use signal::{EwmState, PriceSignal, SignalUpdate, TickRejection};
pub use types::{GridLevel, GridOrder, PendingOrder, PendingState, SpreadQuote};
