//! Strategy Module
//!
//! Host-facing trading logic.
//!
//! # Architecture
//!
//! - [`Strategy`] - callback trait the host drives (`on_bbo`, `on_order`, ...)
//! - [`SpreadGridStrategy`] - spot/future spread grid with hedged maker fills
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use spread_grid_arb::{SpreadGridStrategy, StrategyConfig, DryRunTrader, Strategy};
//!
//! let config = StrategyConfig::new("BTC_USDT", "BTC_USDT_251226");
//! let strategy = Arc::new(SpreadGridStrategy::new(config, Arc::new(DryRunTrader::new()))?);
//! strategy.start().await?;
//! // host pushes events:
//! strategy.on_bbo("spot", &bbo).await;
//! ```

pub mod grid_arb;
pub mod traits;

pub use grid_arb::{SpreadGridStrategy, TickOutcome, TickReport};
pub use traits::Strategy;
