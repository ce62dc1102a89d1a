//! Strategy trait definition

use async_trait::async_trait;

use crate::grid::GridResult;
use crate::market::{Bbo, OrderUpdate, Position, Subscription};

/// Callback interface between the host runtime and trading logic
///
/// The host owns connectivity and scheduling. It asks the strategy what to
/// subscribe to, calls [`start`](Strategy::start) once, then pushes market
/// data and order/position events, possibly from several tasks at once.
/// All callbacks take `&self`; implementations guard their own state.
///
/// # Lifecycle
///
/// 1. `subscribes()` - feeds to open, per account
/// 2. `start()` - one-off readiness check
/// 3. `on_bbo` / `on_order` / `on_position` - concurrently, for the session
/// 4. `on_stop()` - cancel what is working and flush
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn subscribes(&self) -> Vec<Subscription>;

    async fn start(&self) -> GridResult<()>;

    async fn on_bbo(&self, exchange: &str, bbo: &Bbo);

    async fn on_order(&self, exchange: &str, update: &OrderUpdate);

    async fn on_position(&self, exchange: &str, position: &Position);

    async fn on_stop(&self);
}
