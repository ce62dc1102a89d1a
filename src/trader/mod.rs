//! Outbound order gateway
//!
//! The strategy never talks to a venue directly: every order action goes
//! through a [`Trader`], which the host supplies. [`DryRunTrader`] logs and
//! acknowledges everything; [`mock::MockTrader`] records calls for tests.

pub mod dry_run;

use async_trait::async_trait;

use crate::grid::errors::TradeResult;
use crate::market::{AccountId, OrderId, OrderRequest};

pub use dry_run::DryRunTrader;

/// Order actions against a venue account
#[async_trait]
pub trait Trader: Send + Sync {
    /// Client order id, unique for the lifetime of the process
    fn create_cid(&self, exchange: &str) -> String;

    /// Submit a new order; `sync` waits for the venue acknowledgement
    async fn place_order(
        &self,
        account: AccountId,
        order: &OrderRequest,
        sync: bool,
    ) -> TradeResult<OrderId>;

    /// Replace price/amount of a live order identified by `order.cid`
    async fn amend_order(
        &self,
        account: AccountId,
        order: &OrderRequest,
        sync: bool,
    ) -> TradeResult<OrderId>;

    /// Cancel a set of live orders by client id
    async fn batch_cancel_order_by_id(
        &self,
        account: AccountId,
        cids: &[String],
        symbol: Option<&str>,
        sync: bool,
    ) -> TradeResult<()>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mock {
    use super::*;
    use crate::grid::errors::TradeError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Cancel request captured by [`MockTrader`]
    #[derive(Debug, Clone, PartialEq)]
    pub struct CancelCall {
        pub account: AccountId,
        pub cids: Vec<String>,
        pub symbol: Option<String>,
    }

    /// Records every call; failures can be queued per action
    pub struct MockTrader {
        pub placed: Arc<Mutex<Vec<(AccountId, OrderRequest)>>>,
        pub amended: Arc<Mutex<Vec<(AccountId, OrderRequest)>>>,
        pub canceled: Arc<Mutex<Vec<CancelCall>>>,
        next_cid: AtomicU64,
        place_failures: Arc<Mutex<u32>>,
        amend_failures: Arc<Mutex<u32>>,
        cancel_failures: Arc<Mutex<u32>>,
    }

    impl MockTrader {
        pub fn new() -> Self {
            Self {
                placed: Arc::new(Mutex::new(Vec::new())),
                amended: Arc::new(Mutex::new(Vec::new())),
                canceled: Arc::new(Mutex::new(Vec::new())),
                next_cid: AtomicU64::new(1),
                place_failures: Arc::new(Mutex::new(0)),
                amend_failures: Arc::new(Mutex::new(0)),
                cancel_failures: Arc::new(Mutex::new(0)),
            }
        }

        /// Fail the next `n` placements with [`TradeError::Transport`]
        pub async fn fail_next_places(&self, n: u32) {
            *self.place_failures.lock().await = n;
        }

        pub async fn fail_next_amends(&self, n: u32) {
            *self.amend_failures.lock().await = n;
        }

        pub async fn fail_next_cancels(&self, n: u32) {
            *self.cancel_failures.lock().await = n;
        }

        pub async fn placed_on(&self, account: AccountId) -> Vec<OrderRequest> {
            self.placed
                .lock()
                .await
                .iter()
                .filter(|(a, _)| *a == account)
                .map(|(_, o)| o.clone())
                .collect()
        }

        pub async fn canceled_cids(&self) -> Vec<String> {
            self.canceled
                .lock()
                .await
                .iter()
                .flat_map(|c| c.cids.clone())
                .collect()
        }

        async fn take_failure(counter: &Mutex<u32>) -> bool {
            let mut remaining = counter.lock().await;
            if *remaining > 0 {
                *remaining -= 1;
                true
            } else {
                false
            }
        }
    }

    impl Default for MockTrader {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Trader for MockTrader {
        fn create_cid(&self, _exchange: &str) -> String {
            format!("cid-{}", self.next_cid.fetch_add(1, Ordering::SeqCst))
        }

        async fn place_order(
            &self,
            account: AccountId,
            order: &OrderRequest,
            _sync: bool,
        ) -> TradeResult<OrderId> {
            if Self::take_failure(&self.place_failures).await {
                return Err(TradeError::Transport("Mock failure".into()));
            }
            self.placed.lock().await.push((account, order.clone()));
            Ok(order.cid.clone())
        }

        async fn amend_order(
            &self,
            account: AccountId,
            order: &OrderRequest,
            _sync: bool,
        ) -> TradeResult<OrderId> {
            if Self::take_failure(&self.amend_failures).await {
                return Err(TradeError::Transport("Mock failure".into()));
            }
            self.amended.lock().await.push((account, order.clone()));
            Ok(order.cid.clone())
        }

        async fn batch_cancel_order_by_id(
            &self,
            account: AccountId,
            cids: &[String],
            symbol: Option<&str>,
            _sync: bool,
        ) -> TradeResult<()> {
            if Self::take_failure(&self.cancel_failures).await {
                return Err(TradeError::Transport("Mock failure".into()));
            }
            self.canceled.lock().await.push(CancelCall {
                account,
                cids: cids.to_vec(),
                symbol: symbol.map(str::to_string),
            });
            Ok(())
        }
    }
}
