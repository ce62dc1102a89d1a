//! Shared grid tables: resting grid orders, in-flight orders and their mapping
//!
//! A grid index is owned by at most one of the resting table or an in-flight
//! order. The pending table and the cid mapping always change together.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use super::config::GridParams;
use super::hysteresis::HysteresisTable;
use super::levels::GridManager;
use super::types::{GridOrder, PendingOrder, PendingState};

const RETIRED_CID_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct GridBook {
    pub grid: GridManager,
    pub hysteresis: HysteresisTable,
    grid_orders: BTreeMap<usize, GridOrder>,
    pending: HashMap<String, PendingOrder>,
    cid_to_grid: HashMap<String, GridOrder>,
    retired: VecDeque<String>,
    retired_set: HashSet<String>,
}

impl GridBook {
    pub fn new(params: &GridParams) -> Self {
        Self {
            grid: GridManager::new(params),
            hysteresis: HysteresisTable::new(
                params.continuous_open_signal_min_num,
                params.signal_decay,
            ),
            grid_orders: BTreeMap::new(),
            pending: HashMap::new(),
            cid_to_grid: HashMap::new(),
            retired: VecDeque::new(),
            retired_set: HashSet::new(),
        }
    }

    // ---- resting grid orders ----

    /// Rest every order whose index is not held by an in-flight order; returns how many were rested
    pub fn seed(&mut self, orders: Vec<GridOrder>) -> usize {
        let mut rested = 0;
        for order in orders {
            if self.rest(order) {
                rested += 1;
            }
        }
        rested
    }

    /// Rest `order` at its index, replacing a resting order there. Refused when
    /// an in-flight order owns the index.
    pub fn rest(&mut self, mut order: GridOrder) -> bool {
        if self.owned_by_pending(order.grid_index) {
            return false;
        }
        order.disarm();
        self.grid_orders.insert(order.grid_index, order);
        true
    }

    pub fn take_resting(&mut self, index: usize) -> Option<GridOrder> {
        self.grid_orders.remove(&index)
    }

    pub fn resting(&self, index: usize) -> Option<&GridOrder> {
        self.grid_orders.get(&index)
    }

    pub fn resting_orders(&self) -> impl Iterator<Item = &GridOrder> {
        self.grid_orders.values()
    }

    pub fn resting_indices(&self) -> Vec<usize> {
        self.grid_orders.keys().copied().collect()
    }

    pub fn clear_resting(&mut self) {
        self.grid_orders.clear();
    }

    // ---- in-flight orders ----

    /// Register a submitted order together with the grid order it came from
    pub fn track(&mut self, pending: PendingOrder, grid_order: GridOrder) {
        self.cid_to_grid.insert(pending.cid.clone(), grid_order);
        self.pending.insert(pending.cid.clone(), pending);
    }

    /// Remove an in-flight order and its mapping; the cid is retired
    pub fn untrack(&mut self, cid: &str) -> Option<(PendingOrder, GridOrder)> {
        let pending = self.pending.remove(cid);
        let grid_order = self.cid_to_grid.remove(cid);
        self.retire(cid);
        pending.zip(grid_order)
    }

    pub fn pending(&self, cid: &str) -> Option<&PendingOrder> {
        self.pending.get(cid)
    }

    pub fn pending_mut(&mut self, cid: &str) -> Option<&mut PendingOrder> {
        self.pending.get_mut(cid)
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &PendingOrder> {
        self.pending.values()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Cids of orders that are live and not already being canceled
    pub fn working_cids(&self) -> Vec<String> {
        let mut cids: Vec<String> = self
            .pending
            .values()
            .filter(|p| p.is_working())
            .map(|p| p.cid.clone())
            .collect();
        cids.sort();
        cids
    }

    pub fn grid_order_for(&self, cid: &str) -> Option<&GridOrder> {
        self.cid_to_grid.get(cid)
    }

    pub fn grid_order_for_mut(&mut self, cid: &str) -> Option<&mut GridOrder> {
        self.cid_to_grid.get_mut(cid)
    }

    pub fn mark_cancel_requested(&mut self, cid: &str) {
        if let Some(p) = self.pending.get_mut(cid) {
            p.state = PendingState::CancelRequested;
        }
    }

    /// Index is held by a submitted order
    pub fn owned_by_pending(&self, index: usize) -> bool {
        self.cid_to_grid.values().any(|g| g.grid_index == index)
    }

    /// No index appears in both the resting table and the in-flight mapping
    pub fn indices_disjoint(&self) -> bool {
        let mut seen = HashSet::new();
        for g in self.cid_to_grid.values() {
            if !seen.insert(g.grid_index) || self.grid_orders.contains_key(&g.grid_index) {
                return false;
            }
        }
        self.pending.len() == self.cid_to_grid.len()
            && self.pending.keys().all(|cid| self.cid_to_grid.contains_key(cid))
    }

    // ---- retired cids ----

    /// Remember a cid whose lifecycle is over so replayed events are ignored
    pub fn retire(&mut self, cid: &str) {
        if self.retired_set.insert(cid.to_string()) {
            self.retired.push_back(cid.to_string());
            while self.retired.len() > RETIRED_CID_CAPACITY {
                if let Some(old) = self.retired.pop_front() {
                    self.retired_set.remove(&old);
                }
            }
        }
    }

    pub fn is_retired(&self, cid: &str) -> bool {
        self.retired_set.contains(cid)
    }
}
