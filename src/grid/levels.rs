//! Grid level calculation, seeding and re-centering

use log::{debug, info};

use crate::market::Side;

use super::config::GridParams;
use super::types::{GridLevel, GridOrder};

/// Outcome of moving the grid to a new base
#[derive(Debug, Clone)]
pub struct RecenterPlan {
    pub previous_base: f64,
    pub new_base: f64,
    /// False when the new base jumped too far past the old grid to trust it
    pub repopulate: bool,
    /// Fresh resting orders for the new grid (empty when not repopulating)
    pub orders: Vec<GridOrder>,
}

/// Owns the grid geometry: `2N+1` arithmetic levels centred on `base_price`
#[derive(Debug, Clone)]
pub struct GridManager {
    grid_interval: f64,
    grid_num: usize,
    trade_amount: f64,
    reorder_threshold: f64,
    base_price: Option<f64>,
    levels: Vec<GridLevel>,
    epoch: u64,
    /// Current epoch's seed orders were handed out
    populated: bool,
}

impl GridManager {
    pub fn new(params: &GridParams) -> Self {
        Self {
            grid_interval: params.grid_interval,
            grid_num: params.grid_num,
            trade_amount: params.trade_amount,
            reorder_threshold: params.reorder_threshold,
            base_price: None,
            levels: Vec::new(),
            epoch: 0,
            populated: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.base_price.is_some()
    }

    pub fn base_price(&self) -> Option<f64> {
        self.base_price
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    /// Generation counter, bumped on every (re)initialization
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// False after a re-center that skipped repopulating, until [`repopulate`](Self::repopulate)
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn center_index(&self) -> usize {
        self.grid_num
    }

    pub fn max_index(&self) -> usize {
        2 * self.grid_num
    }

    pub fn price_of(&self, index: usize) -> Option<f64> {
        self.levels.get(index).map(|l| l.price)
    }

    /// Compute levels around `base_price`, start a new epoch and return the seed orders
    pub fn initialize(&mut self, base_price: f64) -> Vec<GridOrder> {
        self.base_price = Some(base_price);
        self.levels = Self::compute_levels(base_price, self.grid_interval, self.grid_num);
        self.epoch += 1;
        self.populated = true;
        info!(
            "Grid initialized: base={:.6} range=[{:.6}, {:.6}] levels={} epoch={}",
            base_price,
            self.levels.first().map(|l| l.price).unwrap_or(base_price),
            self.levels.last().map(|l| l.price).unwrap_or(base_price),
            self.levels.len(),
            self.epoch
        );
        self.seed_orders()
    }

    /// One resting order per non-centre level: buys below the centre, sells above
    pub fn seed_orders(&self) -> Vec<GridOrder> {
        (0..self.levels.len())
            .filter_map(|i| self.seed_for_level(i))
            .collect()
    }

    /// Seed order of the current epoch at `index`, if the grid is populated
    pub fn seed_order(&self, index: usize) -> Option<GridOrder> {
        if !self.populated {
            return None;
        }
        self.seed_for_level(index)
    }

    fn seed_for_level(&self, index: usize) -> Option<GridOrder> {
        let center = self.center_index();
        let price = self.price_of(index)?;
        let side = match index.cmp(&center) {
            std::cmp::Ordering::Less => Side::Buy,
            std::cmp::Ordering::Greater => Side::Sell,
            std::cmp::Ordering::Equal => return None,
        };
        Some(GridOrder::new(index, price, self.trade_amount, side, self.epoch))
    }

    fn within_reorder_allowance(&self, distance: f64) -> bool {
        let allowed = self.reorder_threshold * self.grid_interval;
        distance <= allowed + f64::EPSILON * allowed.abs().max(1.0)
    }

    /// An unpopulated grid's fair value has settled near its base
    pub fn settled(&self, long_ewm: f64) -> bool {
        match self.base_price {
            Some(base) if !self.populated => self.within_reorder_allowance((long_ewm - base).abs()),
            _ => false,
        }
    }

    /// Hand out the current epoch's seed orders for a grid left empty by a re-center
    pub fn repopulate(&mut self) -> Vec<GridOrder> {
        self.populated = true;
        info!(
            "Grid repopulated around {:.6} (epoch {})",
            self.base_price.unwrap_or_default(),
            self.epoch
        );
        self.seed_orders()
    }

    /// Long-run fair value has drifted more than one interval from the base
    pub fn needs_recenter(&self, long_ewm: f64) -> bool {
        match self.base_price {
            Some(base) => (long_ewm - base).abs() > self.grid_interval,
            None => false,
        }
    }

    /// Move the grid to `new_base`
    ///
    /// The new grid is only populated when `new_base` lies within
    /// `reorder_threshold * grid_interval` of the previous outer levels.
    pub fn recenter(&mut self, new_base: f64) -> RecenterPlan {
        let previous_base = self.base_price.unwrap_or(new_base);
        let (lower, upper) = match (self.levels.first(), self.levels.last()) {
            (Some(lo), Some(hi)) => (lo.price, hi.price),
            _ => (new_base, new_base),
        };
        let overshoot = if new_base < lower {
            lower - new_base
        } else if new_base > upper {
            new_base - upper
        } else {
            0.0
        };
        let repopulate = self.within_reorder_allowance(overshoot);

        let seeded = self.initialize(new_base);
        self.populated = repopulate;
        let orders = if repopulate { seeded } else { Vec::new() };

        info!(
            "Grid re-centered {:.6} -> {:.6} (overshoot {:.6}, repopulate={})",
            previous_base, new_base, overshoot, repopulate
        );

        RecenterPlan {
            previous_base,
            new_base,
            repopulate,
            orders,
        }
    }

    /// Rung that replaces a filled one: the opposite spread direction one level further out
    pub fn next_rung(&self, filled: &GridOrder) -> Option<GridOrder> {
        let (index, side) = match filled.side {
            Side::Buy => (filled.grid_index.checked_add(1)?, Side::Sell),
            Side::Sell => (filled.grid_index.checked_sub(1)?, Side::Buy),
        };
        if index > self.max_index() {
            debug!(
                "Next rung for index {} falls outside the grid, dropping",
                filled.grid_index
            );
            return None;
        }
        let price = self.price_of(index)?;
        Some(GridOrder::new(index, price, filled.amount, side, self.epoch))
    }

    fn compute_levels(base: f64, interval: f64, grid_num: usize) -> Vec<GridLevel> {
        (0..=2 * grid_num)
            .map(|i| GridLevel {
                index: i,
                price: base + (i as f64 - grid_num as f64) * interval,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(interval: f64, grid_num: usize) -> GridManager {
        GridManager::new(&GridParams {
            grid_interval: interval,
            grid_num,
            ..GridParams::default()
        })
    }

    #[test]
    fn test_level_count_and_spacing() {
        let mut grid = manager(0.0007, 4);
        grid.initialize(1.0);
        let levels = grid.levels();
        assert_eq!(levels.len(), 9);
        assert!((levels[4].price - 1.0).abs() < 1e-12);
        for pair in levels.windows(2) {
            assert!(pair[1].price > pair[0].price);
            assert!((pair[1].price - pair[0].price - 0.0007).abs() < 1e-12);
        }
    }

    #[test]
    fn test_seed_orders_skip_center() {
        let mut grid = manager(1.0, 2);
        let orders = grid.initialize(100.0);
        assert_eq!(orders.len(), 4);
        assert!(orders.iter().all(|o| o.grid_index != 2));
        assert!(orders.iter().filter(|o| o.grid_index < 2).all(|o| o.side == Side::Buy));
        assert!(orders.iter().filter(|o| o.grid_index > 2).all(|o| o.side == Side::Sell));
        assert!(orders.iter().all(|o| o.epoch == 1 && o.amount == 0.008));
    }

    #[test]
    fn test_needs_recenter() {
        let mut grid = manager(1.0, 1);
        assert!(!grid.needs_recenter(500.0));
        grid.initialize(100.0);
        assert!(!grid.needs_recenter(101.0));
        assert!(!grid.needs_recenter(99.0));
        assert!(grid.needs_recenter(101.5));
        assert!(grid.needs_recenter(98.9));
    }

    #[test]
    fn test_recenter_within_threshold_repopulates() {
        let mut grid = manager(1.0, 1);
        grid.initialize(100.0);
        let plan = grid.recenter(101.5);
        assert!(plan.repopulate);
        assert_eq!(plan.previous_base, 100.0);
        assert_eq!(grid.base_price(), Some(101.5));
        assert_eq!(grid.epoch(), 2);
        assert_eq!(plan.orders.len(), 2);
        assert!((grid.levels()[0].price - 100.5).abs() < 1e-12);
        assert!((grid.levels()[2].price - 102.5).abs() < 1e-12);
    }

    #[test]
    fn test_recenter_beyond_threshold_skips() {
        let mut grid = manager(1.0, 1);
        grid.initialize(100.0);
        let plan = grid.recenter(101.6);
        assert!(!plan.repopulate);
        assert!(plan.orders.is_empty());
        // Base still moves so the next comparison is against the new grid
        assert_eq!(grid.base_price(), Some(101.6));
        assert_eq!(grid.levels().len(), 3);

        let mut grid = manager(1.0, 1);
        grid.initialize(100.0);
        assert!(!grid.recenter(98.4).repopulate);
    }

    #[test]
    fn test_skipped_grid_repopulates_once_settled() {
        let mut grid = manager(1.0, 1);
        grid.initialize(100.0);
        assert!(grid.is_populated());
        grid.recenter(101.6);
        assert!(!grid.is_populated());
        assert!(grid.seed_order(0).is_none());

        // Still running away from the new base
        assert!(!grid.settled(102.2));
        assert!(!grid.needs_recenter(102.2));
        assert!(grid.settled(101.9));

        let orders = grid.repopulate();
        assert!(grid.is_populated());
        assert_eq!(grid.epoch(), 2);
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.epoch == 2));
        assert!(!grid.settled(101.6));
    }

    #[test]
    fn test_seed_order_by_index() {
        let mut grid = manager(1.0, 2);
        assert!(grid.seed_order(0).is_none());
        grid.initialize(100.0);
        let low = grid.seed_order(0).unwrap();
        assert_eq!((low.side, low.price, low.epoch), (Side::Buy, 98.0, 1));
        assert_eq!(grid.seed_order(4).unwrap().side, Side::Sell);
        assert!(grid.seed_order(2).is_none());
        assert!(grid.seed_order(5).is_none());
    }

    #[test]
    fn test_next_rung() {
        let mut grid = manager(1.0, 2);
        grid.initialize(100.0);

        let filled_buy = GridOrder::new(1, 99.0, 0.008, Side::Buy, 1);
        let next = grid.next_rung(&filled_buy).unwrap();
        assert_eq!((next.grid_index, next.side), (2, Side::Sell));
        assert_eq!(next.price, 100.0);

        let filled_sell = GridOrder::new(3, 101.0, 0.008, Side::Sell, 1);
        let next = grid.next_rung(&filled_sell).unwrap();
        assert_eq!((next.grid_index, next.side), (2, Side::Buy));

        // Edges drop the rung
        let top_buy = GridOrder::new(4, 102.0, 0.008, Side::Buy, 1);
        assert!(grid.next_rung(&top_buy).is_none());
        let bottom_sell = GridOrder::new(0, 98.0, 0.008, Side::Sell, 1);
        assert!(grid.next_rung(&bottom_sell).is_none());
    }

    #[test]
    fn test_next_rung_uses_current_levels() {
        let mut grid = manager(1.0, 2);
        grid.initialize(100.0);
        let filled = GridOrder::new(1, 99.0, 0.008, Side::Buy, 1);
        grid.recenter(101.2);
        let next = grid.next_rung(&filled).unwrap();
        assert!((next.price - 101.2).abs() < 1e-12);
        assert_eq!(next.epoch, 2);
    }
}
