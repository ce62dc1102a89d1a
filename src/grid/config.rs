//! Spread grid configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::market::AccountId;

use super::errors::{GridError, GridResult};

/// Instrument pair the grid trades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairsConfig {
    /// Hedge-leg (spot) symbol, e.g. "BTC_USDT"
    pub spot: String,

    /// Canonical future symbol as it appears in market data, e.g. "BTC_USDT_251226"
    pub future: String,

    /// Symbol the maker venue uses for orders on the future, when it differs
    /// from the market-data symbol (e.g. "BTC-USDT-20251226")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_order_symbol: Option<String>,
}

impl PairsConfig {
    /// Symbol used on outbound maker orders
    pub fn future_order_symbol(&self) -> &str {
        self.future_order_symbol.as_deref().unwrap_or(&self.future)
    }
}

/// Grid geometry and trigger parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridParams {
    /// Spacing between adjacent levels, in synthetic-price units
    #[serde(default = "default_grid_interval")]
    pub grid_interval: f64,

    /// Levels on each side of the centre (grid has 2N+1 levels)
    #[serde(default = "default_grid_num")]
    pub grid_num: usize,

    /// Fraction of `grid_interval` the new base may lie outside the previous
    /// outer levels and still repopulate
    #[serde(default = "default_reorder_threshold")]
    pub reorder_threshold: f64,

    /// Quantity per grid order
    #[serde(default = "default_trade_amount")]
    pub trade_amount: f64,

    /// Extra edge required before a tick counts as favourable
    #[serde(default = "default_open_margin")]
    pub open_margin: f64,

    /// Consecutive favourable ticks required before submitting
    #[serde(default = "default_open_signal_min_num")]
    pub continuous_open_signal_min_num: u32,

    /// Counter decrement applied on an unfavourable tick
    #[serde(default = "default_signal_decay")]
    pub signal_decay: u32,
}

fn default_grid_interval() -> f64 {
    0.0007
}

fn default_grid_num() -> usize {
    4
}

fn default_reorder_threshold() -> f64 {
    0.5
}

fn default_trade_amount() -> f64 {
    0.008
}

fn default_open_margin() -> f64 {
    0.00005
}

fn default_open_signal_min_num() -> u32 {
    30
}

fn default_signal_decay() -> u32 {
    5
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            grid_interval: default_grid_interval(),
            grid_num: default_grid_num(),
            reorder_threshold: default_reorder_threshold(),
            trade_amount: default_trade_amount(),
            open_margin: default_open_margin(),
            continuous_open_signal_min_num: default_open_signal_min_num(),
            signal_decay: default_signal_decay(),
        }
    }
}

/// Fair-value signal parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_short_span")]
    pub short_span: f64,

    #[serde(default = "default_long_span")]
    pub long_span: f64,

    /// Maximum relative deviation from the short EWMA accepted as a real move
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    /// Maximum timestamp skew between the two legs
    #[serde(default = "default_time_tolerance_ms")]
    pub time_tolerance_ms: u64,
}

// Spans are expressed in ticks at ~100 ticks/second.
fn default_short_span() -> f64 {
    3.0 * 3600.0 * 100.0
}

fn default_long_span() -> f64 {
    36.0 * 3600.0 * 100.0
}

fn default_anomaly_threshold() -> f64 {
    0.003
}

fn default_time_tolerance_ms() -> u64 {
    3000
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            short_span: default_short_span(),
            long_span: default_long_span(),
            anomaly_threshold: default_anomaly_threshold(),
            time_tolerance_ms: default_time_tolerance_ms(),
        }
    }
}

/// Account routing and order-action parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub hedge_account: AccountId,

    #[serde(default = "default_maker_account")]
    pub maker_account: AccountId,

    /// Venue name passed to `create_cid` for hedge orders
    #[serde(default = "default_hedge_exchange")]
    pub hedge_exchange: String,

    /// Venue name passed to `create_cid` for maker orders
    #[serde(default = "default_maker_exchange")]
    pub maker_exchange: String,

    /// Wait for venue acknowledgement on every order action
    #[serde(default)]
    pub sync: bool,

    /// Price step used to improve a maker quote inside the spread (0 joins the touch)
    #[serde(default)]
    pub quote_tick: f64,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_maker_account() -> AccountId {
    1
}

fn default_hedge_exchange() -> String {
    "spot".to_string()
}

fn default_maker_exchange() -> String {
    "future".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            hedge_account: 0,
            maker_account: default_maker_account(),
            hedge_exchange: default_hedge_exchange(),
            maker_exchange: default_maker_exchange(),
            sync: false,
            quote_tick: 0.0,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl ExecutionConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Hedge-leg pricing and retry parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeConfig {
    /// Fraction the hedge limit may cross the reference price by
    #[serde(default = "default_slippage_tolerance")]
    pub slippage_tolerance: f64,

    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_slippage_tolerance() -> f64 {
    0.002
}

fn default_price_decimals() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    100
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            slippage_tolerance: default_slippage_tolerance(),
            price_decimals: default_price_decimals(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl HedgeConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Latency/slippage/deal-price recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// In-flight samples kept per collector before the oldest is evicted
    #[serde(default = "default_telemetry_capacity")]
    pub capacity: usize,

    /// Completed records buffered before a write
    #[serde(default = "default_telemetry_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_telemetry_dir")]
    pub output_dir: PathBuf,
}

fn default_telemetry_enabled() -> bool {
    true
}

fn default_telemetry_capacity() -> usize {
    1000
}

fn default_telemetry_batch_size() -> usize {
    10
}

fn default_telemetry_dir() -> PathBuf {
    PathBuf::from("telemetry")
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            capacity: default_telemetry_capacity(),
            batch_size: default_telemetry_batch_size(),
            output_dir: default_telemetry_dir(),
        }
    }
}

/// Full strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub pairs: PairsConfig,

    #[serde(default)]
    pub grid_config: GridParams,

    #[serde(default)]
    pub signal: SignalConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub hedge: HedgeConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl StrategyConfig {
    /// Configuration with defaults for everything but the instrument pair
    pub fn new(spot: impl Into<String>, future: impl Into<String>) -> Self {
        Self {
            pairs: PairsConfig {
                spot: spot.into(),
                future: future.into(),
                future_order_symbol: None,
            },
            grid_config: GridParams::default(),
            signal: SignalConfig::default(),
            execution: ExecutionConfig::default(),
            hedge: HedgeConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Builder: venue-side symbol for maker orders
    pub fn with_future_order_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.pairs.future_order_symbol = Some(symbol.into());
        self
    }

    /// Builder: grid geometry
    pub fn with_grid(mut self, grid_interval: f64, grid_num: usize) -> Self {
        self.grid_config.grid_interval = grid_interval;
        self.grid_config.grid_num = grid_num;
        self
    }

    /// Builder: hysteresis parameters
    pub fn with_hysteresis(mut self, min_signals: u32, decay: u32) -> Self {
        self.grid_config.continuous_open_signal_min_num = min_signals;
        self.grid_config.signal_decay = decay;
        self
    }

    /// Builder: EWMA spans
    pub fn with_spans(mut self, short_span: f64, long_span: f64) -> Self {
        self.signal.short_span = short_span;
        self.signal.long_span = long_span;
        self
    }

    /// Builder: lock acquisition timeout
    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.execution.lock_timeout_ms = ms;
        self
    }

    /// Builder: telemetry output directory
    pub fn with_telemetry_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.telemetry.output_dir = dir.into();
        self
    }

    /// Builder: disable telemetry persistence
    pub fn without_telemetry(mut self) -> Self {
        self.telemetry.enabled = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> GridResult<()> {
        if self.pairs.spot.is_empty() || self.pairs.future.is_empty() {
            return Err(GridError::InvalidConfig(
                "pairs.spot and pairs.future cannot be empty".into(),
            ));
        }

        if self.pairs.spot == self.pairs.future {
            return Err(GridError::InvalidConfig(
                "pairs.spot and pairs.future must differ".into(),
            ));
        }

        let grid = &self.grid_config;
        if !(grid.grid_interval > 0.0) {
            return Err(GridError::InvalidConfig(
                "grid_interval must be positive".into(),
            ));
        }

        if grid.grid_num == 0 {
            return Err(GridError::InvalidConfig(
                "grid_num must be at least 1".into(),
            ));
        }

        if !(grid.trade_amount > 0.0) {
            return Err(GridError::InvalidConfig(
                "trade_amount must be positive".into(),
            ));
        }

        if grid.reorder_threshold < 0.0 || grid.open_margin < 0.0 {
            return Err(GridError::InvalidConfig(
                "reorder_threshold and open_margin cannot be negative".into(),
            ));
        }

        if grid.continuous_open_signal_min_num == 0 {
            return Err(GridError::InvalidConfig(
                "continuous_open_signal_min_num must be at least 1".into(),
            ));
        }

        if self.signal.short_span < 1.0 || self.signal.long_span < 1.0 {
            return Err(GridError::InvalidConfig(
                "EWMA spans must be at least 1".into(),
            ));
        }

        if !(self.signal.anomaly_threshold > 0.0) {
            return Err(GridError::InvalidConfig(
                "anomaly_threshold must be positive".into(),
            ));
        }

        if self.execution.hedge_account == self.execution.maker_account {
            return Err(GridError::InvalidConfig(
                "hedge_account and maker_account must differ".into(),
            ));
        }

        if self.execution.quote_tick < 0.0 {
            return Err(GridError::InvalidConfig(
                "quote_tick cannot be negative".into(),
            ));
        }

        if self.execution.lock_timeout_ms == 0 {
            return Err(GridError::InvalidConfig(
                "lock_timeout_ms must be positive".into(),
            ));
        }

        if !(0.0..1.0).contains(&self.hedge.slippage_tolerance) {
            return Err(GridError::InvalidConfig(
                "slippage_tolerance must be in [0, 1)".into(),
            ));
        }

        if self.telemetry.capacity == 0 || self.telemetry.batch_size == 0 {
            return Err(GridError::InvalidConfig(
                "telemetry capacity and batch_size must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StrategyConfig::new("BTC_USDT", "BTC_USDT_251226");
        assert!(config.validate().is_ok());
        assert_eq!(config.grid_config.grid_num, 4);
        assert!((config.grid_config.grid_interval - 0.0007).abs() < 1e-12);
        assert_eq!(config.grid_config.continuous_open_signal_min_num, 30);
        assert_eq!(config.signal.short_span, 1_080_000.0);
        assert_eq!(config.signal.long_span, 12_960_000.0);
        assert_eq!(config.execution.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.hedge.price_decimals, 2);
        assert_eq!(config.telemetry.capacity, 1000);
    }

    #[test]
    fn test_config_validation() {
        let config = StrategyConfig::new("BTC_USDT", "BTC_USDT");
        assert!(config.validate().is_err());

        let config = StrategyConfig::new("BTC_USDT", "BTC_FUT").with_grid(0.0, 4);
        assert!(config.validate().is_err());

        let config = StrategyConfig::new("BTC_USDT", "BTC_FUT").with_grid(0.001, 0);
        assert!(config.validate().is_err());

        let config = StrategyConfig::new("BTC_USDT", "BTC_FUT").with_hysteresis(0, 5);
        assert!(config.validate().is_err());

        let mut config = StrategyConfig::new("BTC_USDT", "BTC_FUT");
        config.execution.maker_account = config.execution.hedge_account;
        assert!(config.validate().is_err());

        let mut config = StrategyConfig::new("BTC_USDT", "BTC_FUT");
        config.hedge.slippage_tolerance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_future_order_symbol_fallback() {
        let config = StrategyConfig::new("BTC_USDT", "BTC_USDT_251226");
        assert_eq!(config.pairs.future_order_symbol(), "BTC_USDT_251226");

        let config = config.with_future_order_symbol("BTC-USDT-20251226");
        assert_eq!(config.pairs.future_order_symbol(), "BTC-USDT-20251226");
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let json = r#"{
            "pairs": {"spot": "ETH_USDT", "future": "ETH_USDT_251226"},
            "grid_config": {"grid_num": 6, "trade_amount": 0.1},
            "execution": {"quote_tick": 0.01}
        }"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grid_config.grid_num, 6);
        assert_eq!(config.grid_config.trade_amount, 0.1);
        assert_eq!(config.grid_config.signal_decay, 5);
        assert_eq!(config.execution.quote_tick, 0.01);
        assert_eq!(config.execution.maker_account, 1);
        assert!(config.validate().is_ok());
    }
}
