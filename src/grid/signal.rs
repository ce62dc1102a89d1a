//! Fair-value estimate of the spot/future spread
//!
//! Two EWMAs track the synthetic `middle` price: the short one gates anomalous
//! ticks, the long one is the base the grid is centred on.

use serde::{Deserialize, Serialize};

use crate::market::Bbo;

use super::config::SignalConfig;
use super::types::SpreadQuote;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EwmState {
    pub short: f64,
    pub long: f64,
}

/// Result of feeding one observation into the signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalUpdate {
    /// First observation; both averages seeded, nothing else to do this tick
    Initialized(EwmState),
    /// Averages advanced
    Updated(EwmState),
    /// Observation too far from the short average; state unchanged
    Anomalous { price: f64, short: f64 },
}

/// Why a tick was dropped before reaching the signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickRejection {
    /// Leg timestamps further apart than the tolerance
    Stale { skew_ms: u64 },
    /// A leg carried a zero or negative price
    NonPositivePrice,
}

#[derive(Debug, Clone)]
pub struct PriceSignal {
    short_span: f64,
    long_span: f64,
    anomaly_threshold: f64,
    time_tolerance_ms: u64,
    state: Option<EwmState>,
}

impl PriceSignal {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            short_span: config.short_span,
            long_span: config.long_span,
            anomaly_threshold: config.anomaly_threshold,
            time_tolerance_ms: config.time_tolerance_ms,
            state: None,
        }
    }

    pub fn state(&self) -> Option<EwmState> {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Synthetic spread prices for a spot/future BBO pair
    pub fn synthetic_quote(spot: &Bbo, future: &Bbo) -> Result<SpreadQuote, TickRejection> {
        if !spot.has_positive_prices() || !future.has_positive_prices() {
            return Err(TickRejection::NonPositivePrice);
        }
        Ok(SpreadQuote::new(
            spot.ask_price / future.ask_price,
            spot.bid_price / future.bid_price,
        ))
    }

    /// Check that the two legs were observed close enough in time
    pub fn check_freshness(&self, spot: &Bbo, future: &Bbo) -> Result<(), TickRejection> {
        let skew_ms = spot.timestamp.abs_diff(future.timestamp);
        if skew_ms > self.time_tolerance_ms {
            Err(TickRejection::Stale { skew_ms })
        } else {
            Ok(())
        }
    }

    /// Validate a BBO pair and derive its synthetic quote
    pub fn evaluate(&self, spot: &Bbo, future: &Bbo) -> Result<SpreadQuote, TickRejection> {
        self.check_freshness(spot, future)?;
        Self::synthetic_quote(spot, future)
    }

    /// Feed one `middle` observation
    pub fn observe(&mut self, price: f64) -> SignalUpdate {
        let Some(state) = self.state else {
            let seeded = EwmState {
                short: price,
                long: price,
            };
            self.state = Some(seeded);
            return SignalUpdate::Initialized(seeded);
        };

        if (price - state.short).abs() > self.anomaly_threshold * state.short {
            return SignalUpdate::Anomalous {
                price,
                short: state.short,
            };
        }

        let next = EwmState {
            short: ewm_step(state.short, price, self.short_span),
            long: ewm_step(state.long, price, self.long_span),
        };
        self.state = Some(next);
        SignalUpdate::Updated(next)
    }
}

fn ewm_step(prev: f64, price: f64, span: f64) -> f64 {
    ((span - 1.0) * prev + price) / span
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(short_span: f64, long_span: f64) -> PriceSignal {
        PriceSignal::new(&SignalConfig {
            short_span,
            long_span,
            ..SignalConfig::default()
        })
    }

    #[test]
    fn test_first_observation_initializes() {
        let mut sig = signal(10.0, 100.0);
        assert!(!sig.is_initialized());
        match sig.observe(1.001) {
            SignalUpdate::Initialized(state) => {
                assert_eq!(state.short, 1.001);
                assert_eq!(state.long, 1.001);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(sig.is_initialized());
    }

    #[test]
    fn test_ewm_update_rule() {
        let mut sig = signal(10.0, 100.0);
        sig.observe(1.0);
        match sig.observe(1.001) {
            SignalUpdate::Updated(state) => {
                assert!((state.short - (9.0 * 1.0 + 1.001) / 10.0).abs() < 1e-12);
                assert!((state.long - (99.0 * 1.0 + 1.001) / 100.0).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_anomalous_tick_leaves_state_untouched() {
        let mut sig = signal(10.0, 100.0);
        sig.observe(1.0);
        let before = sig.state();
        // 0.5% away with a 0.3% threshold
        let update = sig.observe(1.005);
        assert!(matches!(update, SignalUpdate::Anomalous { .. }));
        assert_eq!(sig.state(), before);
        // Within threshold is accepted
        assert!(matches!(sig.observe(1.002), SignalUpdate::Updated(_)));
    }

    #[test]
    fn test_synthetic_quote() {
        let spot = Bbo::new("S", 100.0, 100.2, 1_000);
        let future = Bbo::new("F", 99.9, 100.0, 1_000);
        let quote = PriceSignal::synthetic_quote(&spot, &future).unwrap();
        assert!((quote.buy_price - 1.002).abs() < 1e-12);
        assert!((quote.sell_price - 100.0 / 99.9).abs() < 1e-12);
        assert!((quote.middle - (quote.buy_price + quote.sell_price) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_prices_rejected() {
        let spot = Bbo::new("S", 0.0, 100.2, 1_000);
        let future = Bbo::new("F", 99.9, 100.0, 1_000);
        assert_eq!(
            PriceSignal::synthetic_quote(&spot, &future),
            Err(TickRejection::NonPositivePrice)
        );
    }

    #[test]
    fn test_stale_legs_rejected() {
        let sig = signal(10.0, 100.0);
        let spot = Bbo::new("S", 100.0, 100.2, 10_000);
        let fresh = Bbo::new("F", 99.9, 100.0, 12_000);
        let stale = Bbo::new("F", 99.9, 100.0, 13_001);
        assert!(sig.evaluate(&spot, &fresh).is_ok());
        assert_eq!(
            sig.evaluate(&spot, &stale),
            Err(TickRejection::Stale { skew_ms: 3_001 })
        );
    }
}
