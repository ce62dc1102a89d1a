//! Realised vs expected fill price

use serde::Serialize;

use crate::helpers::bps_diff;
use crate::market::Side;

use super::buffer::BoundedStats;
use super::sink::BatchWriter;
use super::TelemetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillKind {
    Maker,
    Hedge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlippageRecord {
    pub cid: String,
    pub order_kind: FillKind,
    pub expected_price: f64,
    pub actual_price: f64,
    /// Signed, in price units; positive means better than expected
    pub slippage_abs: f64,
    pub slippage_bps: f64,
    pub side: Side,
    pub amount: f64,
    pub fill_time: u64,
}

/// Signed slippage: positive when the fill beat the expectation
pub fn signed_slippage(side: Side, expected: f64, actual: f64) -> f64 {
    match side {
        Side::Buy => expected - actual,
        Side::Sell => actual - expected,
    }
}

#[derive(Debug, Clone, Copy)]
struct Expectation {
    kind: FillKind,
    side: Side,
    expected: f64,
}

pub struct SlippageCollector {
    pending: BoundedStats<Expectation>,
    writer: BatchWriter<SlippageRecord>,
}

impl SlippageCollector {
    pub fn new(capacity: usize, writer: BatchWriter<SlippageRecord>) -> Self {
        Self {
            pending: BoundedStats::new(capacity),
            writer,
        }
    }

    pub fn register(&mut self, cid: &str, kind: FillKind, side: Side, expected: f64) {
        self.pending
            .insert(cid.to_string(), Expectation { kind, side, expected });
    }

    /// Complete the sample for `cid` with its realised fill
    pub fn on_fill(
        &mut self,
        cid: &str,
        actual: f64,
        amount: f64,
        fill_time: u64,
    ) -> Result<Option<SlippageRecord>, TelemetryError> {
        let Some(exp) = self.pending.take(cid) else {
            return Ok(None);
        };
        let slippage_abs = signed_slippage(exp.side, exp.expected, actual);
        let slippage_bps = match exp.side {
            Side::Buy => -bps_diff(exp.expected, actual),
            Side::Sell => bps_diff(exp.expected, actual),
        };
        let record = SlippageRecord {
            cid: cid.to_string(),
            order_kind: exp.kind,
            expected_price: exp.expected,
            actual_price: actual,
            slippage_abs,
            slippage_bps,
            side: exp.side,
            amount,
            fill_time,
        };
        self.writer.push(record.clone())?;
        Ok(Some(record))
    }

    /// Stop expecting a fill for `cid`
    pub fn forget(&mut self, cid: &str) -> bool {
        self.pending.take(cid).is_some()
    }

    pub fn is_tracking(&self, cid: &str) -> bool {
        self.pending.contains(cid)
    }

    pub fn flush(&mut self) -> Result<(), TelemetryError> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sink::MemorySink;

    #[test]
    fn test_signed_slippage() {
        assert_eq!(signed_slippage(Side::Buy, 100.0, 99.0), 1.0);
        assert_eq!(signed_slippage(Side::Buy, 100.0, 101.0), -1.0);
        assert_eq!(signed_slippage(Side::Sell, 100.0, 101.0), 1.0);
        assert_eq!(signed_slippage(Side::Sell, 100.0, 99.0), -1.0);
    }

    #[test]
    fn test_hedge_fill_record() {
        let sink = MemorySink::new();
        let mut slippage = SlippageCollector::new(10, BatchWriter::new(Box::new(sink.clone()), 1));
        slippage.register("h1", FillKind::Hedge, Side::Buy, 50_000.0);
        assert!(slippage.is_tracking("h1"));

        let rec = slippage.on_fill("h1", 50_010.0, 0.008, 42).unwrap().unwrap();
        assert_eq!(rec.order_kind, FillKind::Hedge);
        assert_eq!(rec.slippage_abs, -10.0);
        assert!((rec.slippage_bps + 2.0).abs() < 1e-9);
        assert!(!slippage.is_tracking("h1"));
        assert!(slippage.on_fill("h1", 50_010.0, 0.008, 43).unwrap().is_none());
        assert_eq!(sink.records(), vec![rec]);

        slippage.register("m1", FillKind::Maker, Side::Sell, 1.0);
        assert!(slippage.forget("m1"));
        assert!(!slippage.is_tracking("m1"));
    }
}
