//! Order action round-trip latency
//!
//! A send is keyed by `cid_price`; the first matching order event from the
//! venue completes it.

use serde::Serialize;

use crate::market::{OrderStatus, OrderUpdate};

use super::buffer::BoundedStats;
use super::sink::BatchWriter;
use super::TelemetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Place,
    Amend,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyRecord {
    pub stats_key: String,
    pub order_kind: OrderKind,
    pub server_receive_time: u64,
    pub local_place_time: u64,
    pub latency_ms: i64,
}

pub struct LatencyCollector {
    place: BoundedStats<u64>,
    amend: BoundedStats<u64>,
    cancel: BoundedStats<u64>,
    writer: BatchWriter<LatencyRecord>,
}

pub fn stats_key(cid: &str, price: f64) -> String {
    format!("{}_{:.8}", cid, price)
}

impl LatencyCollector {
    pub fn new(capacity: usize, writer: BatchWriter<LatencyRecord>) -> Self {
        Self {
            place: BoundedStats::new(capacity),
            amend: BoundedStats::new(capacity),
            cancel: BoundedStats::new(capacity),
            writer,
        }
    }

    fn bucket(&mut self, kind: OrderKind) -> &mut BoundedStats<u64> {
        match kind {
            OrderKind::Place => &mut self.place,
            OrderKind::Amend => &mut self.amend,
            OrderKind::Cancel => &mut self.cancel,
        }
    }

    /// Remember when an action for `cid` at `price` left the process
    pub fn record_send(&mut self, kind: OrderKind, cid: &str, price: f64, local_time_ms: u64) {
        if let Some((evicted, _)) = self.bucket(kind).insert(stats_key(cid, price), local_time_ms) {
            log::debug!("Latency sample {} evicted unanswered", evicted);
        }
    }

    /// Drop a send that never reached the venue
    pub fn forget_send(&mut self, kind: OrderKind, cid: &str, price: f64) -> bool {
        self.bucket(kind).take(&stats_key(cid, price)).is_some()
    }

    /// Match a venue event against outstanding sends
    pub fn on_update(&mut self, update: &OrderUpdate) -> Result<Option<LatencyRecord>, TelemetryError> {
        let key = stats_key(&update.cid, update.price);
        let matched = if update.status == OrderStatus::Canceled {
            self.cancel.take(&key).map(|t| (OrderKind::Cancel, t))
        } else {
            self.place
                .take(&key)
                .map(|t| (OrderKind::Place, t))
                .or_else(|| self.amend.take(&key).map(|t| (OrderKind::Amend, t)))
        };

        let Some((order_kind, local_place_time)) = matched else {
            return Ok(None);
        };
        let record = LatencyRecord {
            stats_key: key,
            order_kind,
            server_receive_time: update.timestamp,
            local_place_time,
            latency_ms: update.timestamp as i64 - local_place_time as i64,
        };
        self.writer.push(record.clone())?;
        Ok(Some(record))
    }

    pub fn in_flight(&self, kind: OrderKind) -> usize {
        match kind {
            OrderKind::Place => self.place.len(),
            OrderKind::Amend => self.amend.len(),
            OrderKind::Cancel => self.cancel.len(),
        }
    }

    pub fn flush(&mut self) -> Result<(), TelemetryError> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Side;
    use crate::telemetry::sink::MemorySink;

    fn update(cid: &str, price: f64, status: OrderStatus, ts: u64) -> OrderUpdate {
        OrderUpdate {
            cid: cid.into(),
            symbol: "FUT".into(),
            side: Side::Sell,
            price,
            amount: 0.008,
            filled: 0.0,
            avg_price: None,
            status,
            timestamp: ts,
        }
    }

    fn collector(sink: &MemorySink<LatencyRecord>) -> LatencyCollector {
        LatencyCollector::new(10, BatchWriter::new(Box::new(sink.clone()), 1))
    }

    #[test]
    fn test_place_then_amend_then_cancel() {
        let sink = MemorySink::new();
        let mut latency = collector(&sink);

        latency.record_send(OrderKind::Place, "c1", 100.0, 1_000);
        let rec = latency
            .on_update(&update("c1", 100.0, OrderStatus::Open, 1_012))
            .unwrap()
            .unwrap();
        assert_eq!(rec.order_kind, OrderKind::Place);
        assert_eq!(rec.latency_ms, 12);
        assert_eq!(rec.stats_key, "c1_100.00000000");

        latency.record_send(OrderKind::Amend, "c1", 100.5, 2_000);
        let rec = latency
            .on_update(&update("c1", 100.5, OrderStatus::Open, 2_007))
            .unwrap()
            .unwrap();
        assert_eq!(rec.order_kind, OrderKind::Amend);

        latency.record_send(OrderKind::Cancel, "c1", 100.5, 3_000);
        // A fill at the same price does not complete the cancel sample
        assert!(latency
            .on_update(&update("c1", 100.5, OrderStatus::Filled, 3_001))
            .unwrap()
            .is_none());
        let rec = latency
            .on_update(&update("c1", 100.5, OrderStatus::Canceled, 3_020))
            .unwrap()
            .unwrap();
        assert_eq!(rec.order_kind, OrderKind::Cancel);
        assert_eq!(rec.latency_ms, 20);
        assert_eq!(sink.records().len(), 3);
    }

    #[test]
    fn test_unmatched_update_records_nothing() {
        let sink = MemorySink::new();
        let mut latency = collector(&sink);
        latency.record_send(OrderKind::Place, "c1", 100.0, 1_000);
        assert!(latency
            .on_update(&update("c1", 99.0, OrderStatus::Open, 1_010))
            .unwrap()
            .is_none());
        assert_eq!(latency.in_flight(OrderKind::Place), 1);
    }

    #[test]
    fn test_forgotten_send_is_not_matched() {
        let sink = MemorySink::new();
        let mut latency = collector(&sink);
        latency.record_send(OrderKind::Amend, "c1", 100.0, 1_000);
        assert!(latency.forget_send(OrderKind::Amend, "c1", 100.0));
        assert!(!latency.forget_send(OrderKind::Amend, "c1", 100.0));
        assert!(latency
            .on_update(&update("c1", 100.0, OrderStatus::Open, 1_010))
            .unwrap()
            .is_none());
        assert_eq!(latency.in_flight(OrderKind::Amend), 0);
    }
}
