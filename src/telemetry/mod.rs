//! Execution telemetry
//!
//! Three independent collectors, each holding a bounded set of in-flight
//! samples and a batched writer:
//!
//! - [`latency`] - order action round-trip time (place / amend / cancel)
//! - [`slippage`] - realised vs expected fill price for maker and hedge orders
//! - [`deal_price`] - effective spread captured by a maker fill and its hedge
//!
//! Records land in `latency.csv`, `slippage.csv` and `deal_price.csv` under the
//! configured output directory. Persistence failures are reported to the
//! caller and never stop trading.

pub mod buffer;
pub mod deal_price;
pub mod latency;
pub mod sink;
pub mod slippage;

use std::fs;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::grid::config::TelemetryConfig;

pub use deal_price::{DealContext, DealPriceCollector, DealPriceRecord};
pub use latency::{LatencyCollector, LatencyRecord, OrderKind};
pub use sink::{BatchWriter, CsvSink, DiscardSink, MemorySink, RecordSink};
pub use slippage::{FillKind, SlippageCollector, SlippageRecord};

pub const LATENCY_FILE: &str = "latency.csv";
pub const SLIPPAGE_FILE: &str = "slippage.csv";
pub const DEAL_PRICE_FILE: &str = "deal_price.csv";

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Telemetry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Telemetry CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Handles onto in-memory sinks returned by [`Telemetry::in_memory`]
#[derive(Clone)]
pub struct TelemetryRecords {
    pub latency: MemorySink<LatencyRecord>,
    pub slippage: MemorySink<SlippageRecord>,
    pub deal_price: MemorySink<DealPriceRecord>,
}

pub struct Telemetry {
    pub latency: Mutex<LatencyCollector>,
    pub slippage: Mutex<SlippageCollector>,
    pub deal_price: Mutex<DealPriceCollector>,
}

impl Telemetry {
    /// CSV-backed collectors, or discarding ones when telemetry is disabled
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        if !config.enabled {
            return Ok(Self::with_sinks(
                config.capacity,
                config.batch_size,
                Box::new(DiscardSink),
                Box::new(DiscardSink),
                Box::new(DiscardSink),
            ));
        }
        fs::create_dir_all(&config.output_dir)?;
        let dir = &config.output_dir;
        Ok(Self::with_sinks(
            config.capacity,
            config.batch_size,
            Box::new(CsvSink::new(dir.join(LATENCY_FILE))),
            Box::new(CsvSink::new(dir.join(SLIPPAGE_FILE))),
            Box::new(CsvSink::new(dir.join(DEAL_PRICE_FILE))),
        ))
    }

    /// Collectors writing to memory, for tests and dry runs
    pub fn in_memory(capacity: usize, batch_size: usize) -> (Self, TelemetryRecords) {
        let records = TelemetryRecords {
            latency: MemorySink::new(),
            slippage: MemorySink::new(),
            deal_price: MemorySink::new(),
        };
        let telemetry = Self::with_sinks(
            capacity,
            batch_size,
            Box::new(records.latency.clone()),
            Box::new(records.slippage.clone()),
            Box::new(records.deal_price.clone()),
        );
        (telemetry, records)
    }

    pub fn with_sinks(
        capacity: usize,
        batch_size: usize,
        latency: Box<dyn RecordSink<LatencyRecord>>,
        slippage: Box<dyn RecordSink<SlippageRecord>>,
        deal_price: Box<dyn RecordSink<DealPriceRecord>>,
    ) -> Self {
        Self {
            latency: Mutex::new(LatencyCollector::new(
                capacity,
                BatchWriter::new(latency, batch_size),
            )),
            slippage: Mutex::new(SlippageCollector::new(
                capacity,
                BatchWriter::new(slippage, batch_size),
            )),
            deal_price: Mutex::new(DealPriceCollector::new(
                capacity,
                BatchWriter::new(deal_price, batch_size),
            )),
        }
    }

    /// Write every buffered record now
    pub async fn force_flush(&self) -> Result<(), TelemetryError> {
        self.latency.lock().await.flush()?;
        self.slippage.lock().await.flush()?;
        self.deal_price.lock().await.flush()?;
        Ok(())
    }
}
