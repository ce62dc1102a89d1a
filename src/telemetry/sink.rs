//! Record persistence: append-only CSV files and batched writers

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::TelemetryError;

/// Destination for completed telemetry records
pub trait RecordSink<R>: Send {
    fn write_batch(&mut self, records: &[R]) -> Result<(), TelemetryError>;
}

/// Appends records to a CSV file; the header is written only when the file is new or empty
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Serialize> RecordSink<R> for CsvSink {
    fn write_batch(&mut self, records: &[R]) -> Result<(), TelemetryError> {
        if records.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_headers = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_headers)
            .from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory; clones share the same storage
#[derive(Debug)]
pub struct MemorySink<R> {
    records: Arc<Mutex<Vec<R>>>,
}

impl<R> Clone for MemorySink<R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
        }
    }
}

impl<R: Clone> MemorySink<R> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn records(&self) -> Vec<R> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl<R: Clone> Default for MemorySink<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone + Send> RecordSink<R> for MemorySink<R> {
    fn write_batch(&mut self, records: &[R]) -> Result<(), TelemetryError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(records);
        Ok(())
    }
}

/// Drops everything (telemetry disabled)
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl<R> RecordSink<R> for DiscardSink {
    fn write_batch(&mut self, _records: &[R]) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Buffers records and hands them to the sink in batches
pub struct BatchWriter<R> {
    sink: Box<dyn RecordSink<R>>,
    batch_size: usize,
    buffer: Vec<R>,
    written: u64,
}

impl<R> BatchWriter<R> {
    pub fn new(sink: Box<dyn RecordSink<R>>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            written: 0,
        }
    }

    /// Buffer one record, writing the batch once it is full
    pub fn push(&mut self, record: R) -> Result<(), TelemetryError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write whatever is buffered; the buffer is kept if the sink fails
    pub fn flush(&mut self) -> Result<(), TelemetryError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.sink.write_batch(&self.buffer)?;
        self.written += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Row {
        key: String,
        value: f64,
    }

    fn row(i: usize) -> Row {
        Row {
            key: format!("k{}", i),
            value: i as f64,
        }
    }

    #[test]
    fn test_batch_writer_flushes_on_batch_size() {
        let sink = MemorySink::new();
        let mut writer = BatchWriter::new(Box::new(sink.clone()), 3);
        writer.push(row(0)).unwrap();
        writer.push(row(1)).unwrap();
        assert!(sink.records().is_empty());
        writer.push(row(2)).unwrap();
        assert_eq!(sink.records().len(), 3);
        assert_eq!(writer.buffered(), 0);

        writer.push(row(3)).unwrap();
        writer.flush().unwrap();
        assert_eq!(sink.records().len(), 4);
        assert_eq!(writer.written(), 4);
    }

    #[test]
    fn test_csv_sink_writes_header_once() {
        let dir = std::env::temp_dir().join(format!("sink-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rows.csv");

        let mut sink = CsvSink::new(&path);
        sink.write_batch(&[row(0), row(1)]).unwrap();
        let mut sink = CsvSink::new(&path);
        sink.write_batch(&[row(2)]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["key,value", "k0,0.0", "k1,1.0", "k2,2.0"]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_discard_sink() {
        let mut writer: BatchWriter<Row> = BatchWriter::new(Box::new(DiscardSink), 1);
        writer.push(row(0)).unwrap();
        assert_eq!(writer.written(), 1);
    }
}
