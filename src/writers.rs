use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::error::SinkError;
use crate::pipeline::RecordSink;
use crate::queue::RecordQueue;
use crate::record::Record;

/// Producer side of a [`RecordQueue`]; never blocks
pub struct QueueSink<P> {
    queue: RecordQueue<P>,
}

impl<P> QueueSink<P> {
    pub fn new(queue: RecordQueue<P>) -> Self {
        Self { queue }
    }
}

impl<P: Send> RecordSink<P> for QueueSink<P> {
    fn name(&self) -> &str {
        self.queue.name()
    }

    fn write(&mut self, record: Record<P>) -> Result<(), SinkError> {
        self.queue.push(record);
        Ok(())
    }
}

/// Writes each payload's `Display` form on its own line
pub struct WriterSink<W: Write> {
    name: String,
    output: W,
}

/// Sink printing payloads to stdout
pub type StandardOutputSink = WriterSink<io::Stdout>;

impl StandardOutputSink {
    pub fn stdout() -> Self {
        WriterSink::new("stdout", io::stdout())
    }
}

impl<W: Write> WriterSink<W> {
    pub fn new(name: impl Into<String>, output: W) -> Self {
        Self {
            name: name.into(),
            output,
        }
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<P: Display, W: Write + Send> RecordSink<P> for WriterSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: Record<P>) -> Result<(), SinkError> {
        writeln!(self.output, "{}", record.payload()).map_err(|e| SinkError {
            sink_name: self.name.clone(),
            sequence_number: record.header().sequence_number(),
            message: e.to_string(),
        })
    }

    fn close(&mut self) {
        if let Err(e) = self.output.flush() {
            warn!(sink = %self.name, error = %e, "flush failed");
        }
    }
}

/// Keeps every written record in a shared vector
pub struct CollectingSink<P> {
    records: Arc<Mutex<Vec<Record<P>>>>,
}

impl<P> CollectingSink<P> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle that stays readable after the sink moves into a job
    pub fn handle(&self) -> Arc<Mutex<Vec<Record<P>>>> {
        Arc::clone(&self.records)
    }
}

impl<P> Default for CollectingSink<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send> RecordSink<P> for CollectingSink<P> {
    fn name(&self) -> &str {
        "collector"
    }

    fn write(&mut self, record: Record<P>) -> Result<(), SinkError> {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record);
        Ok(())
    }
}
