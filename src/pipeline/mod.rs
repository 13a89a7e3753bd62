use crate::error::{SinkError, SourceError, TransformError};
use crate::record::Record;
use crate::report::{Report, ResultValue};

pub mod stages;

pub use stages::*;

/// Core stage result type
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult<P> {
    /// Pass the (possibly new) record to the next stage
    Emit(Record<P>),
    /// Drop the record; counted as filtered
    Skip,
}

impl<P> StageResult<P> {
    /// Unwrap the record from Emit variant, panics if not Emit
    #[cfg(test)]
    pub fn unwrap_emit(self) -> Record<P> {
        match self {
            StageResult::Emit(record) => record,
            StageResult::Skip => panic!("Expected StageResult::Emit"),
        }
    }
}

/// Core pipeline traits
///
/// Produce records, one at a time, from some input
pub trait RecordSource<P>: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// `Ok(None)` once the input is exhausted
    fn next_record(&mut self) -> Result<Option<Record<P>>, SourceError>;

    fn close(&mut self) {}
}

/// Filtering, mapping, validating or processing one record
pub trait Transform<P>: Send {
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError>;

    /// Value computed over the records seen so far, if this stage computes one
    fn result(&self) -> Option<ResultValue> {
        None
    }
}

/// Write records to their final destination
pub trait RecordSink<P>: Send {
    fn name(&self) -> &str;

    fn write(&mut self, record: Record<P>) -> Result<(), SinkError>;

    fn close(&mut self) {}
}

/// Hooks around a job's lifetime
pub trait JobListener: Send {
    fn before_job(&mut self, _job_name: &str) {}

    /// Runs once per job on every exit path, including fatal errors and panics
    fn after_job(&mut self, _report: &Report) {}
}
