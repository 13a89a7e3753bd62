//! Error taxonomy for sources, stages, sinks, dispatchers and the executor.

use thiserror::Error;

/// Failures raised by a [`RecordSource`](crate::pipeline::RecordSource).
///
/// Both variants are fatal to the owning job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("unable to open source '{source_name}': {message}")]
    Open {
        source_name: String,
        message: String,
    },
    #[error("unable to read from source '{source_name}': {message}")]
    Read {
        source_name: String,
        message: String,
    },
}

impl SourceError {
    pub fn open(source_name: impl Into<String>, message: impl ToString) -> Self {
        SourceError::Open {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn read(source_name: impl Into<String>, message: impl ToString) -> Self {
        SourceError::Read {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

/// A per-record failure inside a filter, mapper or processor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("record #{sequence_number}: {message}")]
pub struct TransformError {
    pub sequence_number: u64,
    pub message: String,
}

impl TransformError {
    pub fn new(sequence_number: u64, message: impl ToString) -> Self {
        Self {
            sequence_number,
            message: message.to_string(),
        }
    }
}

/// A write failure. Fatal to the job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unable to write record #{sequence_number} to '{sink_name}': {message}")]
pub struct SinkError {
    pub sink_name: String,
    pub sequence_number: u64,
    pub message: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("a dispatcher needs at least one target queue")]
    NoQueues,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("cannot merge results of kind '{left}' and '{right}'")]
    IncompatibleResults { left: &'static str, right: &'static str },
    #[error("no reports to merge")]
    Empty,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("job '{0}' has no source")]
    MissingSource(String),
    #[error("invalid stage: {0}")]
    InvalidStage(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A job that could not produce a report at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("job '{job}' panicked: {message}")]
    Panicked { job: String, message: String },
    #[error("job '{0}' was lost before producing a report")]
    Lost(String),
}
