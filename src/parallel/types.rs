//! Type definitions for parallel execution

use crossbeam_channel::Sender;

use crate::error::ExecutionError;
use crate::job::Execution;
use crate::report::Report;

/// Worker pool configuration, owned by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
        }
    }
}

impl PoolConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self { workers }
    }
}

/// What one submitted job produced
pub type JobOutcome = Result<Report, ExecutionError>;

/// A job waiting for a free worker
pub(crate) struct WorkItem {
    pub index: usize,
    pub execution: Box<dyn Execution>,
    pub result_sender: Sender<CompletedJob>,
}

/// Sent back by a worker once a job returned or panicked
#[derive(Debug)]
pub(crate) struct CompletedJob {
    pub index: usize,
    pub outcome: JobOutcome,
}
