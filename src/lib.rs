// Core library for recordflow: record pipelines, queue dispatch and fork/join jobs

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod parallel;
pub mod pipeline;
pub mod queue;
pub mod readers;
pub mod record;
pub mod report;
pub mod runner;
pub mod writers;

pub use broadcast::PoisonBroadcaster;
pub use dispatch::{ContentBasedDispatcher, RecordDispatcher, RoundRobinDispatcher};
pub use error::{
    BuildError, DispatchError, ExecutionError, MergeError, SinkError, SourceError, TransformError,
};
pub use job::{ErrorStrategy, Execution, Job, JobBuilder};
pub use parallel::{merge_all, JobExecutor, JobOutcome, PoolConfig};
pub use pipeline::{JobListener, RecordSink, RecordSource, StageResult, Transform};
pub use queue::RecordQueue;
pub use record::{Header, Record, RecordMessage};
pub use report::{DefaultReportMerger, JobStatus, Report, ReportMerger, ResultValue};
