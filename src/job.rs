//! A job: one source, a chain of stages, and an optional dispatcher and sink.

use chrono::Utc;
use clap::ValueEnum;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

use crate::dispatch::RecordDispatcher;
use crate::error::BuildError;
use crate::parallel::panic_message;
use crate::pipeline::{JobListener, RecordSink, RecordSource, StageResult, Transform};
use crate::record::Record;
use crate::report::{JobStatus, Report};

/// What a job does after a stage fails on one record
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Count the error and move on to the next record
    #[default]
    Skip,
    /// Count the error and stop the job as failed
    Abort,
}

/// A unit of work the executor can run on any worker thread
pub trait Execution: Send {
    fn name(&self) -> &str;

    fn call(self: Box<Self>) -> Report;
}

/// Reads every record from its source, runs it through its stages, then hands
/// survivors to the dispatcher and/or the sink.
pub struct Job<P> {
    name: String,
    source: Box<dyn RecordSource<P>>,
    stages: Vec<Box<dyn Transform<P>>>,
    dispatcher: Option<Box<dyn RecordDispatcher<P>>>,
    sink: Option<Box<dyn RecordSink<P>>>,
    listeners: Vec<Box<dyn JobListener>>,
    on_error: ErrorStrategy,
}

/// How a single record left the pipeline
enum RecordFate {
    Filtered,
    Succeeded,
    Failed(String),
    Fatal(String),
}

impl<P: Clone + Send + 'static> Job<P> {
    pub fn builder(name: impl Into<String>) -> JobBuilder<P> {
        JobBuilder {
            name: name.into(),
            source: None,
            stages: Vec::new(),
            dispatcher: None,
            sink: None,
            listeners: Vec::new(),
            on_error: ErrorStrategy::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run to completion. Never panics on I/O failure: fatal errors end the
    /// job early with a `Failed` report. Listeners always run, even when a
    /// stage or sink panics; the panic is re-raised after they have seen a
    /// `Failed` report.
    pub fn run(mut self) -> Report {
        let mut report = Report::new(self.name.clone(), Utc::now(), Utc::now());

        for listener in &mut self.listeners {
            listener.before_job(&self.name);
        }
        info!(job = %self.name, source = self.source.name(), "job started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&mut report)));
        if let Err(payload) = &outcome {
            let message = panic_message(payload.as_ref());
            error!(job = %self.name, %message, "job panicked");
            // The record in flight when the panic hit counts as an error
            let settled = report.filtered_count + report.error_count + report.success_count;
            report.error_count += report.read_count - settled;
            report.status = JobStatus::Failed;
            report.last_error = Some(format!("job panicked: {}", message));
        }
        report.end_time = Utc::now();

        for listener in &mut self.listeners {
            listener.after_job(&report);
        }

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }

        info!(
            job = %self.name,
            read = report.read_count,
            filtered = report.filtered_count,
            errors = report.error_count,
            succeeded = report.success_count,
            status = ?report.status,
            "job finished"
        );
        report
    }

    fn execute(&mut self, report: &mut Report) {
        match self.source.open() {
            Ok(()) => {
                self.read_all(report);
                self.source.close();
            }
            Err(e) => {
                error!(job = %self.name, error = %e, "source could not be opened");
                report.status = JobStatus::Failed;
                report.last_error = Some(e.to_string());
            }
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.close();
        }

        report.result = self.stages.iter().rev().find_map(|stage| stage.result());
    }

    fn read_all(&mut self, report: &mut Report) {
        loop {
            let record = match self.source.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    error!(job = %self.name, error = %e, "source read failed");
                    report.status = JobStatus::Failed;
                    report.last_error = Some(e.to_string());
                    break;
                }
            };
            report.read_count += 1;

            match self.process(record) {
                RecordFate::Filtered => report.filtered_count += 1,
                RecordFate::Succeeded => report.success_count += 1,
                RecordFate::Failed(message) => {
                    report.error_count += 1;
                    report.last_error = Some(message);
                    if self.on_error == ErrorStrategy::Abort {
                        report.status = JobStatus::Failed;
                        break;
                    }
                }
                RecordFate::Fatal(message) => {
                    report.error_count += 1;
                    report.last_error = Some(message);
                    report.status = JobStatus::Failed;
                    break;
                }
            }
        }
    }

    fn process(&mut self, record: Record<P>) -> RecordFate {
        let seq = record.header().sequence_number();
        let mut current = record;

        for stage in &mut self.stages {
            current = match stage.apply(current) {
                Ok(StageResult::Emit(next)) => next,
                Ok(StageResult::Skip) => return RecordFate::Filtered,
                Err(e) => {
                    warn!(job = %self.name, seq, error = %e, "record processing failed");
                    return RecordFate::Failed(e.to_string());
                }
            };
        }

        if let Some(dispatcher) = self.dispatcher.as_mut() {
            // The sink, if any, sees the record as well
            let copy = self.sink.as_ref().map(|_| current.clone());
            let delivered = dispatcher.dispatch(current);
            if delivered == 0 {
                debug!(job = %self.name, seq, "record matched no queue");
                return RecordFate::Filtered;
            }
            match copy {
                Some(copy) => current = copy,
                None => return RecordFate::Succeeded,
            }
        }

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write(current) {
                error!(job = %self.name, seq, error = %e, "sink write failed");
                return RecordFate::Fatal(e.to_string());
            }
        }
        RecordFate::Succeeded
    }
}

impl<P: Clone + Send + 'static> Execution for Job<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(self: Box<Self>) -> Report {
        (*self).run()
    }
}

pub struct JobBuilder<P> {
    name: String,
    source: Option<Box<dyn RecordSource<P>>>,
    stages: Vec<Box<dyn Transform<P>>>,
    dispatcher: Option<Box<dyn RecordDispatcher<P>>>,
    sink: Option<Box<dyn RecordSink<P>>>,
    listeners: Vec<Box<dyn JobListener>>,
    on_error: ErrorStrategy,
}

impl<P: Clone + Send + 'static> JobBuilder<P> {
    pub fn source(mut self, source: impl RecordSource<P> + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Append a filter, mapper, validator or processor; stages run in the order added
    pub fn stage(mut self, stage: impl Transform<P> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn filter(self, keep: impl FnMut(&Record<P>) -> bool + Send + 'static) -> Self {
        self.stage(crate::pipeline::FilterStage::new(keep))
    }

    pub fn dispatcher(mut self, dispatcher: impl RecordDispatcher<P> + 'static) -> Self {
        self.dispatcher = Some(Box::new(dispatcher));
        self
    }

    pub fn sink(mut self, sink: impl RecordSink<P> + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn listener(mut self, listener: impl JobListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn on_error(mut self, strategy: ErrorStrategy) -> Self {
        self.on_error = strategy;
        self
    }

    pub fn build(self) -> Result<Job<P>, BuildError> {
        let source = self
            .source
            .ok_or_else(|| BuildError::MissingSource(self.name.clone()))?;
        Ok(Job {
            name: self.name,
            source,
            stages: self.stages,
            dispatcher: self.dispatcher,
            sink: self.sink,
            listeners: self.listeners,
            on_error: self.on_error,
        })
    }

    /// Build and box for [`JobExecutor::run_all`](crate::parallel::JobExecutor::run_all)
    pub fn build_execution(self) -> Result<Box<dyn Execution>, BuildError> {
        Ok(Box::new(self.build()?))
    }
}
