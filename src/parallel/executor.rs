//! Scoped worker pool that runs jobs and hands back their reports in order

use crossbeam_channel::{unbounded, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::sink::collect_ordered;
use super::types::{JobOutcome, PoolConfig, WorkItem};
use super::worker::worker_thread;
use crate::error::MergeError;
use crate::job::Execution;
use crate::report::{DefaultReportMerger, Report, ReportMerger};

/// A fixed pool of worker threads.
///
/// The pool lives as long as this value: [`shutdown`](Self::shutdown) or drop
/// closes the work channel and joins every worker.
///
/// Jobs that wait on each other (a queue consumer and its producer) must all
/// be able to hold a worker at the same time. With fewer workers than such
/// jobs, a consumer can block a worker its producer is still waiting for.
pub struct JobExecutor {
    config: PoolConfig,
    work_sender: Option<Sender<WorkItem>>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl JobExecutor {
    pub fn new(config: PoolConfig) -> io::Result<Self> {
        let workers = if config.workers == 0 {
            warn!("worker pool size 0 requested, using 1");
            1
        } else {
            config.workers
        };

        let (work_sender, work_receiver) = unbounded::<WorkItem>();
        let mut worker_handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let receiver = work_receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("recordflow-worker-{}", worker_id))
                .spawn(move || worker_thread(worker_id, receiver))?;
            worker_handles.push(handle);
        }
        debug!(workers, "worker pool started");

        Ok(Self {
            config: PoolConfig { workers },
            work_sender: Some(work_sender),
            worker_handles,
        })
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Run every job and block until each has an outcome. Outcomes come back
    /// in submission order. One job failing or panicking never affects another.
    pub fn run_all(&self, jobs: Vec<Box<dyn Execution>>) -> Vec<JobOutcome> {
        let job_names: Vec<String> = jobs.iter().map(|job| job.name().to_string()).collect();
        info!(
            jobs = jobs.len(),
            workers = self.config.workers,
            "running jobs"
        );

        let (result_sender, result_receiver) = unbounded();
        if let Some(work_sender) = &self.work_sender {
            for (index, execution) in jobs.into_iter().enumerate() {
                let item = WorkItem {
                    index,
                    execution,
                    result_sender: result_sender.clone(),
                };
                if work_sender.send(item).is_err() {
                    warn!(index, "no worker left to accept job");
                }
            }
        }
        drop(result_sender);

        collect_ordered(result_receiver, job_names)
    }

    /// Close the work channel and wait for every worker to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Workers leave their loop once the last sender is gone
        self.work_sender.take();
        for (idx, handle) in self.worker_handles.drain(..).enumerate() {
            if handle.join().is_err() {
                warn!(worker = idx, "worker thread panicked outside a job");
            }
        }
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fold reports into one aggregate with [`Report::merge`]
pub fn merge_all(reports: &[Report]) -> Result<Report, MergeError> {
    DefaultReportMerger.merge_reports(reports)
}
