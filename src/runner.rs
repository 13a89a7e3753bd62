//! Pipeline execution module
//!
//! Wires sources, stages, queues and dispatchers into the job graphs each
//! subcommand runs, executes them on a scoped pool, and prints the reports.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::broadcast::PoisonBroadcaster;
use crate::config::RecordflowConfig;
use crate::dispatch::{ContentBasedDispatcher, RoundRobinDispatcher};
use crate::error::TransformError;
use crate::job::{Execution, Job};
use crate::parallel::{merge_all, JobExecutor, PoolConfig};
use crate::pipeline::{
    CutProcessor, FileExtensionFilter, GrepFilter, HeaderRecordFilter, LoggingProcessor, MapStage,
    RecordNumberFilter, WordCountProcessor,
};
use crate::queue::RecordQueue;
use crate::readers::{DelimitedSource, DirectorySource, LineSource, QueueSource};
use crate::record::Record;
use crate::report::{Report, ResultValue};
use crate::writers::{QueueSink, StandardOutputSink};

/// One row of a tweets file: `id,user,message`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Tweet {
    pub id: u64,
    pub user: String,
    pub message: String,
}

impl fmt::Display for Tweet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} @{}: {}", self.id, self.user, self.message)
    }
}

/// Reports of every job in a run, plus their merge when the run asks for one
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub jobs: Vec<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<Report>,
    #[serde(skip)]
    pub headline: Option<String>,
}

impl RunSummary {
    pub fn any_failed(&self) -> bool {
        self.jobs.iter().any(Report::is_failed)
    }

    pub fn print(&self, json: bool) -> Result<()> {
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(self).context("Failed to serialize reports")?
            );
            return Ok(());
        }

        if let Some(headline) = &self.headline {
            println!("{}", headline);
        }
        for report in &self.jobs {
            println!("{}", report.format_report());
        }
        if let Some(merged) = &self.merged {
            println!("Merged: {}", merged.format_report());
        }
        Ok(())
    }
}

/// Run jobs on a pool that lives exactly as long as this call
fn execute(pool: PoolConfig, jobs: Vec<Box<dyn Execution>>) -> Result<Vec<Report>> {
    let executor = JobExecutor::new(pool).context("Failed to start worker pool")?;
    let outcomes = executor.run_all(jobs);
    executor.shutdown();

    outcomes
        .into_iter()
        .map(|outcome| outcome.map_err(anyhow::Error::from))
        .collect()
}

/// grep | cut | wc over one delimited file
pub fn run_pipeline(
    config: &RecordflowConfig,
    file: &Path,
    token: &str,
    delimiter: &str,
    field: usize,
) -> Result<RunSummary> {
    let job = Job::builder("pipeline-job")
        .source(LineSource::new(file))
        .stage(HeaderRecordFilter)
        .stage(GrepFilter::new(token).with_context(|| format!("Invalid token '{}'", token))?)
        .stage(CutProcessor::new(delimiter, field)?)
        .stage(WordCountProcessor::default())
        .on_error(config.on_error)
        .build_execution()?;

    let jobs = execute(config.pool, vec![job])?;
    let words = jobs
        .first()
        .and_then(|report| report.result.clone())
        .unwrap_or(ResultValue::Count(0));

    Ok(RunSummary {
        headline: Some(format!(
            "The number of words in records containing {} = {}",
            token, words
        )),
        jobs,
        merged: None,
    })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn file_worker(name: &str, queue: RecordQueue<PathBuf>, config: &RecordflowConfig) -> Result<Box<dyn Execution>> {
    let worker = name.to_string();
    Ok(Job::builder(name)
        .source(QueueSource::new(queue).with_read_timeout(config.read_timeout))
        .stage(MapStage::new(move |record: Record<PathBuf>| {
            info!(worker = %worker, file = %record.payload().display(), "processing file");
            Ok::<_, TransformError>(record)
        }))
        .on_error(config.on_error)
        .build_execution()?)
}

/// Content-based dispatch of a directory's files to a csv and an xml worker
pub fn run_cbrd(config: &RecordflowConfig, dir: &Path) -> Result<RunSummary> {
    let csv_queue = RecordQueue::new("csv-queue");
    let xml_queue = RecordQueue::new("xml-queue");

    let dispatcher = ContentBasedDispatcher::builder()
        .when(|r: &Record<PathBuf>| has_extension(r.payload(), "csv"))
        .dispatch_to(csv_queue.clone())
        .when(|r: &Record<PathBuf>| has_extension(r.payload(), "xml"))
        .dispatch_to(xml_queue.clone())
        .build()?;

    let master = Job::builder("master-job")
        .source(DirectorySource::new(dir))
        .stage(FileExtensionFilter::new([".log", ".tmp"]))
        .dispatcher(dispatcher)
        .listener(PoisonBroadcaster::new(vec![csv_queue.clone(), xml_queue.clone()]))
        .on_error(config.on_error)
        .build_execution()?;

    let jobs = vec![
        master,
        file_worker("csv-worker-job", csv_queue, config)?,
        file_worker("xml-worker-job", xml_queue, config)?,
    ];
    let pool = config.pool_for(jobs.len());
    let reports = execute(pool, jobs)?;

    Ok(RunSummary {
        jobs: reports,
        merged: None,
        headline: None,
    })
}

/// One fork job deals tweets round-robin to two workers; a join job collects
/// their output and prints it.
pub fn run_fork_join(config: &RecordflowConfig, file: &Path) -> Result<RunSummary> {
    const WORKERS: usize = 2;

    let work_queues: Vec<RecordQueue<Tweet>> = (1..=WORKERS)
        .map(|i| RecordQueue::new(format!("work-queue{}", i)))
        .collect();
    let join_queue = RecordQueue::new("join-queue");

    let mut jobs: Vec<Box<dyn Execution>> = Vec::with_capacity(WORKERS + 2);
    jobs.push(
        Job::builder("fork-job")
            .source(DelimitedSource::<Tweet>::new(file))
            .dispatcher(RoundRobinDispatcher::new(work_queues.clone())?)
            .listener(PoisonBroadcaster::new(work_queues.clone()))
            .on_error(config.on_error)
            .build_execution()?,
    );

    for (i, queue) in work_queues.into_iter().enumerate() {
        let name = format!("worker-job{}", i + 1);
        jobs.push(
            Job::builder(name.clone())
                .source(QueueSource::new(queue).with_read_timeout(config.read_timeout))
                .stage(LoggingProcessor::new(name))
                .sink(QueueSink::new(join_queue.clone()))
                .listener(PoisonBroadcaster::new(vec![join_queue.clone()]))
                .on_error(config.on_error)
                .build_execution()?,
        );
    }

    jobs.push(
        Job::builder("join-job")
            .source(
                QueueSource::with_expected_poisons(join_queue, WORKERS)
                    .with_read_timeout(config.read_timeout),
            )
            .sink(StandardOutputSink::stdout())
            .on_error(config.on_error)
            .build_execution()?,
    );

    let pool = config.pool_for(jobs.len());
    let reports = execute(pool, jobs)?;

    Ok(RunSummary {
        jobs: reports,
        merged: None,
        headline: None,
    })
}

fn tweet_job(
    name: &str,
    file: &Path,
    filter: Option<RecordNumberFilter>,
    config: &RecordflowConfig,
) -> Result<Box<dyn Execution>> {
    let mut builder = Job::builder(name).source(DelimitedSource::<Tweet>::new(file));
    if let Some(filter) = filter {
        builder = builder.stage(filter);
    }
    Ok(builder
        .stage(LoggingProcessor::new(name))
        .on_error(config.on_error)
        .build_execution()?)
}

fn merged_summary(reports: Vec<Report>) -> Result<RunSummary> {
    let merged = merge_all(&reports).context("Failed to merge job reports")?;
    Ok(RunSummary {
        jobs: reports,
        merged: Some(merged),
        headline: None,
    })
}

/// One independent job per input file; the reports are merged
pub fn run_split(config: &RecordflowConfig, files: &[PathBuf]) -> Result<RunSummary> {
    let jobs = files
        .iter()
        .enumerate()
        .map(|(i, file)| tweet_job(&format!("worker-job{}", i + 1), file, None, config))
        .collect::<Result<Vec<_>>>()?;

    merged_summary(execute(config.pool, jobs)?)
}

/// Two jobs over the same file, each keeping one side of a record-number split
pub fn run_filter(config: &RecordflowConfig, file: &Path, split_at: u64) -> Result<RunSummary> {
    let jobs = vec![
        tweet_job(
            "worker-job1",
            file,
            Some(RecordNumberFilter::GreaterThan(split_at)),
            config,
        )?,
        tweet_job(
            "worker-job2",
            file,
            Some(RecordNumberFilter::LowerThan(split_at + 1)),
            config,
        )?,
    ];

    merged_summary(execute(config.pool, jobs)?)
}
