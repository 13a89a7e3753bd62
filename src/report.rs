use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MergeError;

/// Name given to a merged report whose inputs came from differently named jobs
pub const MERGED_JOB_NAME: &str = "parallel-jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Completed,
    Failed,
}

/// Value computed by a job, e.g. a word count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Count(u64),
    Text(String),
}

impl ResultValue {
    fn kind(&self) -> &'static str {
        match self {
            ResultValue::Count(_) => "count",
            ResultValue::Text(_) => "text",
        }
    }

    /// Combine two partial results; only counts combine
    pub fn combine(&self, other: &ResultValue) -> Result<ResultValue, MergeError> {
        match (self, other) {
            (ResultValue::Count(a), ResultValue::Count(b)) => Ok(ResultValue::Count(a + b)),
            _ => Err(MergeError::IncompatibleResults {
                left: self.kind(),
                right: other.kind(),
            }),
        }
    }
}

impl std::fmt::Display for ResultValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultValue::Count(n) => write!(f, "{}", n),
            ResultValue::Text(s) => f.write_str(s),
        }
    }
}

/// Summary of one job execution, or of several merged ones.
///
/// Counts partition the input: `read = filtered + errors + success`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub job_name: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub read_count: u64,
    pub filtered_count: u64,
    pub error_count: u64,
    pub success_count: u64,
    pub last_error: Option<String>,
    pub result: Option<ResultValue>,
}

impl Report {
    /// An empty, completed report spanning `[start_time, end_time]`
    pub fn new(job_name: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Completed,
            start_time,
            end_time,
            read_count: 0,
            filtered_count: 0,
            error_count: 0,
            success_count: 0,
            last_error: None,
            result: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Combine two reports. Numeric fields merge associatively and commutatively;
    /// `last_error` prefers `other`.
    pub fn merge(&self, other: &Report) -> Result<Report, MergeError> {
        let result = match (&self.result, &other.result) {
            (Some(a), Some(b)) => Some(a.combine(b)?),
            (a, b) => a.clone().or_else(|| b.clone()),
        };

        let status = if self.is_failed() || other.is_failed() {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };

        let job_name = if self.job_name == other.job_name {
            self.job_name.clone()
        } else {
            MERGED_JOB_NAME.to_string()
        };

        Ok(Report {
            job_name,
            status,
            start_time: self.start_time.min(other.start_time),
            end_time: self.end_time.max(other.end_time),
            read_count: self.read_count + other.read_count,
            filtered_count: self.filtered_count + other.filtered_count,
            error_count: self.error_count + other.error_count,
            success_count: self.success_count + other.success_count,
            last_error: other.last_error.clone().or_else(|| self.last_error.clone()),
            result,
        })
    }

    pub fn format_report(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Job '{}' {}: {} read, {} filtered, {} errors, {} succeeded",
            self.job_name,
            match self.status {
                JobStatus::Completed => "completed",
                JobStatus::Failed => "failed",
            },
            self.read_count,
            self.filtered_count,
            self.error_count,
            self.success_count
        ));

        let duration_ms = self.duration().num_milliseconds().max(0);
        output.push_str(&format!(" in {}ms", duration_ms));

        if duration_ms > 0 && self.read_count > 0 {
            let records_per_sec = (self.read_count as f64 * 1000.0) / duration_ms as f64;
            output.push_str(&format!(" ({:.0} records/s)", records_per_sec));
        }

        if let Some(result) = &self.result {
            output.push_str(&format!("; result = {}", result));
        }

        if let Some(error) = &self.last_error {
            output.push_str(&format!("; last error: {}", error));
        }

        output
    }
}

/// Folds a list of partial reports into one
pub trait ReportMerger {
    fn merge_reports(&self, reports: &[Report]) -> Result<Report, MergeError>;
}

/// Pairwise left fold over [`Report::merge`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReportMerger;

impl ReportMerger for DefaultReportMerger {
    fn merge_reports(&self, reports: &[Report]) -> Result<Report, MergeError> {
        let (first, rest) = reports.split_first().ok_or(MergeError::Empty)?;
        rest.iter()
            .try_fold(first.clone(), |acc, report| acc.merge(report))
    }
}
