use regex::Regex;
use std::fmt::Display;
use std::path::Path;
use tracing::info;

use super::{StageResult, Transform};
use crate::error::{BuildError, TransformError};
use crate::record::Record;
use crate::report::ResultValue;

/// Filter stage implementation: keeps records for which the predicate holds
pub struct FilterStage<F> {
    keep: F,
}

impl<F> FilterStage<F> {
    pub fn new(keep: F) -> Self {
        Self { keep }
    }
}

impl<P, F> Transform<P> for FilterStage<F>
where
    F: FnMut(&Record<P>) -> bool + Send,
{
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        if (self.keep)(&record) {
            Ok(StageResult::Emit(record))
        } else {
            Ok(StageResult::Skip)
        }
    }
}

/// Map stage implementation: record-to-record, may fail
pub struct MapStage<F> {
    map: F,
}

impl<F> MapStage<F> {
    pub fn new(map: F) -> Self {
        Self { map }
    }
}

impl<P, F> Transform<P> for MapStage<F>
where
    F: FnMut(Record<P>) -> Result<Record<P>, TransformError> + Send,
{
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        (self.map)(record).map(StageResult::Emit)
    }
}

/// Keeps lines matching a pattern, like `grep`
pub struct GrepFilter {
    pattern: Regex,
}

impl GrepFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&regex::escape(pattern))?,
        })
    }
}

impl<P: AsRef<str>> Transform<P> for GrepFilter {
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        if self.pattern.is_match(record.payload().as_ref()) {
            Ok(StageResult::Emit(record))
        } else {
            Ok(StageResult::Skip)
        }
    }
}

/// Drops the first record of its source, e.g. a CSV header line
#[derive(Debug, Default)]
pub struct HeaderRecordFilter;

impl<P> Transform<P> for HeaderRecordFilter {
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        if record.header().sequence_number() == 1 {
            Ok(StageResult::Skip)
        } else {
            Ok(StageResult::Emit(record))
        }
    }
}

/// Filters records by sequence number
#[derive(Debug, Clone, Copy)]
pub enum RecordNumberFilter {
    /// Drop records numbered strictly above the bound
    GreaterThan(u64),
    /// Drop records numbered strictly below the bound
    LowerThan(u64),
}

impl<P> Transform<P> for RecordNumberFilter {
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        let n = record.header().sequence_number();
        let drop = match *self {
            RecordNumberFilter::GreaterThan(bound) => n > bound,
            RecordNumberFilter::LowerThan(bound) => n < bound,
        };
        if drop {
            Ok(StageResult::Skip)
        } else {
            Ok(StageResult::Emit(record))
        }
    }
}

/// Drops paths whose extension is in the list (with or without the leading dot)
pub struct FileExtensionFilter {
    extensions: Vec<String>,
}

impl FileExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }
}

impl<P: AsRef<Path>> Transform<P> for FileExtensionFilter {
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        let excluded = record
            .payload()
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if excluded {
            Ok(StageResult::Skip)
        } else {
            Ok(StageResult::Emit(record))
        }
    }
}

/// Keeps the n-th (1-based) field of a delimited line, like `cut -d, -fN`
pub struct CutProcessor {
    delimiter: String,
    field: usize,
}

impl CutProcessor {
    /// Fails for field 0; fields are numbered from 1
    pub fn new(delimiter: impl Into<String>, field: usize) -> Result<Self, BuildError> {
        if field == 0 {
            return Err(BuildError::InvalidStage(
                "cut fields are numbered from 1".to_string(),
            ));
        }
        Ok(Self {
            delimiter: delimiter.into(),
            field,
        })
    }
}

impl Transform<String> for CutProcessor {
    fn apply(&mut self, record: Record<String>) -> Result<StageResult<String>, TransformError> {
        let seq = record.header().sequence_number();
        let field = self.field;
        let cut = record
            .payload()
            .split(self.delimiter.as_str())
            .nth(field - 1)
            .map(str::to_string)
            .ok_or_else(|| TransformError::new(seq, format!("line has no field {}", field)))?;
        Ok(StageResult::Emit(record.map_payload(|_| cut)))
    }
}

/// Counts whitespace-separated words across every record it sees
#[derive(Debug, Default)]
pub struct WordCountProcessor {
    words: u64,
}

impl<P: AsRef<str>> Transform<P> for WordCountProcessor {
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        self.words += record.payload().as_ref().split_whitespace().count() as u64;
        Ok(StageResult::Emit(record))
    }

    fn result(&self) -> Option<ResultValue> {
        Some(ResultValue::Count(self.words))
    }
}

/// Logs each record it passes through, tagged with a worker name
pub struct LoggingProcessor {
    worker: String,
}

impl LoggingProcessor {
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
        }
    }
}

impl<P: Display> Transform<P> for LoggingProcessor {
    fn apply(&mut self, record: Record<P>) -> Result<StageResult<P>, TransformError> {
        info!(
            worker = %self.worker,
            seq = record.header().sequence_number(),
            "processing {}",
            record.payload()
        );
        Ok(StageResult::Emit(record))
    }
}
