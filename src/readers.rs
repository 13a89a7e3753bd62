use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::SourceError;
use crate::pipeline::RecordSource;
use crate::queue::RecordQueue;
use crate::record::{Header, Record, RecordMessage};

/// Hands out headers with sequence numbers 1, 2, 3, ... for one source
#[derive(Debug, Clone)]
struct Sequencer {
    source_name: String,
    next: u64,
}

impl Sequencer {
    fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            next: 1,
        }
    }

    fn header(&mut self) -> Header {
        self.header_at(Utc::now())
    }

    fn header_at(&mut self, timestamp: DateTime<Utc>) -> Header {
        let header = Header::with_timestamp(self.next, self.source_name.as_str(), timestamp);
        self.next += 1;
        header
    }

    fn wrap<P>(&mut self, payload: P) -> Record<P> {
        Record::new(self.header(), payload)
    }

    /// Renumber a record from another source, keeping its creation time
    fn rewrap<P>(&mut self, record: Record<P>) -> Record<P> {
        let (header, payload) = record.into_parts();
        Record::new(self.header_at(header.timestamp()), payload)
    }
}

/// In-memory source over any collection of payloads
pub struct IterSource<P> {
    sequencer: Sequencer,
    items: std::vec::IntoIter<P>,
}

impl<P> IterSource<P> {
    pub fn new(name: impl Into<String>, items: impl IntoIterator<Item = P>) -> Self {
        Self {
            sequencer: Sequencer::new(name),
            items: items.into_iter().collect::<Vec<_>>().into_iter(),
        }
    }
}

impl<P: Send> RecordSource<P> for IterSource<P> {
    fn name(&self) -> &str {
        &self.sequencer.source_name
    }

    fn next_record(&mut self) -> Result<Option<Record<P>>, SourceError> {
        Ok(self.items.next().map(|p| self.sequencer.wrap(p)))
    }
}

/// One record per line of a text file, line terminators stripped
pub struct LineSource {
    path: PathBuf,
    sequencer: Sequencer,
    reader: Option<Box<dyn BufRead + Send>>,
    buffer_size: usize,
}

impl LineSource {
    /// Create a new LineSource with default buffer size (256KB for better throughput)
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_buffer_size(path, 256 * 1024)
    }

    pub fn with_buffer_size(path: impl AsRef<Path>, buffer_size: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            sequencer: Sequencer::new(display_name(&path)),
            path,
            reader: None,
            buffer_size,
        }
    }
}

impl RecordSource<String> for LineSource {
    fn name(&self) -> &str {
        &self.sequencer.source_name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|e| SourceError::open(self.name(), e))?;
        self.reader = Some(Box::new(BufReader::with_capacity(self.buffer_size, file)));
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record<String>>, SourceError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(SourceError::read(
                self.sequencer.source_name.as_str(),
                "source is not open",
            ));
        };

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let trimmed_len = line.trim_end_matches(&['\r', '\n'][..]).len();
                line.truncate(trimmed_len);
                Ok(Some(self.sequencer.wrap(line)))
            }
            Err(e) => Err(SourceError::read(self.sequencer.source_name.as_str(), e)),
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Rows of a delimited file deserialized into `T`; the first row names the fields
pub struct DelimitedSource<T> {
    path: PathBuf,
    delimiter: u8,
    sequencer: Sequencer,
    rows: Option<csv::DeserializeRecordsIntoIter<File, T>>,
}

impl<T> DelimitedSource<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_delimiter(path, b',')
    }

    pub fn with_delimiter(path: impl AsRef<Path>, delimiter: u8) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            sequencer: Sequencer::new(display_name(&path)),
            path,
            delimiter,
            rows: None,
        }
    }
}

impl<T: DeserializeOwned + Send> RecordSource<T> for DelimitedSource<T> {
    fn name(&self) -> &str {
        &self.sequencer.source_name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| SourceError::open(self.sequencer.source_name.as_str(), e))?;
        self.rows = Some(reader.into_deserialize());
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record<T>>, SourceError> {
        let Some(rows) = self.rows.as_mut() else {
            return Err(SourceError::read(
                self.sequencer.source_name.as_str(),
                "source is not open",
            ));
        };
        match rows.next() {
            None => Ok(None),
            Some(Ok(row)) => Ok(Some(self.sequencer.wrap(row))),
            Some(Err(e)) => Err(SourceError::read(self.sequencer.source_name.as_str(), e)),
        }
    }

    fn close(&mut self) {
        self.rows = None;
    }
}

/// One record per regular file in a directory, in file-name order
pub struct DirectorySource {
    directory: PathBuf,
    sequencer: Sequencer,
    files: std::vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref().to_path_buf();
        Self {
            sequencer: Sequencer::new(display_name(&directory)),
            directory,
            files: Vec::new().into_iter(),
        }
    }
}

impl RecordSource<PathBuf> for DirectorySource {
    fn name(&self) -> &str {
        &self.sequencer.source_name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let entries = std::fs::read_dir(&self.directory)
            .map_err(|e| SourceError::open(self.sequencer.source_name.as_str(), e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::open(self.sequencer.source_name.as_str(), e))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        debug!(directory = %self.directory.display(), files = files.len(), "directory listed");
        self.files = files.into_iter();
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record<PathBuf>>, SourceError> {
        Ok(self.files.next().map(|p| self.sequencer.wrap(p)))
    }
}

/// Consumer side of a [`RecordQueue`].
///
/// Poison messages never reach the job: each one is counted, and end-of-input
/// is reported once as many have arrived as the queue has producers.
pub struct QueueSource<P> {
    queue: RecordQueue<P>,
    expected_poisons: usize,
    poisons_seen: usize,
    read_timeout: Option<Duration>,
    sequencer: Sequencer,
}

impl<P> QueueSource<P> {
    /// Reader for a queue with a single producer
    pub fn new(queue: RecordQueue<P>) -> Self {
        Self::with_expected_poisons(queue, 1)
    }

    /// Reader for a join queue fed by `producers` producers
    pub fn with_expected_poisons(queue: RecordQueue<P>, producers: usize) -> Self {
        Self {
            sequencer: Sequencer::new(queue.name()),
            queue,
            expected_poisons: producers,
            poisons_seen: 0,
            read_timeout: None,
        }
    }

    /// Fail the read instead of blocking forever when producers go silent
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn poisons_seen(&self) -> usize {
        self.poisons_seen
    }

    pub fn expected_poisons(&self) -> usize {
        self.expected_poisons
    }

    fn is_exhausted(&self) -> bool {
        self.poisons_seen >= self.expected_poisons
    }

    fn receive(&self) -> Result<RecordMessage<P>, SourceError> {
        match self.read_timeout {
            None => Ok(self.queue.recv()),
            Some(timeout) => self.queue.recv_timeout(timeout).ok_or_else(|| {
                SourceError::read(
                    self.queue.name(),
                    format!(
                        "no record within {} ({} of {} producers finished)",
                        humantime::format_duration(timeout),
                        self.poisons_seen,
                        self.expected_poisons
                    ),
                )
            }),
        }
    }
}

impl<P: Send> RecordSource<P> for QueueSource<P> {
    fn name(&self) -> &str {
        self.queue.name()
    }

    fn open(&mut self) -> Result<(), SourceError> {
        if self.expected_poisons == 0 {
            return Err(SourceError::open(
                self.queue.name(),
                "a queue reader must expect at least one producer",
            ));
        }
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record<P>>, SourceError> {
        while !self.is_exhausted() {
            match self.receive()? {
                RecordMessage::Poison => {
                    self.poisons_seen += 1;
                    trace!(
                        queue = self.queue.name(),
                        seen = self.poisons_seen,
                        expected = self.expected_poisons,
                        "poison record received"
                    );
                }
                RecordMessage::Record(record) => return Ok(Some(self.sequencer.rewrap(record))),
            }
        }
        Ok(None)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use std::thread;
    use tempfile::{NamedTempFile, TempDir};

    fn drain<P: Send>(source: &mut dyn RecordSource<P>) -> Vec<Record<P>> {
        source.open().unwrap();
        let mut out = Vec::new();
        while let Some(record) = source.next_record().unwrap() {
            out.push(record);
        }
        source.close();
        out
    }

    #[test]
    fn test_iter_source_sequence_numbers() {
        let mut source = IterSource::new("numbers", vec![10, 20, 30]);
        let records = drain(&mut source);
        let seqs: Vec<u64> = records.iter().map(|r| r.header().sequence_number()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(records.iter().all(|r| r.header().source_name() == "numbers"));
    }

    #[test]
    fn test_line_source_reads_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "first\r\nsecond\n\nlast").unwrap();

        let mut source = LineSource::new(file.path());
        let lines: Vec<String> = drain(&mut source).into_iter().map(Record::into_payload).collect();
        assert_eq!(lines, vec!["first", "second", "", "last"]);
    }

    #[test]
    fn test_line_source_missing_file_fails_open() {
        let mut source = LineSource::new("/definitely/not/here.txt");
        assert!(matches!(source.open(), Err(SourceError::Open { .. })));
        assert!(matches!(source.next_record(), Err(SourceError::Read { .. })));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tweet {
        id: u32,
        user: String,
        message: String,
    }

    #[test]
    fn test_delimited_source_maps_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,user,message").unwrap();
        writeln!(file, "1,foo,hello").unwrap();
        writeln!(file, "2,bar, hi there ").unwrap();

        let mut source: DelimitedSource<Tweet> = DelimitedSource::new(file.path());
        let tweets = drain(&mut source);
        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[1].header().sequence_number(), 2);
        assert_eq!(
            tweets[1].payload(),
            &Tweet {
                id: 2,
                user: "bar".into(),
                message: "hi there".into()
            }
        );
    }

    #[test]
    fn test_delimited_source_bad_row_is_read_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,user,message").unwrap();
        writeln!(file, "x,foo,hello").unwrap();

        let mut source: DelimitedSource<Tweet> = DelimitedSource::new(file.path());
        source.open().unwrap();
        assert!(matches!(source.next_record(), Err(SourceError::Read { .. })));
    }

    #[test]
    fn test_directory_source_lists_files_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b.xml", "a.csv", "c.log"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut source = DirectorySource::new(dir.path());
        let names: Vec<String> = drain(&mut source)
            .into_iter()
            .map(|r| r.into_payload().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.xml", "c.log"]);
    }

    #[test]
    fn test_queue_source_stops_at_poison() {
        let queue = RecordQueue::new("work");
        for n in 1..=3u64 {
            queue.push(Record::new(Header::new(n, "producer"), n * 10));
        }
        queue.push_poison();

        let mut source = QueueSource::new(queue.clone());
        let records = drain(&mut source);
        assert_eq!(records.iter().map(|r| *r.payload()).collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(records[0].header().source_name(), "work");
        assert_eq!(source.poisons_seen(), 1);
        assert!(queue.is_empty());

        // Exhausted readers never block again
        assert_eq!(source.next_record().unwrap(), None);
    }

    #[test]
    fn test_queue_source_keeps_original_timestamp() {
        use chrono::TimeZone;
        let created = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let queue = RecordQueue::new("work");
        queue.push(Record::new(Header::with_timestamp(7, "producer", created), "late"));
        queue.push_poison();

        let mut source = QueueSource::new(queue);
        let records = drain(&mut source);
        assert_eq!(records[0].header().timestamp(), created);
        assert_eq!(records[0].header().sequence_number(), 1);
        assert_eq!(records[0].header().source_name(), "work");
    }

    #[test]
    fn test_queue_source_waits_for_every_producer() {
        let join = RecordQueue::new("join");
        let mut handles = Vec::new();
        for producer in 0..3u64 {
            let q = join.clone();
            handles.push(thread::spawn(move || {
                for n in 1..=4 {
                    q.push(Record::new(Header::new(n, format!("p{producer}")), producer * 100 + n));
                }
                q.push_poison();
            }));
        }

        let mut source = QueueSource::with_expected_poisons(join.clone(), 3);
        let records = drain(&mut source);
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(records.len(), 12);
        assert_eq!(source.poisons_seen(), 3);
        let seqs: Vec<u64> = records.iter().map(|r| r.header().sequence_number()).collect();
        assert_eq!(seqs, (1..=12).collect::<Vec<_>>());
        assert!(join.is_empty());
    }

    #[test]
    fn test_queue_source_leaves_later_data_unread() {
        let queue = RecordQueue::new("q");
        queue.push(Record::new(Header::new(1, "p"), 1u8));
        queue.push_poison();
        queue.push(Record::new(Header::new(2, "p"), 2u8));

        let mut source = QueueSource::new(queue.clone());
        assert_eq!(drain(&mut source).len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_source_timeout() {
        let queue: RecordQueue<u8> = RecordQueue::new("silent");
        let mut source =
            QueueSource::new(queue).with_read_timeout(Some(Duration::from_millis(20)));
        source.open().unwrap();
        assert!(matches!(source.next_record(), Err(SourceError::Read { .. })));
    }

    #[test]
    fn test_queue_source_rejects_zero_producers() {
        let queue: RecordQueue<u8> = RecordQueue::new("q");
        let mut source = QueueSource::with_expected_poisons(queue, 0);
        assert!(matches!(source.open(), Err(SourceError::Open { .. })));
    }
}
