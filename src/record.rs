//! Records flowing between stages, and the message type carried by queues.

use chrono::{DateTime, Utc};

/// Metadata attached to every record by the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    sequence_number: u64,
    source_name: String,
    timestamp: DateTime<Utc>,
}

impl Header {
    pub fn new(sequence_number: u64, source_name: impl Into<String>) -> Self {
        Self::with_timestamp(sequence_number, source_name, Utc::now())
    }

    pub fn with_timestamp(
        sequence_number: u64,
        source_name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        debug_assert!(sequence_number >= 1, "sequence numbers start at 1");
        Self {
            sequence_number,
            source_name: source_name.into(),
            timestamp,
        }
    }

    /// Position within the producing source, starting at 1
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One unit of data: a header plus an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<P> {
    header: Header,
    payload: P,
}

impl<P> Record<P> {
    pub fn new(header: Header, payload: P) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn into_parts(self) -> (Header, P) {
        (self.header, self.payload)
    }

    /// Build a new record with the same header and a transformed payload
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> Record<Q> {
        Record {
            header: self.header,
            payload: f(self.payload),
        }
    }
}

/// Element type of a [`RecordQueue`](crate::queue::RecordQueue).
///
/// End-of-stream travels in-band with the data, so a consumer sees it strictly
/// after every record its producer enqueued before it.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordMessage<P> {
    Record(Record<P>),
    Poison,
}

impl<P> RecordMessage<P> {
    pub fn is_poison(&self) -> bool {
        matches!(self, RecordMessage::Poison)
    }

    pub fn into_record(self) -> Option<Record<P>> {
        match self {
            RecordMessage::Record(record) => Some(record),
            RecordMessage::Poison => None,
        }
    }
}

impl<P> From<Record<P>> for RecordMessage<P> {
    fn from(record: Record<P>) -> Self {
        RecordMessage::Record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_map_payload_keeps_header() {
        let ts = Utc.with_ymd_and_hms(2016, 5, 1, 12, 0, 0).unwrap();
        let record = Record::new(Header::with_timestamp(7, "tweets.csv", ts), "a,b,c".to_string());

        let mapped = record.map_payload(|line| line.split(',').count());

        assert_eq!(*mapped.payload(), 3);
        assert_eq!(mapped.header().sequence_number(), 7);
        assert_eq!(mapped.header().source_name(), "tweets.csv");
        assert_eq!(mapped.header().timestamp(), ts);
    }

    #[test]
    fn test_poison_is_distinguishable_from_data() {
        let data: RecordMessage<i32> = Record::new(Header::new(1, "mem"), 0).into();
        let poison: RecordMessage<i32> = RecordMessage::Poison;

        assert!(!data.is_poison());
        assert!(poison.is_poison());
        assert_eq!(poison.into_record(), None);
        assert_eq!(data.into_record().map(|r| *r.payload()), Some(0));
    }
}
