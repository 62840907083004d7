use crate::error::{AcceptorError, Result};
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TraceEvent {
    Start,
    Edge,
    Abort,
}

/// One line of a recorded acceptor session, timed relative to the trace start.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct TraceRecord {
    pub at_ms: u64,
    pub event: TraceEvent,
    pub id: Option<String>,
    pub amount: Option<i64>,
}

impl TraceRecord {
    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }
}

/// Reads a pulse trace from a CSV source.
///
/// Whitespace is trimmed and short rows are allowed, so edge lines can be
/// written as just `120,edge`.
pub struct TraceReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TraceReader<R> {
    /// Creates a new `TraceReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields records; a malformed row is an `Err` and the stream goes on.
    pub fn records(self) -> impl Iterator<Item = Result<TraceRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AcceptorError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "at_ms, event, id, amount\n0, start, TRX-1, 15000\n100, edge,,\n250, edge";
        let reader = TraceReader::new(data.as_bytes());
        let results: Vec<Result<TraceRecord>> = reader.records().collect();

        assert_eq!(results.len(), 3);
        let start = results[0].as_ref().unwrap();
        assert_eq!(start.event, TraceEvent::Start);
        assert_eq!(start.id.as_deref(), Some("TRX-1"));
        assert_eq!(start.amount, Some(15_000));

        let edge = results[1].as_ref().unwrap();
        assert_eq!(edge.event, TraceEvent::Edge);
        assert_eq!(edge.id, None);
        assert_eq!(edge.offset(), Duration::from_millis(100));

        let short = results[2].as_ref().unwrap();
        assert_eq!(short.at_ms, 250);
        assert_eq!(short.amount, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "at_ms, event, id, amount\n10, explode,,\nsoon, edge,,\n20, abort,,";
        let reader = TraceReader::new(data.as_bytes());
        let results: Vec<Result<TraceRecord>> = reader.records().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().event, TraceEvent::Abort);
    }
}
