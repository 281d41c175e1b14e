//! Metric records
//!
//! A record is one plaintext metric sample in the classic Graphite line
//! format: `path value timestamp`. Fields are separated by runs of ASCII
//! whitespace on the way in; the serialized form always uses single spaces
//! and a trailing newline.
//!
//! # Design
//!
//! - **Value stays text**: the sample value is carried verbatim and never
//!   reparsed as a number, so relaying cannot reformat or lose precision.
//! - **Canonical form**: `serialize(parse(line))` equals `line` with internal
//!   whitespace runs collapsed and trailing whitespace stripped.
//! - **Ingest instant**: every record carries the monotonic instant it was
//!   parsed, used downstream for the processing-latency histogram.

use std::fmt;
use std::time::Instant;

use thiserror::Error;

/// Errors from parsing a metric line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Wrong number of whitespace-separated fields
    #[error("expected 3 fields, got {0}")]
    FieldCount(usize),

    /// Timestamp is not a non-negative integer that fits 64 bits
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
}

/// A single parsed metric sample
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Dotted metric name. Never empty, never contains whitespace.
    pub path: String,

    /// Sample value as received. Opaque text, free of whitespace.
    pub value: String,

    /// Seconds since epoch.
    pub timestamp: u64,

    /// Monotonic instant at ingest.
    pub received_at: Instant,
}

impl Record {
    /// Parse one text line into a record.
    ///
    /// The line must split on whitespace into exactly three fields:
    /// path, value, timestamp. The value is not validated beyond being a
    /// whitespace-free token; the timestamp must parse as `u64`.
    pub fn parse(line: &str) -> Result<Record, ParseError> {
        let mut fields = line.split_whitespace();

        let (path, value, ts) = match (fields.next(), fields.next(), fields.next()) {
            (Some(p), Some(v), Some(t)) => (p, v, t),
            (a, b, _) => {
                return Err(ParseError::FieldCount(
                    a.is_some() as usize + b.is_some() as usize,
                ))
            }
        };

        let extra = fields.count();
        if extra != 0 {
            return Err(ParseError::FieldCount(3 + extra));
        }

        let timestamp = ts
            .parse::<u64>()
            .map_err(|_| ParseError::Timestamp(ts.to_string()))?;

        Ok(Record {
            path: path.to_string(),
            value: value.to_string(),
            timestamp,
            received_at: Instant::now(),
        })
    }

    /// Canonical wire form: `path SP value SP timestamp LF`.
    pub fn serialize(&self) -> String {
        format!("{} {} {}\n", self.path, self.value, self.timestamp)
    }

    /// Serialized length in bytes, without allocating.
    pub fn serialized_len(&self) -> usize {
        // digits of timestamp + 2 spaces + newline
        let ts_digits = if self.timestamp == 0 {
            1
        } else {
            self.timestamp.ilog10() as usize + 1
        };
        self.path.len() + self.value.len() + ts_digits + 3
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.value, self.timestamp)
    }
}
