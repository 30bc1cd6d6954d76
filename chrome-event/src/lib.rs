//! Trace event record and its two serialized forms.
//!
//! The pipeline speaks the Chrome Trace Event Format, the trace data
//! representation processed by the Chrome Trace Viewer (chrome://tracing).
//! Only complete events (phase `X`) are produced: a closed time interval
//! described by a start timestamp plus a duration, both in microseconds.
//!
//! Two serializations live here:
//! - [`ChromeEvent::to_json`], the object written into the output file's
//!   `traceEvents` array;
//! - [`ChromeEvent::to_wire`] / [`ChromeEvent::from_wire`], the line-oriented
//!   body format carried inside IPC messages between producer and collector.
//!   This is an internal sub-format, independent of the final JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opening of the trace file, written once before the first event.
pub const TRACE_PREAMBLE: &str = r#"{"traceEvents":["#;

/// Closing of the trace file, written once at teardown.
pub const TRACE_SUFFIX: &str = r#"],"displayTimeUnit":"ns"}"#;

#[derive(Error, Debug)]
pub enum EventParseError {
    #[error("missing field: {0}")]
    Missing(&'static str),
    #[error("invalid {field}: {value:?}")]
    Invalid {
        field: &'static str,
        value: String,
    },
}

/// Event phase. The pipeline only emits complete events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Complete event combining begin and end into a single record with a
    /// duration, designated `X` in the trace format.
    #[serde(rename = "X")]
    Complete,
}

impl Phase {
    pub fn as_char(self) -> char {
        match self {
            Phase::Complete => 'X',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'X' => Some(Phase::Complete),
            _ => None,
        }
    }
}

/// A single complete trace event.
///
/// Field order matters: the JSON rendering emits fields in declaration
/// order, `name, cat, ph, ts, pid, tid, dur`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromeEvent {
    /// Display name of the event in the trace viewer.
    pub name: String,
    /// Category, used for filtering in the trace viewer UI.
    pub cat: String,
    /// Event phase.
    pub ph: Phase,
    /// Start timestamp in microseconds.
    pub ts: i64,
    /// Process that produced the event.
    pub pid: i32,
    /// Thread that produced the event.
    pub tid: i32,
    /// Duration in microseconds; `end_ts - ts` from the same monotonic clock.
    pub dur: i64,
}

impl ChromeEvent {
    /// Renders the event as one JSON object for the `traceEvents` array.
    ///
    /// Embedded `"` characters in the name are replaced with `'` before
    /// emission; names are assumed otherwise JSON-safe.
    pub fn to_json(&self) -> serde_json::Result<String> {
        if self.name.contains('"') {
            let mut sanitized = self.clone();
            sanitized.name = self.name.replace('"', "'");
            serde_json::to_string(&sanitized)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Renders the event in the IPC body format: `name` and `cat` each on
    /// their own line, then the numeric fields whitespace-separated.
    pub fn to_wire(&self) -> String {
        format!(
            "{}\n{}\n{} {} {} {} {}\n",
            self.name,
            self.cat,
            self.ph.as_char(),
            self.ts,
            self.pid,
            self.tid,
            self.dur
        )
    }

    /// Parses an event from the IPC body format.
    pub fn from_wire(input: &str) -> Result<Self, EventParseError> {
        let mut lines = input.lines();
        let name = lines.next().ok_or(EventParseError::Missing("name"))?;
        let cat = lines.next().ok_or(EventParseError::Missing("cat"))?;
        let numeric = lines.next().ok_or(EventParseError::Missing("ph"))?;

        let mut fields = numeric.split_whitespace();
        let ph = fields.next().ok_or(EventParseError::Missing("ph"))?;
        let ph = match ph.chars().next() {
            Some(c) if ph.len() == 1 => {
                Phase::from_char(c).ok_or_else(|| invalid("ph", ph))?
            }
            _ => return Err(invalid("ph", ph)),
        };

        Ok(ChromeEvent {
            name: name.to_string(),
            cat: cat.to_string(),
            ph,
            ts: parse_field(&mut fields, "ts")?,
            pid: parse_field(&mut fields, "pid")?,
            tid: parse_field(&mut fields, "tid")?,
            dur: parse_field(&mut fields, "dur")?,
        })
    }
}

fn invalid(field: &'static str, value: &str) -> EventParseError {
    EventParseError::Invalid {
        field,
        value: value.to_string(),
    }
}

fn parse_field<'a, T: std::str::FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<T, EventParseError> {
    let raw = fields.next().ok_or(EventParseError::Missing(name))?;
    raw.parse().map_err(|_| invalid(name, raw))
}
