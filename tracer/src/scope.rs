use chrome_event::{ChromeEvent, Phase};
use tracing::warn;

use crate::timestamp::{current_pid, current_tid, unique_timestamp};
use crate::Exporter;

const DEFAULT_CATEGORY: &str = "Default";

/// Scoped timer over a code region.
///
/// Construction records the start timestamp; dropping the value records the
/// end, assembles a complete event, and pushes it to the exporter. Drop
/// runs on every exit path out of the enclosing scope, early returns and
/// unwinds included, so a started scope always produces exactly one event.
/// An exporter failure during the handoff is logged and swallowed: tracing
/// must stay invisible to the instrumented program.
pub struct TraceScope<'a> {
    exporter: &'a dyn Exporter,
    name: String,
    cat: String,
    start_ts: i64,
}

impl<'a> TraceScope<'a> {
    pub fn new(exporter: &'a dyn Exporter, name: impl Into<String>) -> Self {
        Self::with_category(exporter, name, DEFAULT_CATEGORY)
    }

    pub fn with_category(
        exporter: &'a dyn Exporter,
        name: impl Into<String>,
        cat: impl Into<String>,
    ) -> Self {
        TraceScope {
            exporter,
            name: name.into(),
            cat: cat.into(),
            start_ts: unique_timestamp(),
        }
    }
}

impl Drop for TraceScope<'_> {
    fn drop(&mut self) {
        let end_ts = unique_timestamp();
        let event = ChromeEvent {
            name: std::mem::take(&mut self.name),
            cat: std::mem::take(&mut self.cat),
            ph: Phase::Complete,
            ts: self.start_ts,
            pid: current_pid(),
            tid: current_tid(),
            dur: end_ts - self.start_ts,
        };
        if let Err(e) = self.exporter.push_trace(event) {
            warn!(error = %e, "failed to export trace event");
        }
    }
}

/// Opens a [`TraceScope`] bound to the rest of the enclosing block.
///
/// ```
/// # use tracer::{trace_scope, Exporter};
/// # fn demo(exporter: &dyn Exporter) {
/// trace_scope!(exporter, "load_assets");
/// trace_scope!(exporter, "decode", "io");
/// # }
/// ```
#[macro_export]
macro_rules! trace_scope {
    ($exporter:expr, $name:expr) => {
        let _trace_scope = $crate::TraceScope::new($exporter, $name);
    };
    ($exporter:expr, $name:expr, $cat:expr) => {
        let _trace_scope = $crate::TraceScope::with_category($exporter, $name, $cat);
    };
}
