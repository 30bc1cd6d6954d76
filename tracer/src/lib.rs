//! Scoped-timer instrumentation and its export sinks.
//!
//! A [`TraceScope`] measures a code region and hands the finished event to
//! an [`Exporter`]. Exporters are plain values constructed by the
//! composition root (usually `main`) and shared by reference; one sink per
//! process is a usage convention, not a hidden global.
//!
//! Tracing is best-effort by contract: whatever an exporter returns, the
//! scope swallows it at the exit boundary so instrumentation can never
//! change the traced program's control flow.

use std::path::PathBuf;

use chrome_event::ChromeEvent;
use thiserror::Error;

pub mod file_exporter;
pub mod ipc_exporter;
pub mod scope;
pub mod timestamp;

pub use file_exporter::FileExporter;
pub use ipc_exporter::IpcExporter;
pub use scope::TraceScope;
pub use timestamp::{current_pid, current_tid, unique_timestamp};

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("failed to open trace output file {}: {source}", .path.display())]
    Resource {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Transport(#[from] transport::TransportError),
    #[error("failed to render event: {0}")]
    Format(#[from] serde_json::Error),
    #[error("failed to write trace output: {0}")]
    Write(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TracerError>;

/// Sink for completed trace events.
///
/// Implementations serialize access internally; `push_trace` may be called
/// from any thread. Events arrive by value and are not reused.
pub trait Exporter {
    fn push_trace(&self, event: ChromeEvent) -> Result<()>;
}
