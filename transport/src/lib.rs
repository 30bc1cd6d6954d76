//! Named-pipe transport between trace producers and the collector.
//!
//! A FIFO has no connection concept: any number of writers can open the
//! path, their writes interleave at message granularity, and the reader
//! cannot tell who is attached from OS state alone. The pieces here split
//! that problem up:
//!
//! - [`PipeClient`] is the producer side: wait for the pipe to exist, open
//!   it for writing, push framed messages.
//! - [`PipeServer`] is the collector side: create and read the pipe, track
//!   which producer pids are live from the messages themselves, and decide
//!   when everyone is gone.
//! - [`PipePeeker`] is the server's grace-period probe: a second,
//!   non-consuming descriptor polled for readiness so the server can wait a
//!   bounded time for late producers without racing its own reader.

use std::path::PathBuf;

use thiserror::Error;

pub mod client;
pub mod peeker;
pub mod server;

pub use client::PipeClient;
pub use peeker::{PeekOutcome, PipePeeker};
pub use server::{ClientSet, PipeServer};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to create fifo at {}: {source}", .path.display())]
    CreateFifo {
        path: PathBuf,
        source: nix::Error,
    },
    #[error("failed to open pipe {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read message: {0}")]
    Read(#[from] protocol::ProtocolError),
    #[error("failed to write message: {0}")]
    Write(#[source] std::io::Error),
    #[error("server pipe is not open")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, TransportError>;
