use std::fs::{File, OpenOptions};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, warn};

use crate::{Result, TransportError};

/// What the grace-period probe observed on the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeekOutcome {
    /// A writer is attached and data is (or will be) available.
    NewData,
    /// Nothing arrived within the timeout.
    Timeout,
    /// The pipe reported hang-up or the poll itself failed.
    Closed,
}

/// Readiness probe over a second, independent descriptor on the pipe.
///
/// The probe must never read: the server's primary handle is the sole
/// consumer, and stealing bytes here would desynchronize its stream. Only
/// `POLLIN` readiness is tested, with a bounded timeout, so the server can
/// absorb races with late-starting producers before shutting down.
#[derive(Debug)]
pub struct PipePeeker {
    pipe: File,
    timeout: Duration,
}

impl PipePeeker {
    /// Opens the non-blocking read descriptor used for polling.
    ///
    /// Non-blocking is what makes a second read-only open of a FIFO with no
    /// writers return immediately instead of blocking like the primary one.
    pub fn open(path: &Path, timeout: Duration) -> Result<Self> {
        let pipe = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(PipePeeker { pipe, timeout })
    }

    /// Polls for incoming data without consuming any bytes.
    pub fn peek(&self) -> PeekOutcome {
        let timeout_ms = u16::try_from(self.timeout.as_millis()).unwrap_or(u16::MAX);
        debug!(timeout_ms = timeout_ms, "waiting for new data on pipe");

        let mut fds = [PollFd::new(self.pipe.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Err(e) => {
                warn!(error = %e, "poll failed during grace period");
                PeekOutcome::Closed
            }
            Ok(0) => {
                debug!("no new clients before timeout");
                PeekOutcome::Timeout
            }
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or(PollFlags::empty());
                if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR) {
                    debug!("pipe closed during grace period");
                    PeekOutcome::Closed
                } else {
                    debug!("new data detected, continuing");
                    PeekOutcome::NewData
                }
            }
        }
    }
}
