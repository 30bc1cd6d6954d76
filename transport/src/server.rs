use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use protocol::{Message, MessageKind};
use tracing::{debug, info, warn};

use crate::peeker::{PeekOutcome, PipePeeker};
use crate::{Result, TransportError};

/// How long the server waits for late producers after the last known one
/// disconnects.
const DEFAULT_GRACE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Producer pids considered live, inferred from the message stream.
///
/// A FIFO carries no connection state, so liveness is application-level:
/// first contact from a pid inserts it, a stop message removes it. This set
/// is the only state the server carries across reads.
#[derive(Debug, Default)]
pub struct ClientSet {
    active: HashSet<i32>,
}

impl ClientSet {
    /// Applies one decoded message's bookkeeping.
    pub fn observe(&mut self, msg: &Message) {
        if self.active.insert(msg.pid) {
            info!(pid = msg.pid, "new client");
        }
        if msg.kind == MessageKind::Stop {
            self.active.remove(&msg.pid);
            info!(
                pid = msg.pid,
                remaining = self.active.len(),
                "client disconnected"
            );
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.active.contains(&pid)
    }
}

/// Collector-side reader of the named pipe.
///
/// Lifecycle: [`PipeServer::init`] creates and opens the FIFO, then
/// [`PipeServer::run`] loops reading one message at a time until its live
/// producer set drains and the grace period passes without new arrivals.
/// Read order over a FIFO is arrival order across all producers, and the
/// loop is single-threaded, so handler invocation order is arrival order.
pub struct PipeServer {
    path: PathBuf,
    pipe: Option<BufReader<File>>,
    grace_timeout: Duration,
}

impl PipeServer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PipeServer {
            path: path.into(),
            pipe: None,
            grace_timeout: DEFAULT_GRACE_TIMEOUT,
        }
    }

    /// Overrides the grace timeout; tests use short ones.
    pub fn with_grace_timeout(mut self, timeout: Duration) -> Self {
        self.grace_timeout = timeout;
        self
    }

    /// Creates the FIFO if absent and opens it for reading.
    ///
    /// A pre-existing FIFO at the path is fine (a previous collector may
    /// not have cleaned up, or a client raced us to creation). Any other
    /// creation failure, or an open failure, is fatal. The open blocks
    /// until at least one writer attaches.
    pub fn init(&mut self) -> Result<()> {
        match mkfifo(&self.path, Mode::from_bits_truncate(0o666)) {
            Ok(()) => debug!(path = %self.path.display(), "created fifo"),
            Err(Errno::EEXIST) => {}
            Err(source) => {
                return Err(TransportError::CreateFifo {
                    path: self.path.clone(),
                    source,
                })
            }
        }

        let pipe = File::open(&self.path).map_err(|source| TransportError::Open {
            path: self.path.clone(),
            source,
        })?;
        self.pipe = Some(BufReader::new(pipe));
        info!(path = %self.path.display(), "server listening on pipe");
        Ok(())
    }

    /// Runs the read loop until no producers remain.
    ///
    /// `message_handler` receives every data message in arrival order; stop
    /// messages only update the client set. A failed read does not kill
    /// the server: a FIFO reader observes EOF whenever all writers
    /// momentarily close, so the pipe is reopened and the loop continues.
    /// Once the client set drains, a bounded peek on a second descriptor
    /// decides between waiting out a late producer and shutting down.
    /// `stop_handler` is invoked exactly once, before the FIFO is closed
    /// and unlinked.
    pub fn run<M, S>(&mut self, mut message_handler: M, mut stop_handler: S) -> Result<()>
    where
        M: FnMut(&Message),
        S: FnMut(),
    {
        if self.pipe.is_none() {
            self.init()?;
        }
        let mut clients = ClientSet::default();

        loop {
            let msg = match self.read_message() {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "error reading message, reopening pipe");
                    self.init()?;
                    continue;
                }
            };

            if msg.kind == MessageKind::Data {
                message_handler(&msg);
            }
            clients.observe(&msg);

            if clients.is_empty() && !self.wait_for_new_clients() {
                break;
            }
        }

        info!("no active clients remaining, stopping server");
        stop_handler();
        self.shutdown();
        Ok(())
    }

    fn read_message(&mut self) -> Result<Message> {
        match self.pipe.as_mut() {
            Some(pipe) => protocol::decode(pipe).map_err(TransportError::Read),
            None => Err(TransportError::NotInitialized),
        }
    }

    /// Grace period: peek for data on a second descriptor without touching
    /// the primary reader. Returns whether to keep listening.
    fn wait_for_new_clients(&self) -> bool {
        let peeker = match PipePeeker::open(&self.path, self.grace_timeout) {
            Ok(peeker) => peeker,
            Err(e) => {
                warn!(error = %e, "failed to open pipe for grace-period peek");
                return false;
            }
        };
        match peeker.peek() {
            PeekOutcome::NewData => true,
            PeekOutcome::Timeout | PeekOutcome::Closed => false,
        }
    }

    fn shutdown(&mut self) {
        self.pipe = None;
        if let Err(source) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %source, "failed to unlink fifo");
        } else {
            debug!(path = %self.path.display(), "unlinked fifo");
        }
    }
}
