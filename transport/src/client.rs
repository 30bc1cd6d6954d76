use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use protocol::Message;
use tracing::debug;

use crate::{Result, TransportError};

/// How often the client re-checks for the pipe while it does not exist yet.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Producer-side write handle on the named pipe.
pub struct PipeClient {
    path: PathBuf,
    pid: i32,
    pipe: File,
}

impl PipeClient {
    /// Opens the pipe for write-only binary access.
    ///
    /// If the path does not exist yet the call polls for it indefinitely on
    /// a fixed interval: producer and collector startup order is
    /// unspecified, so waiting forever is the intended behavior, not a
    /// missing timeout. Once the path exists the open is attempted exactly
    /// once; a failure at that point is fatal to the client.
    pub fn connect(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            debug!(path = %path.display(), "pipe not found, waiting for collector");
            while !path.exists() {
                thread::sleep(RETRY_INTERVAL);
            }
        }

        let pipe = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let pid = std::process::id() as i32;
        debug!(path = %path.display(), pid = pid, "connected to pipe");

        Ok(PipeClient { path, pid, pipe })
    }

    /// Writes one encoded message.
    ///
    /// Write failures are returned without retrying; whether to drop the
    /// message or abort is the caller's call.
    pub fn send(&mut self, msg: &Message) -> Result<()> {
        let encoded = protocol::encode(msg);
        self.pipe
            .write_all(&encoded)
            .map_err(TransportError::Write)
    }

    /// The pid this process stamps onto its messages.
    pub fn pid(&self) -> i32 {
        self.pid
    }
}

impl Drop for PipeClient {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), pid = self.pid, "closing pipe client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::MessageKind;
    use rstest::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[fixture]
    fn fifo_dir() -> TempDir {
        TempDir::new().expect("failed to create temp dir")
    }

    fn make_fifo(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("client_test.pipe");
        nix::unistd::mkfifo(&path, nix::sys::stat::Mode::from_bits_truncate(0o666))
            .expect("failed to create fifo");
        path
    }

    #[rstest]
    fn test_send_is_readable_on_the_other_end(fifo_dir: TempDir) {
        let path = make_fifo(&fifo_dir);

        let reader_path = path.clone();
        let reader = thread::spawn(move || {
            let mut pipe = File::open(reader_path).expect("failed to open fifo for reading");
            protocol::decode(&mut pipe).expect("decode failed")
        });

        let mut client = PipeClient::connect(&path).expect("connect failed");
        client
            .send(&Message::data(client.pid(), b"payload".to_vec()))
            .expect("send failed");
        drop(client);

        let msg = reader.join().expect("reader thread panicked");
        assert_eq!(msg.kind, MessageKind::Data);
        assert_eq!(msg.body, b"payload");
    }

    #[rstest]
    fn test_connect_waits_for_pipe_creation(fifo_dir: TempDir) {
        let path = fifo_dir.path().join("late.pipe");

        let creator_path = path.clone();
        let creator = thread::spawn(move || {
            thread::sleep(Duration::from_millis(250));
            nix::unistd::mkfifo(
                &creator_path,
                nix::sys::stat::Mode::from_bits_truncate(0o666),
            )
            .expect("failed to create fifo");
            let mut sink = Vec::new();
            let mut pipe = File::open(creator_path).expect("failed to open fifo for reading");
            pipe.read_to_end(&mut sink).expect("read failed");
        });

        let client = PipeClient::connect(&path).expect("connect failed");
        drop(client);
        creator.join().expect("creator thread panicked");
    }
}
