use std::path::PathBuf;

use chrome_event::ChromeEvent;
use parking_lot::Mutex;
use protocol::Message;
use tracing::{debug, warn};

use crate::{Exporter, Result};
use transport::PipeClient;

/// Sink that forwards events to the collector over the named pipe.
///
/// Construction connects the underlying [`PipeClient`]; if tracing is
/// enabled it is required, so a failed connect is fatal to the producer.
/// Dropping the exporter sends a stop message so the collector retires
/// this pid promptly instead of waiting out its grace period.
pub struct IpcExporter {
    pid: i32,
    client: Mutex<PipeClient>,
}

impl IpcExporter {
    pub fn connect(pipe_path: impl Into<PathBuf>) -> Result<Self> {
        let client = PipeClient::connect(pipe_path)?;
        Ok(IpcExporter {
            pid: client.pid(),
            client: Mutex::new(client),
        })
    }
}

impl Exporter for IpcExporter {
    fn push_trace(&self, event: ChromeEvent) -> Result<()> {
        let msg = Message::data(self.pid, event.to_wire().into_bytes());
        self.client.lock().send(&msg)?;
        Ok(())
    }
}

impl Drop for IpcExporter {
    fn drop(&mut self) {
        match self.client.lock().send(&Message::stop(self.pid)) {
            Ok(()) => debug!(pid = self.pid, "sent stop message"),
            Err(e) => warn!(error = %e, "failed to send stop message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrome_event::Phase;
    use protocol::MessageKind;
    use rstest::*;
    use std::fs::File;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[fixture]
    fn fifo() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("exporter_test.pipe");
        nix::unistd::mkfifo(&path, nix::sys::stat::Mode::from_bits_truncate(0o666))
            .expect("failed to create fifo");
        (dir, path)
    }

    #[rstest]
    fn test_push_sends_data_and_drop_sends_stop(fifo: (TempDir, PathBuf)) {
        let (_dir, path) = fifo;

        let reader_path = path.clone();
        let reader = std::thread::spawn(move || {
            let mut pipe = File::open(reader_path).expect("failed to open fifo");
            let first = protocol::decode(&mut pipe).expect("first decode failed");
            let second = protocol::decode(&mut pipe).expect("second decode failed");
            (first, second)
        });

        {
            let exporter = IpcExporter::connect(&path).expect("connect failed");
            let event = ChromeEvent {
                name: "upload".to_string(),
                cat: "net".to_string(),
                ph: Phase::Complete,
                ts: 1000,
                pid: exporter.pid,
                tid: 7,
                dur: 25,
            };
            exporter.push_trace(event).expect("push failed");
        }

        let (first, second) = reader.join().expect("reader panicked");

        assert_eq!(first.kind, MessageKind::Data);
        assert_eq!(first.pid, std::process::id() as i32);
        let body = String::from_utf8(first.body).expect("body is not utf-8");
        let decoded = ChromeEvent::from_wire(&body).expect("body is not wire format");
        assert_eq!(decoded.name, "upload");
        assert_eq!(decoded.cat, "net");

        assert_eq!(second.kind, MessageKind::Stop);
        assert_eq!(second.pid, first.pid);
        assert!(second.body.is_empty());
    }
}
