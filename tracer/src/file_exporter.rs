use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrome_event::{ChromeEvent, TRACE_PREAMBLE, TRACE_SUFFIX};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{Exporter, Result, TracerError};

/// Direct-to-file JSON sink.
///
/// The trace file is written incrementally: the array preamble at
/// construction, one comma-joined JSON object per event, and the closing
/// suffix on drop. The file is never held in memory as a whole document.
#[derive(Debug)]
pub struct FileExporter {
    stream: Mutex<BufWriter<File>>,
    first_event: AtomicBool,
}

impl FileExporter {
    /// Opens the output file and writes the array preamble.
    ///
    /// Failure here is fatal to the owning process.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| TracerError::Resource {
            path: path.to_path_buf(),
            source,
        })?;

        let mut stream = BufWriter::new(file);
        stream
            .write_all(TRACE_PREAMBLE.as_bytes())
            .map_err(TracerError::Write)?;

        debug!(path = %path.display(), "trace output file opened");
        Ok(FileExporter {
            stream: Mutex::new(stream),
            first_event: AtomicBool::new(true),
        })
    }
}

impl Exporter for FileExporter {
    fn push_trace(&self, event: ChromeEvent) -> Result<()> {
        let json = event.to_json()?;

        let mut stream = self.stream.lock();
        // The atomic settles which racing thread writes the comma-less
        // first record; the lock keeps the bytes themselves whole.
        let is_first = self.first_event.swap(false, Ordering::SeqCst);
        if !is_first {
            stream.write_all(b",").map_err(TracerError::Write)?;
        }
        stream.write_all(b"\n").map_err(TracerError::Write)?;
        stream.write_all(json.as_bytes()).map_err(TracerError::Write)?;
        Ok(())
    }
}

impl Drop for FileExporter {
    fn drop(&mut self) {
        let mut stream = self.stream.lock();
        let finalize = stream
            .write_all(b"\n")
            .and_then(|_| stream.write_all(TRACE_SUFFIX.as_bytes()))
            .and_then(|_| stream.flush());
        if let Err(e) = finalize {
            warn!(error = %e, "failed to finalize trace file");
        }
    }
}
