use chrome_event::ChromeEvent;
use protocol::Message;
use tracer::{Exporter, FileExporter};
use tracing::{info, warn};

/// How many raw events are staged before they are written out.
const BATCH_CAPACITY: usize = 100;

/// Turns received data messages back into trace events and writes them.
///
/// Bodies are staged as raw strings and parsed at flush time; a malformed
/// body costs one event, never the batch. Flushing is synchronous on the
/// server's single thread, so the output file keeps arrival order.
pub struct Collector {
    exporter: FileExporter,
    pending: Vec<String>,
}

impl Collector {
    pub fn new(exporter: FileExporter) -> Self {
        Collector {
            exporter,
            pending: Vec::with_capacity(BATCH_CAPACITY),
        }
    }

    /// Server `message_handler`: stages one data message's body.
    pub fn handle_message(&mut self, msg: &Message) {
        match String::from_utf8(msg.body.clone()) {
            Ok(body) => self.pending.push(body),
            Err(e) => {
                warn!(pid = msg.pid, error = %e, "dropping non-utf8 message body");
                return;
            }
        }
        if self.pending.len() >= BATCH_CAPACITY {
            self.flush();
        }
    }

    /// Server `stop_handler`: writes out whatever is still staged.
    pub fn finish(&mut self) {
        self.flush();
        info!("trace collector shutdown complete");
    }

    fn flush(&mut self) {
        for raw in self.pending.drain(..) {
            let event = match ChromeEvent::from_wire(&raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "dropping malformed event body");
                    continue;
                }
            };
            if let Err(e) = self.exporter.push_trace(event) {
                warn!(error = %e, "failed to write trace event");
            }
        }
    }
}
