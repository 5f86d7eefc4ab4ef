use tokio::sync::mpsc;

use crate::error::{FlowError, Result};
use crate::types::ExecutionEvent;

/// Sending half of a run's event stream.
///
/// Unlike a broadcast bus, a run has exactly one consumer; once that
/// consumer hangs up the run is cancelled.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<ExecutionEvent>) -> Self {
        Self { tx }
    }

    /// Create an emitter together with its receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ExecutionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Push one event, waiting for buffer space.
    /// Returns `Cancelled` when the receiver is gone.
    pub async fn emit(&self, event: ExecutionEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| FlowError::Cancelled)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Encode an event as one NDJSON line (trailing newline included).
pub fn to_ndjson_line(event: &ExecutionEvent) -> Result<String> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}
