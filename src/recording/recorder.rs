use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The recorder boundary: consumes a stream's encoded output and emits data
/// chunks; closing the emitted channel is the finalize event.
pub trait ClipRecorder: Send {
    /// Begin recording from the given encoded source. Chunks arrive on the
    /// returned receiver; the receiver closing means finalization is complete.
    fn start(&mut self, source: mpsc::UnboundedReceiver<Bytes>) -> mpsc::UnboundedReceiver<Bytes>;

    /// Signal finalization; pending chunks are flushed before the data
    /// channel closes. Idempotent.
    fn stop(&mut self);
}

/// Recorder that forwards the stream's encoded chunks unmodified.
///
/// Anything queued on the source before `start` belongs to the preview, not to
/// this recording, and is discarded.
pub struct PassthroughRecorder {
    stop_token: Option<CancellationToken>,
}

impl PassthroughRecorder {
    pub fn new() -> Self {
        Self { stop_token: None }
    }
}

impl Default for PassthroughRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipRecorder for PassthroughRecorder {
    fn start(&mut self, mut source: mpsc::UnboundedReceiver<Bytes>) -> mpsc::UnboundedReceiver<Bytes> {
        // drop chunks encoded before this recording began
        let mut discarded = 0usize;
        while source.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} pre-recording chunk(s)", discarded);
        }

        let (data_tx, data_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        self.stop_token = Some(token.clone());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        // flush whatever is still queued, then finalize
                        while let Ok(chunk) = source.try_recv() {
                            let _ = data_tx.send(chunk);
                        }
                        break;
                    }
                    chunk = source.recv() => match chunk {
                        Some(chunk) => {
                            let _ = data_tx.send(chunk);
                        }
                        None => break,
                    },
                }
            }
            debug!("Recorder finalized");
        });

        data_rx
    }

    fn stop(&mut self) {
        if let Some(token) = self.stop_token.take() {
            token.cancel();
        }
    }
}
