use super::duration::RecordDuration;
use super::recorder::ClipRecorder;
use crate::events::{ClipcamEvent, EventBus};
use bytes::{Bytes, BytesMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One recording pass: the chunk buffer, the 1 Hz stopwatch and the one-shot
/// countdown.
///
/// The buffer is written only by the recorder's data output and read exactly
/// once, at finalize. The countdown fires the same stop path a manual stop
/// takes; whichever arrives second is a no-op.
pub struct RecordingSession {
    recorder: Box<dyn ClipRecorder>,
    event_bus: Arc<EventBus>,
    elapsed: Arc<AtomicU64>,
    stopwatch: Option<CancellationToken>,
    countdown: Option<CancellationToken>,
    pump: Option<JoinHandle<Vec<Bytes>>>,
    active: bool,
}

impl RecordingSession {
    pub fn new(recorder: Box<dyn ClipRecorder>, event_bus: Arc<EventBus>) -> Self {
        Self {
            recorder,
            event_bus,
            elapsed: Arc::new(AtomicU64::new(0)),
            stopwatch: None,
            countdown: None,
            pump: None,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Seconds elapsed in the current (or last) recording pass
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn elapsed_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.elapsed)
    }

    pub fn reset_elapsed(&self) {
        self.elapsed.store(0, Ordering::Relaxed);
    }

    /// Begin a recording pass.
    ///
    /// Resets the elapsed counter and buffer, starts continuous accumulation
    /// of the encoded output, starts the stopwatch, and arms the countdown
    /// when the duration is bounded. `on_countdown` is invoked at most once,
    /// when the countdown elapses without being cancelled.
    pub fn start(
        &mut self,
        source: mpsc::UnboundedReceiver<Bytes>,
        duration: RecordDuration,
        on_countdown: Box<dyn FnOnce() + Send>,
    ) {
        if self.active {
            warn!("Recording already active; ignoring start");
            return;
        }
        info!("Recording started ({})", duration);
        self.active = true;
        self.elapsed.store(0, Ordering::Relaxed);

        // fresh buffer for this pass; written only by the data output
        let mut data = self.recorder.start(source);
        self.pump = Some(tokio::spawn(async move {
            let mut buffer: Vec<Bytes> = Vec::new();
            while let Some(chunk) = data.recv().await {
                buffer.push(chunk);
            }
            buffer
        }));

        // 1 Hz stopwatch driving the displayed elapsed time
        let stopwatch = CancellationToken::new();
        let elapsed = Arc::clone(&self.elapsed);
        let bus = Arc::clone(&self.event_bus);
        let stopwatch_task = stopwatch.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = stopwatch_task.cancelled() => break,
                    _ = ticks.tick() => {
                        let seconds = elapsed.fetch_add(1, Ordering::Relaxed) + 1;
                        let _ = bus.publish(ClipcamEvent::ElapsedTick { seconds });
                    }
                }
            }
        });
        self.stopwatch = Some(stopwatch);

        // one-shot countdown; unbounded duration arms nothing
        if let Some(wait) = duration.countdown() {
            let countdown = CancellationToken::new();
            let countdown_task = countdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = countdown_task.cancelled() => {}
                    _ = tokio::time::sleep(wait) => {
                        debug!("Countdown elapsed after {:?}", wait);
                        on_countdown();
                    }
                }
            });
            self.countdown = Some(countdown);
        }
    }

    /// Finalize the current pass: cancel the countdown, flush the recorder,
    /// concatenate the buffer into one blob and stop the stopwatch.
    ///
    /// Zero accumulated bytes still yield a (valid, empty) blob.
    pub async fn finalize(&mut self) -> Bytes {
        if !self.active {
            debug!("No active recording to finalize");
            return Bytes::new();
        }
        self.active = false;

        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
        self.recorder.stop();

        let chunks = match self.pump.take() {
            Some(pump) => pump.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if let Some(stopwatch) = self.stopwatch.take() {
            stopwatch.cancel();
        }

        let total: usize = chunks.iter().map(Bytes::len).sum();
        let mut blob = BytesMut::with_capacity(total);
        for chunk in &chunks {
            blob.extend_from_slice(chunk);
        }
        info!(
            "Recording finalized: {} chunk(s), {} bytes, {}s elapsed",
            chunks.len(),
            total,
            self.elapsed_seconds()
        );
        blob.freeze()
    }

    /// Tear everything down without producing a blob (shutdown path)
    pub fn abort(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
        if let Some(stopwatch) = self.stopwatch.take() {
            stopwatch.cancel();
        }
        self.recorder.stop();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.active = false;
    }
}
