use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// The host's frame-presentation callback: one completion per displayed frame.
///
/// The annotation loop awaits this between iterations so it tracks actual
/// render cadence rather than a fixed timer.
#[async_trait]
pub trait FramePacer: Send {
    async fn next_frame(&mut self);
}

/// Production pacer ticking at the configured annotation frame rate
pub struct IntervalPacer {
    interval: Interval,
}

impl IntervalPacer {
    pub fn new(fps: u32) -> Self {
        let period = Duration::from_millis((1000 / fps.max(1) as u64).max(1));
        let mut interval = interval(period);
        // a stalled loop should not replay a burst of missed frames
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl FramePacer for IntervalPacer {
    async fn next_frame(&mut self) {
        self.interval.tick().await;
    }
}

/// Test pacer driven by explicit tick messages
pub struct ManualPacer {
    ticks: mpsc::UnboundedReceiver<()>,
}

impl ManualPacer {
    pub fn new() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { ticks: rx })
    }
}

#[async_trait]
impl FramePacer for ManualPacer {
    async fn next_frame(&mut self) {
        if self.ticks.recv().await.is_none() {
            // sender dropped; park forever so cancellation wins the select
            futures::future::pending::<()>().await;
        }
    }
}
