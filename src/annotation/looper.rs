use super::pacer::FramePacer;
use crate::detector::FaceDetector;
use crate::events::{ClipcamEvent, EventBus};
use crate::frame::VideoFrame;
use crate::overlay::OverlayCanvas;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// The recurring per-frame detect-and-draw cycle.
///
/// An explicit cancellable loop rather than an uncontrolled recursive
/// callback: cancellation is a guaranteed, observable event (the join handle
/// completes after the overlay has been cleared), never a race against the
/// next scheduled tick. Awaiting the detection inside each iteration enforces
/// a single in-flight detection, so overlay writes are never issued
/// out of order.
pub struct AnnotationLoop {
    detector: Arc<dyn FaceDetector>,
    frames: watch::Receiver<Option<VideoFrame>>,
    display_size: watch::Receiver<(u32, u32)>,
    overlay: Arc<Mutex<OverlayCanvas>>,
    event_bus: Arc<EventBus>,
}

impl AnnotationLoop {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        frames: watch::Receiver<Option<VideoFrame>>,
        display_size: watch::Receiver<(u32, u32)>,
        overlay: Arc<Mutex<OverlayCanvas>>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            detector,
            frames,
            display_size,
            overlay,
            event_bus,
        }
    }

    /// Spawn the loop; it runs until `token` is cancelled and clears the
    /// overlay on the way out.
    pub fn spawn(self, mut pacer: Box<dyn FramePacer>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Annotation loop started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = pacer.next_frame() => {}
                }

                // skip the iteration while the source is not yet decodable
                let frame = self.frames.borrow().clone();
                let Some(frame) = frame else {
                    trace!("No decodable frame yet; skipping annotation iteration");
                    continue;
                };

                let detections = match self.detector.detect(&frame).await {
                    Ok(detections) => detections,
                    Err(e) => {
                        warn!("Detection failed: {}", e);
                        continue;
                    }
                };

                // the detection was a suspension point; disablement may have
                // happened underneath it
                if token.is_cancelled() {
                    break;
                }

                let (display_w, display_h) = *self.display_size.borrow();
                let mut overlay = self.overlay.lock().await;
                overlay.resize(display_w, display_h);
                overlay.clear();
                overlay.draw_detections(&detections, frame.size());
                drop(overlay);

                let _ = self.event_bus.publish(ClipcamEvent::AnnotationRendered {
                    faces: detections.len(),
                });
            }

            // leave no residual annotation behind
            self.overlay.lock().await.clear();
            let _ = self.event_bus.publish(ClipcamEvent::AnnotationStopped);
            debug!("Annotation loop stopped, overlay cleared");
        })
    }
}
