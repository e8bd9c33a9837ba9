use super::types::{BoundingBox, FaceDetection, FaceDetector, Keypoint};
use crate::error::DetectorError;
use crate::frame::VideoFrame;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted detector returning fixed detections.
///
/// Tracks call counts and concurrent in-flight detections so tests can assert
/// the single-in-flight guarantee of the annotation loop; also serves as the
/// demo detector for the interactive binary.
pub struct MockDetector {
    detections: Vec<FaceDetection>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockDetector {
    pub fn new(detections: Vec<FaceDetection>) -> Self {
        Self {
            detections,
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A detector reporting one centered face with five keypoints, sized
    /// relative to the given native resolution
    pub fn single_face(native_width: f32, native_height: f32) -> Self {
        let w = native_width * 0.3;
        let h = native_height * 0.4;
        let x = (native_width - w) / 2.0;
        let y = (native_height - h) / 2.0;
        let keypoints = vec![
            Keypoint::new(x + w * 0.3, y + h * 0.35), // left eye
            Keypoint::new(x + w * 0.7, y + h * 0.35), // right eye
            Keypoint::new(x + w * 0.5, y + h * 0.55), // nose
            Keypoint::new(x + w * 0.35, y + h * 0.75),
            Keypoint::new(x + w * 0.65, y + h * 0.75),
        ];
        Self::new(vec![FaceDetection {
            bounding_box: BoundingBox::new(x, y, w, h),
            keypoints,
        }])
    }

    /// Add an artificial per-detection latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of detections observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceDetector for MockDetector {
    async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<FaceDetection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}
