use crate::error::DetectorError;
use crate::frame::VideoFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Axis-aligned face bounding box in native video coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A single facial keypoint in native video coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detected face: its bounding box plus facial keypoints.
///
/// Coordinates are relative to the native video resolution of the frame the
/// detection ran on; scaling into display space happens at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bounding_box: BoundingBox,
    pub keypoints: Vec<Keypoint>,
}

/// A session-scoped capability for locating faces in a video frame
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceDetection>, DetectorError>;
}
