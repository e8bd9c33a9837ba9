use bytes::Bytes;
use std::time::SystemTime;

/// A single decoded video frame sampled from a capture stream.
///
/// Frames carry their native resolution so detector-space coordinates can be
/// scaled into overlay-space coordinates at render time.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (cheaply cloneable)
    pub data: Bytes,
    /// Frame width in pixels (native video resolution)
    pub width: u32,
    /// Frame height in pixels (native video resolution)
    pub height: u32,
}

impl VideoFrame {
    pub fn new(id: u64, timestamp: SystemTime, data: Bytes, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data,
            width,
            height,
        }
    }

    /// Native (width, height) of the frame in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frame payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size() {
        let frame = VideoFrame::new(
            7,
            SystemTime::now(),
            Bytes::from_static(b"\xff\xd8\xff\xd9"),
            640,
            480,
        );
        assert_eq!(frame.size(), (640, 480));
        assert_eq!(frame.len(), 4);
        assert!(!frame.is_empty());
    }
}
