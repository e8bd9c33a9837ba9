use super::provider::{
    CameraFacing, CaptureStream, MediaConstraints, MediaProvider, MediaTrack, TrackKind,
};
use crate::error::MediaError;
use crate::frame::VideoFrame;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// WebM/Matroska container magic placed at the head of the first chunk
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Synthetic capture device generating frames and encoded chunks in-process.
///
/// Stands in for a real camera/microphone so the session is exercisable on
/// hosts without capture hardware. Frames follow a deterministic MJPEG-shaped
/// pattern; chunk cadence models a recorder timeslice.
pub struct SyntheticCamera {
    resolution: (u32, u32),
    fps: u32,
    chunk_interval: Duration,
    /// When set, environment-facing requests fail so the unconstrained
    /// fallback path is taken
    fail_environment_facing: bool,
}

impl SyntheticCamera {
    pub fn new(resolution: (u32, u32), fps: u32, chunk_interval: Duration) -> Self {
        Self {
            resolution,
            fps: fps.max(1),
            chunk_interval,
            fail_environment_facing: false,
        }
    }

    pub fn with_missing_environment_camera(mut self) -> Self {
        self.fail_environment_facing = true;
        self
    }

    /// Build a deterministic MJPEG-shaped frame payload
    fn synth_frame_data(frame_id: u64) -> Bytes {
        let mut data = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01,
            0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
        ];
        let pattern_size = 1000 + (frame_id % 500) as usize;
        let pattern_byte = (frame_id % 256) as u8;
        data.extend(vec![pattern_byte; pattern_size]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        Bytes::from(data)
    }
}

#[async_trait]
impl MediaProvider for SyntheticCamera {
    async fn request_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<CaptureStream, MediaError> {
        if self.fail_environment_facing && constraints.facing == CameraFacing::Environment {
            return Err(MediaError::DeviceUnavailable {
                details: "no environment-facing camera present".to_string(),
            });
        }

        let (width, height) = self.resolution;
        info!(
            "Synthetic camera granted: {}x{} @ {}fps (audio: {})",
            width, height, self.fps, constraints.audio
        );

        let mut tracks = vec![MediaTrack::new(TrackKind::Video)];
        if constraints.audio {
            tracks.push(MediaTrack::new(TrackKind::Audio));
        }

        // None until the first frame arrives, modeling a source that is not
        // yet decodable right after acquisition
        let (frame_tx, frame_rx) = watch::channel(None);
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let fps = self.fps;
        let chunk_interval = self.chunk_interval;
        let producer_token = token.clone();
        tokio::spawn(async move {
            let mut frame_interval = tokio::time::interval(Duration::from_millis(
                (1000 / fps as u64).max(1),
            ));
            let mut chunk_timer = tokio::time::interval(chunk_interval);
            let mut frame_id: u64 = 0;
            let mut first_chunk = true;

            debug!("Synthetic capture producer started");
            loop {
                tokio::select! {
                    _ = producer_token.cancelled() => {
                        break;
                    }
                    _ = frame_interval.tick() => {
                        let data = SyntheticCamera::synth_frame_data(frame_id);
                        let data_len = data.len();
                        let frame = VideoFrame::new(
                            frame_id,
                            SystemTime::now(),
                            data,
                            width,
                            height,
                        );
                        trace!(
                            "Generated synthetic frame {} ({}x{}, {} bytes)",
                            frame_id,
                            width,
                            height,
                            data_len
                        );
                        frame_id += 1;
                        if frame_tx.send(Some(frame)).is_err() {
                            break;
                        }
                    }
                    _ = chunk_timer.tick() => {
                        let mut chunk = Vec::new();
                        if first_chunk {
                            chunk.extend_from_slice(&EBML_MAGIC);
                            first_chunk = false;
                        }
                        chunk.extend_from_slice(&SyntheticCamera::synth_frame_data(frame_id));
                        let _ = chunk_tx.send(Bytes::from(chunk));
                    }
                }
            }
            debug!("Synthetic capture producer stopped");
        });

        Ok(CaptureStream::new(tracks, frame_rx, chunk_rx, token))
    }
}
